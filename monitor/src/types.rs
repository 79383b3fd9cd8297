//! Type definitions for per-frame detection input

use serde::{Deserialize, Serialize};
use violationtrack::{Bbox, Timestamp, TrackId};

/// Object classes the monitor understands
///
/// Detector labels outside this set map to `Other` and only take part in
/// zone checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Person,
    Helmet,
    NoHelmet,
    Vest,
    NoVest,
    Machine,
    Other,
}

impl ObjectClass {
    /// Heavy machinery labels produced by the site detector
    const MACHINE_LABELS: &'static [&'static str] = &[
        "excavator",
        "dump_truck",
        "loader",
        "bulldozer",
        "crane",
        "forklift",
        "roller",
        "concrete_mixer",
    ];

    pub fn from_label(label: &str) -> Self {
        match label {
            "person" => Self::Person,
            "helmet" => Self::Helmet,
            "no_helmet" => Self::NoHelmet,
            "vest" | "safety_vest" => Self::Vest,
            "no_vest" => Self::NoVest,
            other if Self::MACHINE_LABELS.contains(&other) => Self::Machine,
            _ => Self::Other,
        }
    }

    pub fn is_ppe(&self) -> bool {
        matches!(
            self,
            Self::Helmet | Self::NoHelmet | Self::Vest | Self::NoVest
        )
    }
}

/// Single detection produced by the upstream detector and tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    /// `[x1, y1, x2, y2]` in frame pixels
    pub bbox: Bbox,
    #[serde(default)]
    pub track_id: Option<TrackId>,
    pub confidence: f32,
}

impl Detection {
    pub fn new(class_name: &str, bbox: Bbox, track_id: Option<TrackId>, confidence: f32) -> Self {
        Self {
            class_name: class_name.to_string(),
            bbox,
            track_id,
            confidence,
        }
    }

    pub fn class(&self) -> ObjectClass {
        ObjectClass::from_label(&self.class_name)
    }

    /// Finite box and a confidence inside [0, 1]
    pub fn is_well_formed(&self) -> bool {
        self.bbox.is_finite() && (0.0..=1.0).contains(&self.confidence)
    }
}

/// All detections for one video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub frame_id: u64,
    /// Seconds, unix epoch or stream relative
    pub timestamp: Timestamp,
    /// Frame size in pixels; the session default is used when absent
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Saved frame image kept as evidence for the violations it produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl Frame {
    pub fn new(frame_id: u64, timestamp: Timestamp, detections: Vec<Detection>) -> Self {
        Self {
            frame_id,
            timestamp,
            width: None,
            height: None,
            detections,
            image_path: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_from_label() {
        assert_eq!(ObjectClass::from_label("person"), ObjectClass::Person);
        assert_eq!(ObjectClass::from_label("safety_vest"), ObjectClass::Vest);
        assert_eq!(ObjectClass::from_label("no_helmet"), ObjectClass::NoHelmet);
        assert_eq!(ObjectClass::from_label("excavator"), ObjectClass::Machine);
        assert_eq!(ObjectClass::from_label("cat"), ObjectClass::Other);
        assert!(ObjectClass::NoVest.is_ppe());
        assert!(!ObjectClass::Person.is_ppe());
    }

    #[test]
    fn test_frame_from_json() {
        let json = r#"{
            "frame_id": 7,
            "timestamp": 12.5,
            "width": 640,
            "height": 480,
            "detections": [
                {"class_name": "person", "bbox": [10, 20, 50, 120], "track_id": 3, "confidence": 0.9},
                {"class_name": "excavator", "bbox": [200, 200, 400, 380], "confidence": 0.8}
            ]
        }"#;
        let frame: Frame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.frame_id, 7);
        assert_eq!(frame.width, Some(640));
        assert_eq!(frame.detections.len(), 2);
        assert_eq!(frame.detections[0].track_id, Some(3));
        assert_eq!(frame.detections[1].track_id, None);
        assert_eq!(frame.detections[0].bbox, Bbox::new(10.0, 20.0, 50.0, 120.0));
    }

    #[test]
    fn test_malformed_detection() {
        let nan = Detection::new("person", Bbox::new(f32::NAN, 0.0, 1.0, 1.0), Some(1), 0.9);
        let over = Detection::new("person", Bbox::new(0.0, 0.0, 1.0, 1.0), Some(1), 1.5);
        assert!(!nan.is_well_formed());
        assert!(!over.is_well_formed());
    }
}
