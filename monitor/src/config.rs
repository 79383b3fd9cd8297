//! Session configuration
//!
//! Every field has a default, so a JSON file only needs to name the values
//! it overrides.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use violationtrack::{ComplianceConfig, ProximityConfig, ZoneConfig};

/// Configuration for one monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Detections below this confidence are ignored by the PPE rules
    pub min_confidence: f32,
    /// Number of recent confidences averaged per (track, class)
    pub smoothing_window: usize,
    /// Seconds of stream time between staleness sweeps
    pub sweep_interval: f64,
    /// Frame size used when a frame does not carry its own
    pub default_frame_size: (u32, u32),
    pub compliance: ComplianceConfig,
    pub proximity: ProximityConfig,
    pub zone: ZoneConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            smoothing_window: 5,
            sweep_interval: 60.0,
            default_frame_size: (1920, 1080),
            compliance: ComplianceConfig::default(),
            proximity: ProximityConfig::default(),
            zone: ZoneConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load and validate a configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded monitor configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(MonitorError::config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.smoothing_window == 0 {
            return Err(MonitorError::config("smoothing_window must be at least 1"));
        }
        if self.sweep_interval <= 0.0 {
            return Err(MonitorError::config("sweep_interval must be positive"));
        }
        let (w, h) = self.default_frame_size;
        if w == 0 || h == 0 {
            return Err(MonitorError::config("default_frame_size must be non-zero"));
        }

        let c = &self.compliance;
        if c.start_threshold == 0 || c.end_threshold == 0 {
            return Err(MonitorError::config(
                "compliance start_threshold and end_threshold must be at least 1",
            ));
        }
        if c.unknown_timeout < 0.0 || c.medium_after < 0.0 {
            return Err(MonitorError::config(
                "compliance timeouts must not be negative",
            ));
        }
        if c.history_window <= 0.0 || c.stale_after <= 0.0 {
            return Err(MonitorError::config(
                "compliance history_window and stale_after must be positive",
            ));
        }

        let p = &self.proximity;
        if p.critical_distance <= 0.0 || p.warning_distance <= 0.0 {
            return Err(MonitorError::config("proximity distances must be positive"));
        }
        if p.critical_distance >= p.warning_distance {
            return Err(MonitorError::config(format!(
                "critical_distance ({}) must be below warning_distance ({})",
                p.critical_distance, p.warning_distance
            )));
        }
        if p.warning_time < 0.0 || p.critical_time < 0.0 || p.safe_grace < 0.0 {
            return Err(MonitorError::config(
                "proximity durations must not be negative",
            ));
        }
        if p.monitored_machines.is_empty() {
            log::warn!("No monitored machines configured, proximity checks are disabled");
        }

        if self.zone.min_dwell < 0.0 {
            return Err(MonitorError::config("zone min_dwell must not be negative"));
        }
        if self.zone.stale_after <= 0.0 || p.stale_after <= 0.0 {
            return Err(MonitorError::config("stale_after values must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compliance.start_threshold, 3);
        assert_eq!(config.proximity.critical_distance, 0.08);
        assert_eq!(config.zone.min_dwell, 1.0);
    }

    #[test]
    fn test_partial_json_overrides() {
        let json = r#"{"min_confidence": 0.3, "proximity": {"warning_distance": 0.2}}"#;
        let config: MonitorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.min_confidence, 0.3);
        assert_eq!(config.proximity.warning_distance, 0.2);
        assert_eq!(config.proximity.critical_distance, 0.08);
        assert_eq!(config.smoothing_window, 5);
    }

    #[test]
    fn test_rejects_inverted_distances() {
        let mut config = MonitorConfig::default();
        config.proximity.critical_distance = 0.2;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_thresholds() {
        let mut config = MonitorConfig::default();
        config.compliance.end_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.smoothing_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!(
            "site_safety_monitor_config_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"sweep_interval": 10.0}"#).unwrap();
        let config = MonitorConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.sweep_interval, 10.0);

        assert!(matches!(
            MonitorConfig::from_json_file("/no/such/config.json"),
            Err(MonitorError::Io(_))
        ));
    }
}
