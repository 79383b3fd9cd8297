//! Per-run event stores
//!
//! Raw detector output is kept per session so the aggregator can rebuild the
//! unified stream at any time from an unchanged source.

use crate::ppe_rules::PpeViolation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use violationtrack::{ProximityEvent, ZoneViolation};

/// A raw event together with the frame evidence it was produced from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent<T> {
    pub event: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// Read access to the raw events of each session
pub trait EventStore {
    fn ppe_events(&self, session_id: &str) -> &[StoredEvent<PpeViolation>];

    fn proximity_events(&self, session_id: &str) -> &[StoredEvent<ProximityEvent>];

    fn zone_events(&self, session_id: &str) -> &[StoredEvent<ZoneViolation>];
}

/// Raw events of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionEvents {
    pub ppe: Vec<StoredEvent<PpeViolation>>,
    pub proximity: Vec<StoredEvent<ProximityEvent>>,
    pub zone: Vec<StoredEvent<ZoneViolation>>,
}

impl SessionEvents {
    pub fn len(&self) -> usize {
        self.ppe.len() + self.proximity.len() + self.zone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Event store kept in memory, keyed by session id
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    sessions: BTreeMap<String, SessionEvents>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append everything one frame produced for a session
    pub fn record_frame(
        &mut self,
        session_id: &str,
        ppe: &[PpeViolation],
        proximity: &[ProximityEvent],
        zone: &[ZoneViolation],
        image_path: Option<&str>,
    ) {
        let events = self.sessions.entry(session_id.to_string()).or_default();
        let wrap = |image_path: Option<&str>| image_path.map(str::to_string);
        events.ppe.extend(ppe.iter().map(|e| StoredEvent {
            event: e.clone(),
            image_path: wrap(image_path),
        }));
        events.proximity.extend(proximity.iter().map(|e| StoredEvent {
            event: e.clone(),
            image_path: wrap(image_path),
        }));
        events.zone.extend(zone.iter().map(|e| StoredEvent {
            event: e.clone(),
            image_path: wrap(image_path),
        }));
    }

    pub fn session(&self, session_id: &str) -> Option<&SessionEvents> {
        self.sessions.get(session_id)
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.sessions.keys().map(String::as_str)
    }

    /// Remove a session and return its events
    pub fn take_session(&mut self, session_id: &str) -> Option<SessionEvents> {
        self.sessions.remove(session_id)
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

impl EventStore for InMemoryEventStore {
    fn ppe_events(&self, session_id: &str) -> &[StoredEvent<PpeViolation>] {
        self.sessions
            .get(session_id)
            .map(|s| s.ppe.as_slice())
            .unwrap_or(&[])
    }

    fn proximity_events(&self, session_id: &str) -> &[StoredEvent<ProximityEvent>] {
        self.sessions
            .get(session_id)
            .map(|s| s.proximity.as_slice())
            .unwrap_or(&[])
    }

    fn zone_events(&self, session_id: &str) -> &[StoredEvent<ZoneViolation>] {
        self.sessions
            .get(session_id)
            .map(|s| s.zone.as_slice())
            .unwrap_or(&[])
    }
}
