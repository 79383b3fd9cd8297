//! Error types for the site safety monitor

use thiserror::Error;

/// Result type alias for the monitor library
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while configuring or driving a monitoring session
///
/// Nothing on the per-frame path returns these; bad detections are skipped.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Zone configuration error: {0}")]
    ZoneConfig(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl MonitorError {
    pub fn zone_config<S: Into<String>>(msg: S) -> Self {
        Self::ZoneConfig(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn session_closed<S: Into<String>>(session_id: S) -> Self {
        Self::SessionClosed(session_id.into())
    }

    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
