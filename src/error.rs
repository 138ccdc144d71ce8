//! Error definitions shared across the engine

use crate::persistence::StoreError;
use thiserror::Error;

/// Errors returned by engine API calls.
///
/// Pointer and physical-input handlers never return these: a failing control
/// degrades to "no event emitted" and records a diagnostic instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested profile is not one of the built-in templates
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// A control id string did not match any known control
    #[error("Unknown control id: {0}")]
    UnknownControl(String),

    /// A configuration value was out of range or unparsable
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// Local storage failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The driver task is no longer receiving commands
    #[error("Engine channel closed")]
    ChannelClosed,

    /// The driver task panicked or was aborted
    #[error("Engine task failed: {0}")]
    TaskFailed(String),
}
