//! # Persistence
//!
//! Local key-value storage for profile overlays and the settings blob.
//!
//! Every persisted value is a TOML string stored under a flat key:
//!
//! ```text
//! touchcontroller_config      -> SettingsOverlay (whole-of-config blob)
//! touchcontroller_<profile>   -> StoredMapping   (per-profile overlay)
//! ```
//!
//! ## Error Handling Strategy
//! Storage is never allowed to stop input handling. Callers treat every
//! [`StoreError`] as "degrade to in-memory only": the current session keeps
//! working, a diagnostic is logged, nothing is written.

pub mod file_store;
pub mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Prefix shared by every key this crate writes.
pub const KEY_PREFIX: &str = "touchcontroller";

/// Key of the settings blob.
pub const CONFIG_KEY: &str = "touchcontroller_config";

/// Key holding the mapping overlay of `profile_id`.
pub fn profile_key(profile_id: &str) -> String {
    format!("{}_{}", KEY_PREFIX, profile_id)
}

/// Errors from the storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Failed to serialize {key}: {message}")]
    Serialize { key: String, message: String },

    #[error("Failed to parse {key}: {message}")]
    Deserialize { key: String, message: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// String key-value storage, one entry per key.
///
/// Backends are synchronous: they are called from the engine's event loop and
/// only ever hold a handful of small entries.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// On-disk shape of a profile overlay.
///
/// Keys stay plain strings so an overlay written by a newer build with extra
/// controls still parses; unknown ids are filtered when applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMapping {
    pub profile: String,
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,
}

/// Serializes `value` to TOML for storage under `key`.
pub fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, StoreError> {
    toml::to_string_pretty(value).map_err(|e| StoreError::Serialize {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Parses a TOML value previously stored under `key`.
pub fn decode<T: for<'de> Deserialize<'de>>(key: &str, text: &str) -> Result<T, StoreError> {
    toml::from_str(text).map_err(|e| StoreError::Deserialize {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Keys become file names, so only a conservative character set is accepted.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
