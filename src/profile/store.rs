use super::templates::{self, DEFAULT_PROFILE};
use super::{Mapping, Profile};
use crate::diagnostics::{Category, Diagnostics};
use crate::error::EngineError;
use crate::persistence::{self, profile_key, KeyValueStore, StoredMapping};
use tokio::time::Instant;

/// Whether a write reached the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Storage failed; the change only lives in this session
    MemoryOnly,
}

/// Owns the active profile.
///
/// The backing store is passed into each call so the engine keeps a single
/// handle to it for profiles and the settings blob alike.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    active: Profile,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore {
    /// Starts on the default template without any overlay.
    pub fn new() -> Self {
        let active = templates::template(DEFAULT_PROFILE).unwrap_or_else(|| Profile {
            id: DEFAULT_PROFILE.to_string(),
            name: DEFAULT_PROFILE.to_string(),
            mappings: Mapping::new(),
        });
        Self { active }
    }

    pub fn active(&self) -> &Profile {
        &self.active
    }

    pub fn mapping(&self) -> &Mapping {
        &self.active.mappings
    }

    pub fn mapping_mut(&mut self) -> &mut Mapping {
        &mut self.active.mappings
    }

    pub fn catalogue(&self) -> Vec<(String, String)> {
        templates::catalogue()
    }

    /// Makes `id` active: template first, persisted overlay on top.
    ///
    /// A missing, unreadable or malformed overlay leaves the template as is.
    pub fn switch(
        &mut self,
        id: &str,
        store: &dyn KeyValueStore,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), EngineError> {
        let mut profile =
            templates::template(id).ok_or_else(|| EngineError::UnknownProfile(id.to_string()))?;

        if let Some(overlay) = Self::read_overlay(id, store, now, diagnostics) {
            profile.mappings.overlay(&overlay);
        }

        diagnostics.info(
            now,
            Category::Profile,
            format!("Profile switched to {} ({})", profile.name, profile.id),
        );
        self.active = profile;
        Ok(())
    }

    fn read_overlay(
        id: &str,
        store: &dyn KeyValueStore,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> Option<Mapping> {
        let key = profile_key(id);
        let text = match store.get(&key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                diagnostics.warn(
                    now,
                    Category::Storage,
                    format!("Could not read {}: {}", key, e),
                );
                return None;
            }
        };

        let stored: StoredMapping = match persistence::decode(&key, &text) {
            Ok(stored) => stored,
            Err(e) => {
                diagnostics.warn(
                    now,
                    Category::Storage,
                    format!("Discarding malformed overlay: {}", e),
                );
                return None;
            }
        };

        let (mapping, skipped) = Mapping::from_stored(&stored);
        for unknown in skipped {
            diagnostics.warn(
                now,
                Category::Profile,
                format!("Unknown control {} in {} skipped", unknown, key),
            );
        }
        Some(mapping)
    }

    /// Persists the full mapping of the active profile.
    pub fn save(
        &self,
        store: &mut dyn KeyValueStore,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> SaveOutcome {
        let key = profile_key(&self.active.id);
        let stored = self.active.mappings.to_stored(&self.active.id);
        let result = persistence::encode(&key, &stored).and_then(|text| store.set(&key, &text));

        match result {
            Ok(()) => {
                diagnostics.info(
                    now,
                    Category::Storage,
                    format!("Mappings saved for {}", self.active.id),
                );
                SaveOutcome::Saved
            }
            Err(e) => {
                diagnostics.warn(
                    now,
                    Category::Storage,
                    format!("Save failed, keeping mappings in memory: {}", e),
                );
                SaveOutcome::MemoryOnly
            }
        }
    }

    /// Removes the persisted overlay and reloads the template.
    pub fn reset(
        &mut self,
        store: &mut dyn KeyValueStore,
        now: Instant,
        diagnostics: &mut Diagnostics,
    ) -> SaveOutcome {
        let key = profile_key(&self.active.id);
        let outcome = match store.remove(&key) {
            Ok(()) => SaveOutcome::Saved,
            Err(e) => {
                diagnostics.warn(
                    now,
                    Category::Storage,
                    format!("Could not remove {}: {}", key, e),
                );
                SaveOutcome::MemoryOnly
            }
        };

        if let Some(template) = templates::template(&self.active.id) {
            self.active.mappings = template.mappings;
        }
        diagnostics.info(
            now,
            Category::Profile,
            format!("Mappings reset to {} defaults", self.active.id),
        );
        outcome
    }
}
