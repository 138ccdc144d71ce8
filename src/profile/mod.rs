//! # Profile Store
//!
//! Named mappings from abstract control identifiers to target actions.
//!
//! A profile is created from a built-in template ([`templates`]), optionally
//! overlaid with the persisted per-profile overrides, mutated only by
//! calibration and persisted on calibration save and at teardown
//! ([`store::ProfileStore`]).
//!
//! Mapping values are opaque strings here. They only get interpreted when the
//! event synthesizer emits them, so an unknown action is simply a key name
//! passed through to the host.

pub mod store;
pub mod templates;

pub use store::ProfileStore;

use crate::error::EngineError;
use crate::persistence::StoredMapping;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Every bindable control direction or button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlId {
    JoystickLeftUp,
    JoystickLeftDown,
    JoystickLeftLeft,
    JoystickLeftRight,
    JoystickRightUp,
    JoystickRightDown,
    JoystickRightLeft,
    JoystickRightRight,
    ButtonA,
    ButtonB,
    ButtonX,
    ButtonY,
    ButtonDpadUp,
    ButtonDpadDown,
    ButtonDpadLeft,
    ButtonDpadRight,
    ButtonLb,
    ButtonLt,
    ButtonRb,
    ButtonRt,
    ButtonL3,
    ButtonR3,
    ButtonSelect,
    ButtonStart,
}

impl ControlId {
    pub const ALL: [ControlId; 24] = [
        ControlId::JoystickLeftUp,
        ControlId::JoystickLeftDown,
        ControlId::JoystickLeftLeft,
        ControlId::JoystickLeftRight,
        ControlId::JoystickRightUp,
        ControlId::JoystickRightDown,
        ControlId::JoystickRightLeft,
        ControlId::JoystickRightRight,
        ControlId::ButtonA,
        ControlId::ButtonB,
        ControlId::ButtonX,
        ControlId::ButtonY,
        ControlId::ButtonDpadUp,
        ControlId::ButtonDpadDown,
        ControlId::ButtonDpadLeft,
        ControlId::ButtonDpadRight,
        ControlId::ButtonLb,
        ControlId::ButtonLt,
        ControlId::ButtonRb,
        ControlId::ButtonRt,
        ControlId::ButtonL3,
        ControlId::ButtonR3,
        ControlId::ButtonSelect,
        ControlId::ButtonStart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlId::JoystickLeftUp => "JOYSTICK_LEFT_UP",
            ControlId::JoystickLeftDown => "JOYSTICK_LEFT_DOWN",
            ControlId::JoystickLeftLeft => "JOYSTICK_LEFT_LEFT",
            ControlId::JoystickLeftRight => "JOYSTICK_LEFT_RIGHT",
            ControlId::JoystickRightUp => "JOYSTICK_RIGHT_UP",
            ControlId::JoystickRightDown => "JOYSTICK_RIGHT_DOWN",
            ControlId::JoystickRightLeft => "JOYSTICK_RIGHT_LEFT",
            ControlId::JoystickRightRight => "JOYSTICK_RIGHT_RIGHT",
            ControlId::ButtonA => "BUTTON_A",
            ControlId::ButtonB => "BUTTON_B",
            ControlId::ButtonX => "BUTTON_X",
            ControlId::ButtonY => "BUTTON_Y",
            ControlId::ButtonDpadUp => "BUTTON_DPAD_UP",
            ControlId::ButtonDpadDown => "BUTTON_DPAD_DOWN",
            ControlId::ButtonDpadLeft => "BUTTON_DPAD_LEFT",
            ControlId::ButtonDpadRight => "BUTTON_DPAD_RIGHT",
            ControlId::ButtonLb => "BUTTON_LB",
            ControlId::ButtonLt => "BUTTON_LT",
            ControlId::ButtonRb => "BUTTON_RB",
            ControlId::ButtonRt => "BUTTON_RT",
            ControlId::ButtonL3 => "BUTTON_L3",
            ControlId::ButtonR3 => "BUTTON_R3",
            ControlId::ButtonSelect => "BUTTON_SELECT",
            ControlId::ButtonStart => "BUTTON_START",
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| EngineError::UnknownControl(s.to_string()))
    }
}

/// Control id → action. Unmapped ids are legal and produce no event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: BTreeMap<ControlId, String>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action bound to `control`; an empty string counts as unmapped.
    pub fn get(&self, control: ControlId) -> Option<&str> {
        self.entries
            .get(&control)
            .map(String::as_str)
            .filter(|action| !action.is_empty())
    }

    pub fn set(&mut self, control: ControlId, action: impl Into<String>) {
        self.entries.insert(control, action.into());
    }

    pub fn remove(&mut self, control: ControlId) -> Option<String> {
        self.entries.remove(&control)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ControlId, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Later entries win, like a shallow overlay.
    pub fn overlay(&mut self, other: &Mapping) {
        for (control, action) in &other.entries {
            self.entries.insert(*control, action.clone());
        }
    }

    pub fn to_stored(&self, profile: &str) -> StoredMapping {
        StoredMapping {
            profile: profile.to_string(),
            mappings: self
                .entries
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.clone()))
                .collect(),
        }
    }

    /// Builds a mapping from a stored overlay, returning the ids it had to skip.
    pub fn from_stored(stored: &StoredMapping) -> (Self, Vec<String>) {
        let mut mapping = Mapping::new();
        let mut skipped = Vec::new();
        for (key, action) in &stored.mappings {
            match key.parse::<ControlId>() {
                Ok(id) => mapping.set(id, action.clone()),
                Err(_) => {
                    warn!("Skipping unknown control id in stored overlay: {}", key);
                    skipped.push(key.clone());
                }
            }
        }
        (mapping, skipped)
    }
}

impl FromIterator<(ControlId, String)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (ControlId, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A named set of mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub mappings: Mapping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_ids_round_trip_through_names() {
        for id in ControlId::ALL {
            assert_eq!(id.as_str().parse::<ControlId>().unwrap(), id);
        }
        assert!("BUTTON_EXTRA1".parse::<ControlId>().is_err());
    }

    #[test]
    fn serde_names_match_string_names() {
        #[derive(Serialize)]
        struct Wrapper {
            id: ControlId,
        }
        let text = toml::to_string(&Wrapper {
            id: ControlId::ButtonL3,
        })
        .unwrap();
        assert!(text.contains("\"BUTTON_L3\""));
    }

    #[test]
    fn empty_action_is_unmapped() {
        let mut m = Mapping::new();
        m.set(ControlId::ButtonA, "");
        assert_eq!(m.get(ControlId::ButtonA), None);
        m.set(ControlId::ButtonA, " ");
        assert_eq!(m.get(ControlId::ButtonA), Some(" "));
    }

    #[test]
    fn overlay_replaces_and_adds() {
        let mut base: Mapping = [
            (ControlId::ButtonA, " ".to_string()),
            (ControlId::ButtonB, "ctrl".to_string()),
        ]
        .into_iter()
        .collect();
        let top: Mapping = [
            (ControlId::ButtonB, "k".to_string()),
            (ControlId::ButtonX, "r".to_string()),
        ]
        .into_iter()
        .collect();
        base.overlay(&top);
        assert_eq!(base.get(ControlId::ButtonA), Some(" "));
        assert_eq!(base.get(ControlId::ButtonB), Some("k"));
        assert_eq!(base.get(ControlId::ButtonX), Some("r"));
    }

    #[test]
    fn from_stored_skips_unknown_ids() {
        let mut stored = StoredMapping::default();
        stored.mappings.insert("BUTTON_A".into(), "j".into());
        stored.mappings.insert("BUTTON_EXTRA1".into(), "5".into());
        let (mapping, skipped) = Mapping::from_stored(&stored);
        assert_eq!(mapping.get(ControlId::ButtonA), Some("j"));
        assert_eq!(skipped, vec!["BUTTON_EXTRA1".to_string()]);
    }
}
