//! Runtime configuration surface.
//!
//! Precedence, lowest first:
//!
//! ```text
//! Settings::default()  <  persisted overlay (startup)  <  update_settings(..)
//! ```
//!
//! Overlays are applied field by field. An invalid field is rejected on its
//! own and reported; every other field of the same overlay still applies.

use crate::controls::layout::Layout;
use crate::controls::StickMode;
use crate::profile::templates::DEFAULT_PROFILE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long calibration waits for a physical input.
pub const CALIBRATION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Largest accepted dead-zone fraction.
pub const MAX_DEAD_ZONE: f32 = 0.95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub dead_zone: f32,
    pub look_sensitivity: f32,
    pub double_tap_ms: u64,
    pub clickable_thumbsticks: bool,
    pub enabled: bool,
    pub active_profile: String,
    pub debug_feed: bool,
    /// Forward OS text input as synthetic keystrokes
    pub mobile_keyboard: bool,
    pub left_stick_mode: StickMode,
    pub right_stick_mode: StickMode,
    pub layout: Layout,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dead_zone: 0.3,
            look_sensitivity: 2.5,
            double_tap_ms: 300,
            clickable_thumbsticks: true,
            enabled: true,
            active_profile: DEFAULT_PROFILE.to_string(),
            debug_feed: true,
            mobile_keyboard: true,
            left_stick_mode: StickMode::Movement,
            right_stick_mode: StickMode::Look,
            layout: Layout::default(),
        }
    }
}

impl Settings {
    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_ms)
    }

    /// Applies every valid field of `overlay`.
    ///
    /// Returns what changed and a message per rejected field.
    pub fn apply(&mut self, overlay: &SettingsOverlay) -> (SettingsChange, Vec<String>) {
        let mut change = SettingsChange::default();
        let mut rejected = Vec::new();

        if let Some(dz) = overlay.dead_zone {
            if (0.0..=MAX_DEAD_ZONE).contains(&dz) {
                self.dead_zone = dz;
            } else {
                rejected.push(format!(
                    "dead_zone {} outside [0, {}]",
                    dz, MAX_DEAD_ZONE
                ));
            }
        }
        if let Some(sens) = overlay.look_sensitivity {
            if sens.is_finite() && sens > 0.0 {
                self.look_sensitivity = sens;
            } else {
                rejected.push(format!("look_sensitivity {} must be positive", sens));
            }
        }
        if let Some(ms) = overlay.double_tap_ms {
            if ms > 0 {
                self.double_tap_ms = ms;
            } else {
                rejected.push("double_tap_ms must be positive".to_string());
            }
        }
        if let Some(clickable) = overlay.clickable_thumbsticks {
            self.clickable_thumbsticks = clickable;
        }
        if let Some(enabled) = overlay.enabled {
            change.enabled = self.enabled != enabled;
            self.enabled = enabled;
        }
        if let Some(profile) = &overlay.active_profile {
            change.profile = self.active_profile != *profile;
            self.active_profile = profile.clone();
        }
        if let Some(feed) = overlay.debug_feed {
            self.debug_feed = feed;
        }
        if let Some(mobile) = overlay.mobile_keyboard {
            self.mobile_keyboard = mobile;
        }
        if let Some(mode) = overlay.left_stick_mode {
            change.controls |= self.left_stick_mode != mode;
            self.left_stick_mode = mode;
        }
        if let Some(mode) = overlay.right_stick_mode {
            change.controls |= self.right_stick_mode != mode;
            self.right_stick_mode = mode;
        }
        if let Some(layout) = &overlay.layout {
            if layout.viewport.width > 0.0 && layout.viewport.height > 0.0 {
                change.controls |= self.layout != *layout;
                self.layout = layout.clone();
            } else {
                rejected.push("layout viewport must be non-empty".to_string());
            }
        }

        (change, rejected)
    }

    /// Full overlay describing these settings, used for the persisted blob.
    pub fn to_overlay(&self) -> SettingsOverlay {
        SettingsOverlay {
            dead_zone: Some(self.dead_zone),
            look_sensitivity: Some(self.look_sensitivity),
            double_tap_ms: Some(self.double_tap_ms),
            clickable_thumbsticks: Some(self.clickable_thumbsticks),
            enabled: Some(self.enabled),
            active_profile: Some(self.active_profile.clone()),
            debug_feed: Some(self.debug_feed),
            mobile_keyboard: Some(self.mobile_keyboard),
            left_stick_mode: Some(self.left_stick_mode),
            right_stick_mode: Some(self.right_stick_mode),
            layout: Some(self.layout.clone()),
        }
    }
}

/// Partial settings. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverlay {
    pub dead_zone: Option<f32>,
    pub look_sensitivity: Option<f32>,
    pub double_tap_ms: Option<u64>,
    pub clickable_thumbsticks: Option<bool>,
    pub enabled: Option<bool>,
    pub active_profile: Option<String>,
    pub debug_feed: Option<bool>,
    pub mobile_keyboard: Option<bool>,
    pub left_stick_mode: Option<StickMode>,
    pub right_stick_mode: Option<StickMode>,
    pub layout: Option<Layout>,
}

/// Side effects an applied overlay requires from the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub enabled: bool,
    pub profile: bool,
    /// Stick mode or layout changed, so the controls must be recreated.
    pub controls: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.dead_zone, 0.3);
        assert_eq!(s.look_sensitivity, 2.5);
        assert_eq!(s.double_tap_window(), Duration::from_millis(300));
        assert_eq!(s.active_profile, "quake3");
        assert_eq!(s.left_stick_mode, StickMode::Movement);
        assert_eq!(s.right_stick_mode, StickMode::Look);
        assert_eq!(CALIBRATION_TIMEOUT, Duration::from_secs(5));
    }

    #[test]
    fn invalid_fields_are_rejected_individually() {
        let mut s = Settings::default();
        let overlay = SettingsOverlay {
            dead_zone: Some(1.5),
            look_sensitivity: Some(4.0),
            double_tap_ms: Some(0),
            ..Default::default()
        };
        let (_, rejected) = s.apply(&overlay);
        assert_eq!(rejected.len(), 2);
        assert_eq!(s.dead_zone, 0.3);
        assert_eq!(s.look_sensitivity, 4.0);
        assert_eq!(s.double_tap_ms, 300);
    }

    #[test]
    fn later_overlay_wins() {
        let mut s = Settings::default();
        s.apply(&SettingsOverlay {
            dead_zone: Some(0.1),
            double_tap_ms: Some(250),
            ..Default::default()
        });
        s.apply(&SettingsOverlay {
            dead_zone: Some(0.2),
            ..Default::default()
        });
        assert_eq!(s.dead_zone, 0.2);
        assert_eq!(s.double_tap_ms, 250);
    }

    #[test]
    fn mode_change_requests_control_rebuild() {
        let mut s = Settings::default();
        let (change, _) = s.apply(&SettingsOverlay {
            right_stick_mode: Some(StickMode::Movement),
            ..Default::default()
        });
        assert!(change.controls);
        let (change, _) = s.apply(&SettingsOverlay {
            right_stick_mode: Some(StickMode::Movement),
            ..Default::default()
        });
        assert!(!change.controls);
    }

    #[test]
    fn partial_blob_parses() {
        let overlay: SettingsOverlay =
            toml::from_str("dead_zone = 0.25\nright_stick_mode = \"movement\"\n").unwrap();
        assert_eq!(overlay.dead_zone, Some(0.25));
        assert_eq!(overlay.right_stick_mode, Some(StickMode::Movement));
        assert!(overlay.layout.is_none());
    }

    #[test]
    fn full_overlay_round_trips_through_toml() {
        let s = Settings::default();
        let text = toml::to_string_pretty(&s.to_overlay()).unwrap();
        let overlay: SettingsOverlay = toml::from_str(&text).unwrap();
        let mut restored = Settings::default();
        restored.dead_zone = 0.0;
        restored.apply(&overlay);
        assert_eq!(restored, s);
    }
}
