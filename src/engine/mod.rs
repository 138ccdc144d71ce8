//! # Engine
//!
//! The explicit context object tying every subsystem together. One engine
//! is one independent overlay: nothing is global, so tests (or hosts) can
//! run as many as they like side by side.
//!
//! ```text
//! pointer events ──► PointerRegistry ──► ControlSet ──► Synthesizer ──► InputSink
//!                                            │               ▲
//! physical input ──► CalibrationCoordinator ─┴─► Mapping ────┘
//!                                    (all of it)  ──► Diagnostics
//! ```
//!
//! Every operation takes `now` explicitly. Timers never fire on their own:
//! [`Engine::advance`] runs whatever is due, and [`Engine::next_deadline`]
//! tells the caller when to call it next. Each entry point also runs due
//! timers first, so state is never observed stale.

pub mod driver;
pub mod timer;

pub use driver::{EngineCommand, EngineHandle};

use crate::calibration::CalibrationCoordinator;
use crate::config::{Settings, SettingsOverlay};
use crate::controls::geometry::{Point, Vector};
use crate::controls::{
    ControlContext, ControlSet, ControlSlot, Direction, Layout, StickMode, StickSide,
};
use crate::diagnostics::{Category, Diagnostic, Diagnostics};
use crate::error::EngineError;
use crate::input::{PhysicalInput, PointerEvent, PointerId, PointerPhase, PointerRegistry};
use crate::persistence::{self, KeyValueStore, CONFIG_KEY};
use crate::profile::store::SaveOutcome;
use crate::profile::templates::DEFAULT_PROFILE;
use crate::profile::{ControlId, Mapping, ProfileStore};
use crate::synth::{InputSink, MouseButton, Synthesizer};
use timer::earliest;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::info;

/// Builds a [`ControlContext`] from disjoint engine fields.
macro_rules! control_context {
    ($engine:ident, $now:expr) => {
        ControlContext {
            synth: &mut $engine.synth,
            mapping: $engine.profiles.mapping(),
            diagnostics: &mut $engine.diagnostics,
            settings: &$engine.settings,
            now: $now,
        }
    };
}

/// Public view of one stick.
#[derive(Debug, Clone, PartialEq)]
pub struct StickSnapshot {
    pub mode: StickMode,
    pub position: Vector,
    pub active: Vec<Direction>,
    pub look: Vector,
    pub thumb_click: bool,
}

/// The "current input snapshot" consumed by outer collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSnapshot {
    pub enabled: bool,
    pub profile_id: String,
    pub profile_name: String,
    pub mapping: Mapping,
    pub pressed_keys: Vec<String>,
    pub mouse_buttons: Vec<MouseButton>,
    pub pressed_buttons: Vec<ControlId>,
    pub left_stick: StickSnapshot,
    pub right_stick: StickSnapshot,
    pub calibrating: Option<ControlId>,
    pub pointers: usize,
}

pub struct Engine {
    settings: Settings,
    profiles: ProfileStore,
    store: Box<dyn KeyValueStore + Send>,
    registry: PointerRegistry,
    controls: ControlSet,
    synth: Synthesizer,
    calibration: CalibrationCoordinator,
    diagnostics: Diagnostics,
}

impl Engine {
    /// Builds an engine from persisted state.
    ///
    /// Settings start at their defaults with the stored blob applied on top;
    /// the active profile is its template plus the stored overlay. Storage
    /// problems and malformed blobs are reported and otherwise ignored.
    pub fn load(
        sink: Box<dyn InputSink + Send>,
        store: Box<dyn KeyValueStore + Send>,
        now: Instant,
    ) -> Self {
        let mut diagnostics = Diagnostics::new();
        let mut settings = Settings::default();

        if let Some(overlay) = read_settings(store.as_ref(), now, &mut diagnostics) {
            let (_, rejected) = settings.apply(&overlay);
            for message in rejected {
                diagnostics.warn(
                    now,
                    Category::Config,
                    format!("Stored setting ignored: {}", message),
                );
            }
        }
        diagnostics.set_feed_enabled(settings.debug_feed);

        let mut profiles = ProfileStore::new();
        let active = settings.active_profile.clone();
        if let Err(e) = profiles.switch(&active, store.as_ref(), now, &mut diagnostics) {
            diagnostics.warn(
                now,
                Category::Profile,
                format!("{}, using {}", e, DEFAULT_PROFILE),
            );
            settings.active_profile = DEFAULT_PROFILE.to_string();
            if let Err(e) = profiles.switch(DEFAULT_PROFILE, store.as_ref(), now, &mut diagnostics)
            {
                diagnostics.warn(now, Category::Profile, e.to_string());
            }
        }

        let controls = ControlSet::new(&settings);
        info!(
            "Engine loaded: profile {}, {}",
            settings.active_profile,
            if settings.enabled { "enabled" } else { "disabled" }
        );

        Self {
            settings,
            profiles,
            store,
            registry: PointerRegistry::new(),
            controls,
            synth: Synthesizer::new(sink),
            calibration: CalibrationCoordinator::new(),
            diagnostics,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn layout(&self) -> &Layout {
        self.controls.layout()
    }

    pub fn mapping(&self) -> &Mapping {
        self.profiles.mapping()
    }

    // ---- pointers ----

    /// Returns the control the pointer was bound to, if any.
    pub fn pointer_down(
        &mut self,
        id: PointerId,
        x: f32,
        y: f32,
        now: Instant,
    ) -> Option<ControlSlot> {
        self.advance(now);
        if !self.settings.enabled {
            return None;
        }
        let calibrating = self.calibration.target();
        let mut ctx = control_context!(self, now);
        self.registry
            .pointer_down(id, Point::new(x, y), &mut self.controls, &mut ctx, calibrating)
    }

    pub fn pointer_move(&mut self, id: PointerId, x: f32, y: f32, now: Instant) {
        self.advance(now);
        if !self.settings.enabled {
            return;
        }
        let mut ctx = control_context!(self, now);
        self.registry
            .pointer_move(id, Point::new(x, y), &mut self.controls, &mut ctx);
    }

    pub fn pointer_up(&mut self, id: PointerId, now: Instant) {
        self.advance(now);
        let mut ctx = control_context!(self, now);
        self.registry.pointer_up(id, &mut self.controls, &mut ctx);
    }

    pub fn pointer_cancel(&mut self, id: PointerId, now: Instant) {
        self.advance(now);
        let mut ctx = control_context!(self, now);
        self.registry
            .pointer_cancel(id, &mut self.controls, &mut ctx);
    }

    /// Dispatches a [`PointerEvent`] to the matching handler.
    pub fn handle_pointer(&mut self, event: PointerEvent, now: Instant) {
        let PointerEvent { id, phase, position } = event;
        match phase {
            PointerPhase::Down => {
                self.pointer_down(id, position.x, position.y, now);
            }
            PointerPhase::Move => self.pointer_move(id, position.x, position.y, now),
            PointerPhase::Up => self.pointer_up(id, now),
            PointerPhase::Cancel => self.pointer_cancel(id, now),
        }
    }

    // ---- text ----

    /// Forwards text from the OS keyboard as keystrokes. Returns the number
    /// of strokes sent; nothing is sent while disabled or with
    /// `mobile_keyboard` off.
    pub fn text_input(&mut self, text: &str, now: Instant) -> usize {
        self.advance(now);
        if !self.settings.enabled || !self.settings.mobile_keyboard {
            self.diagnostics
                .debug(now, Category::Input, "Text input ignored");
            return 0;
        }
        let sent = self.synth.type_text(text);
        self.diagnostics
            .debug(now, Category::Input, format!("Typed {} keys", sent));
        sent
    }

    // ---- calibration ----

    /// Offers a physical input to calibration. Returns true if it was
    /// consumed and must not reach the host.
    pub fn on_physical_input(&mut self, input: PhysicalInput, now: Instant) -> bool {
        self.advance(now);
        let capture = self.calibration.on_physical_input(
            &input,
            self.profiles.mapping_mut(),
            now,
            &mut self.diagnostics,
        );
        capture.consumed()
    }

    pub fn start_calibration(&mut self, target: ControlId, now: Instant) {
        self.advance(now);
        self.calibration.start(target, now, &mut self.diagnostics);
    }

    pub fn cancel_calibration(&mut self, now: Instant) {
        self.calibration.cancel(now, &mut self.diagnostics);
    }

    pub fn calibration_target(&self) -> Option<ControlId> {
        self.calibration.target()
    }

    /// Persists the active mapping under the active profile id.
    pub fn save_calibration(&mut self, now: Instant) -> SaveOutcome {
        self.profiles
            .save(self.store.as_mut(), now, &mut self.diagnostics)
    }

    /// Drops the persisted overlay and restores template defaults.
    pub fn reset_calibration(&mut self, now: Instant) -> SaveOutcome {
        self.profiles
            .reset(self.store.as_mut(), now, &mut self.diagnostics)
    }

    // ---- profiles ----

    /// Loads template + overlay for `id`. Control runtime state is left
    /// alone; a pending calibration is cancelled.
    pub fn switch_profile(&mut self, id: &str, now: Instant) -> Result<(), EngineError> {
        self.advance(now);
        self.calibration.cancel(now, &mut self.diagnostics);
        self.profiles
            .switch(id, self.store.as_ref(), now, &mut self.diagnostics)?;
        self.settings.active_profile = id.to_string();
        Ok(())
    }

    /// `(id, name)` of every available profile.
    pub fn profiles(&self) -> Vec<(String, String)> {
        self.profiles.catalogue()
    }

    pub fn snapshot(&self) -> InputSnapshot {
        let active = self.profiles.active();
        InputSnapshot {
            enabled: self.settings.enabled,
            profile_id: active.id.clone(),
            profile_name: active.name.clone(),
            mapping: active.mappings.clone(),
            pressed_keys: self.synth.pressed_keys(),
            mouse_buttons: self.synth.pressed_mouse_buttons(),
            pressed_buttons: self.controls.pressed_buttons(),
            left_stick: self.stick_snapshot(StickSide::Left),
            right_stick: self.stick_snapshot(StickSide::Right),
            calibrating: self.calibration.target(),
            pointers: self.registry.len(),
        }
    }

    fn stick_snapshot(&self, side: StickSide) -> StickSnapshot {
        let stick = self.controls.stick(side);
        StickSnapshot {
            mode: stick.mode(),
            position: stick.position(),
            active: stick.active_directions(),
            look: stick.look_vector(),
            thumb_click: stick.thumb_click_held(),
        }
    }

    // ---- enable / settings ----

    pub fn enable(&mut self, now: Instant) {
        if self.settings.enabled {
            return;
        }
        self.settings.enabled = true;
        self.diagnostics.info(now, Category::Engine, "Enabled");
    }

    /// Releases every held key and button, then tears down control state.
    pub fn disable(&mut self, now: Instant) {
        if !self.settings.enabled {
            return;
        }
        self.calibration.cancel(now, &mut self.diagnostics);
        self.rebuild_controls();
        self.settings.enabled = false;
        self.diagnostics
            .info(now, Category::Engine, "Disabled, all input released");
    }

    /// Replaces the layout; every control is reset and recreated.
    pub fn set_layout(&mut self, layout: Layout, now: Instant) -> Vec<String> {
        self.update_settings(
            &SettingsOverlay {
                layout: Some(layout),
                ..Default::default()
            },
            now,
        )
    }

    /// Applies a runtime overlay. Returns the rejected fields.
    pub fn update_settings(&mut self, overlay: &SettingsOverlay, now: Instant) -> Vec<String> {
        self.advance(now);
        let previous_profile = self.settings.active_profile.clone();
        let previously_enabled = self.settings.enabled;
        let (change, rejected) = self.settings.apply(overlay);

        for message in &rejected {
            self.diagnostics
                .warn(now, Category::Config, format!("Setting rejected: {}", message));
        }
        self.diagnostics.set_feed_enabled(self.settings.debug_feed);

        if change.controls {
            self.rebuild_controls();
            self.diagnostics
                .info(now, Category::Config, "Controls recreated for new layout");
        }
        if change.profile {
            let id = self.settings.active_profile.clone();
            if let Err(e) = self.switch_profile(&id, now) {
                self.diagnostics.warn(now, Category::Config, e.to_string());
                self.settings.active_profile = previous_profile;
            }
        }
        if change.enabled {
            // apply() already flipped the flag; run the transition from the old value
            self.settings.enabled = previously_enabled;
            if previously_enabled {
                self.disable(now);
            } else {
                self.enable(now);
            }
        }
        rejected
    }

    /// Current settings as a TOML blob.
    pub fn export_settings(&self) -> Result<String, EngineError> {
        Ok(persistence::encode(CONFIG_KEY, &self.settings.to_overlay())?)
    }

    /// Applies a TOML overlay. A malformed blob is discarded and leaves the
    /// settings untouched.
    pub fn import_settings(
        &mut self,
        text: &str,
        now: Instant,
    ) -> Result<Vec<String>, EngineError> {
        match persistence::decode::<SettingsOverlay>(CONFIG_KEY, text) {
            Ok(overlay) => Ok(self.update_settings(&overlay, now)),
            Err(e) => {
                self.diagnostics.warn(
                    now,
                    Category::Config,
                    format!("Discarding imported settings: {}", e),
                );
                Err(EngineError::InvalidSetting(e.to_string()))
            }
        }
    }

    /// Writes the settings blob.
    pub fn save_settings(&mut self, now: Instant) -> SaveOutcome {
        let result = persistence::encode(CONFIG_KEY, &self.settings.to_overlay())
            .and_then(|text| self.store.set(CONFIG_KEY, &text));
        match result {
            Ok(()) => SaveOutcome::Saved,
            Err(e) => {
                self.diagnostics.warn(
                    now,
                    Category::Storage,
                    format!("Settings not saved, keeping them in memory: {}", e),
                );
                SaveOutcome::MemoryOnly
            }
        }
    }

    /// Releases all input, then persists settings and the active mapping.
    pub fn teardown(&mut self, now: Instant) -> SaveOutcome {
        self.calibration.cancel(now, &mut self.diagnostics);
        self.rebuild_controls();
        let settings = self.save_settings(now);
        let mapping = self.save_calibration(now);
        info!("Engine torn down");
        if settings == SaveOutcome::Saved && mapping == SaveOutcome::Saved {
            SaveOutcome::Saved
        } else {
            SaveOutcome::MemoryOnly
        }
    }

    /// Bulk release first, then fresh controls and an empty registry.
    fn rebuild_controls(&mut self) {
        self.synth.release_all();
        self.registry.clear();
        self.controls = ControlSet::new(&self.settings);
    }

    // ---- timers ----

    /// Runs every timer that is due at `now`.
    pub fn advance(&mut self, now: Instant) {
        self.calibration.expire(now, &mut self.diagnostics);
        let mut ctx = control_context!(self, now);
        self.controls.advance(&mut ctx);
        self.synth.advance(now, self.settings.look_sensitivity);
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(
            earliest(self.controls.next_deadline(), self.synth.next_deadline()),
            self.calibration.next_deadline(),
        )
    }

    // ---- diagnostics ----

    pub fn visible_feed(&mut self, now: Instant) -> Vec<String> {
        self.diagnostics.visible_feed(now)
    }

    pub fn subscribe_diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }
}

fn read_settings(
    store: &dyn KeyValueStore,
    now: Instant,
    diagnostics: &mut Diagnostics,
) -> Option<SettingsOverlay> {
    let text = match store.get(CONFIG_KEY) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(e) => {
            diagnostics.warn(now, Category::Storage, format!("Settings unavailable: {}", e));
            return None;
        }
    };
    match persistence::decode(CONFIG_KEY, &text) {
        Ok(overlay) => Some(overlay),
        Err(e) => {
            diagnostics.warn(
                now,
                Category::Config,
                format!("Discarding malformed settings: {}", e),
            );
            None
        }
    }
}
