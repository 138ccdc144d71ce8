//! # Pointer Registry
//!
//! Tracks every live pointer and the control that owns it.
//!
//! Ownership is exclusive both ways: a pointer drives at most one control and
//! a control accepts at most one pointer. A pointer-down binds to the first
//! control in hit order that contains it and is free; touches on empty space
//! or on occupied controls are dropped without registering.

use super::PointerId;
use crate::controls::geometry::Point;
use crate::controls::{ControlContext, ControlSet, ControlSlot, DownOutcome, MoveOutcome};
use crate::profile::ControlId;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub id: PointerId,
    pub position: Point,
    /// `None` once a button released it by being slid off
    pub bound: Option<ControlSlot>,
}

#[derive(Debug, Default)]
pub struct PointerRegistry {
    pointers: HashMap<PointerId, Pointer>,
    owners: HashMap<ControlSlot, PointerId>,
}

impl PointerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `id` to the first free control under `p`.
    ///
    /// Controls suspended by calibration of `calibrating` are skipped. A
    /// repeated down for a live pointer is handled as a cancel followed by a
    /// fresh down.
    pub fn pointer_down(
        &mut self,
        id: PointerId,
        p: Point,
        controls: &mut ControlSet,
        ctx: &mut ControlContext<'_>,
        calibrating: Option<ControlId>,
    ) -> Option<ControlSlot> {
        if self.pointers.contains_key(&id) {
            warn!("Pointer {} went down twice, cancelling the first contact", id);
            self.pointer_up(id, controls, ctx);
        }

        let owners = &self.owners;
        let Some(slot) = controls.hit_test(p, |slot| {
            !owners.contains_key(&slot) && !slot.is_calibrating(calibrating)
        }) else {
            debug!("Pointer {} at ({:.0}, {:.0}) hit no free control", id, p.x, p.y);
            return None;
        };

        match controls.pointer_down(slot, p, ctx) {
            DownOutcome::Bound => {
                debug!("Pointer {} bound to {:?}", id, slot);
                self.pointers.insert(
                    id,
                    Pointer {
                        id,
                        position: p,
                        bound: Some(slot),
                    },
                );
                self.owners.insert(slot, id);
                Some(slot)
            }
            DownOutcome::Consumed => None,
        }
    }

    /// Forwards the new position to the owning control, if any.
    pub fn pointer_move(
        &mut self,
        id: PointerId,
        p: Point,
        controls: &mut ControlSet,
        ctx: &mut ControlContext<'_>,
    ) {
        let Some(pointer) = self.pointers.get_mut(&id) else {
            return;
        };
        pointer.position = p;
        let Some(slot) = pointer.bound else {
            return;
        };

        if controls.pointer_move(slot, p, ctx) == MoveOutcome::Released {
            debug!("Pointer {} slid off {:?}", id, slot);
            pointer.bound = None;
            self.owners.remove(&slot);
        }
    }

    /// Unregisters `id` and returns its control to rest.
    pub fn pointer_up(
        &mut self,
        id: PointerId,
        controls: &mut ControlSet,
        ctx: &mut ControlContext<'_>,
    ) {
        let Some(pointer) = self.pointers.remove(&id) else {
            return;
        };
        if let Some(slot) = pointer.bound {
            self.owners.remove(&slot);
            controls.release(slot, ctx);
            debug!("Pointer {} released {:?}", id, slot);
        }
    }

    /// Same as [`PointerRegistry::pointer_up`]; interrupted gestures must not
    /// leave keys held.
    pub fn pointer_cancel(
        &mut self,
        id: PointerId,
        controls: &mut ControlSet,
        ctx: &mut ControlContext<'_>,
    ) {
        self.pointer_up(id, controls, ctx);
    }

    /// Forgets every pointer without touching the controls. Used when the
    /// controls themselves are being torn down.
    pub fn clear(&mut self) {
        self.pointers.clear();
        self.owners.clear();
    }

    pub fn get(&self, id: PointerId) -> Option<&Pointer> {
        self.pointers.get(&id)
    }

    pub fn owner(&self, slot: ControlSlot) -> Option<PointerId> {
        self.owners.get(&slot).copied()
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::controls::StickSide;
    use crate::diagnostics::Diagnostics;
    use crate::profile::{templates, Mapping};
    use crate::synth::{KeyState, RecordingSink, Synthesizer, SyntheticEvent};
    use std::time::Duration;
    use tokio::time::Instant;

    struct Rig {
        registry: PointerRegistry,
        controls: ControlSet,
        synth: Synthesizer,
        sink: RecordingSink,
        diagnostics: Diagnostics,
        settings: Settings,
        mapping: Mapping,
        now: Instant,
    }

    impl Rig {
        fn new() -> Self {
            let settings = Settings::default();
            let sink = RecordingSink::new();
            Self {
                registry: PointerRegistry::new(),
                controls: ControlSet::new(&settings),
                synth: Synthesizer::new(Box::new(sink.clone())),
                sink,
                diagnostics: Diagnostics::new(),
                settings,
                mapping: templates::template("quake3").unwrap().mappings,
                now: Instant::now(),
            }
        }

        fn down(&mut self, id: i64, p: Point) -> Option<ControlSlot> {
            let mut ctx = ControlContext {
                synth: &mut self.synth,
                mapping: &self.mapping,
                diagnostics: &mut self.diagnostics,
                settings: &self.settings,
                now: self.now,
            };
            self.registry
                .pointer_down(PointerId::Touch(id), p, &mut self.controls, &mut ctx, None)
        }

        fn moved(&mut self, id: i64, p: Point) {
            let mut ctx = ControlContext {
                synth: &mut self.synth,
                mapping: &self.mapping,
                diagnostics: &mut self.diagnostics,
                settings: &self.settings,
                now: self.now,
            };
            self.registry
                .pointer_move(PointerId::Touch(id), p, &mut self.controls, &mut ctx);
        }

        fn up(&mut self, id: i64) {
            let mut ctx = ControlContext {
                synth: &mut self.synth,
                mapping: &self.mapping,
                diagnostics: &mut self.diagnostics,
                settings: &self.settings,
                now: self.now,
            };
            self.registry
                .pointer_up(PointerId::Touch(id), &mut self.controls, &mut ctx);
        }

        fn button_centre(&self, id: ControlId) -> Point {
            match self.controls.layout().button_region(id) {
                Some(crate::controls::geometry::HitRegion::Circle(c)) => c.center,
                Some(crate::controls::geometry::HitRegion::Rect(r)) => {
                    Point::new(r.x + r.width / 2.0, r.y + r.height / 2.0)
                }
                None => panic!("{id} has no region"),
            }
        }
    }

    #[test]
    fn touches_on_empty_space_are_dropped() {
        let mut rig = Rig::new();
        assert_eq!(rig.down(1, Point::new(640.0, 300.0)), None);
        assert!(rig.registry.is_empty());
    }

    #[test]
    fn first_touch_wins() {
        let mut rig = Rig::new();
        let centre = rig.controls.layout().left_stick.center;
        let stick = ControlSlot::Stick(StickSide::Left);
        assert_eq!(rig.down(1, centre), Some(stick));
        for id in 2..6 {
            assert_eq!(rig.down(id, centre), None);
        }
        assert_eq!(rig.registry.owner(stick), Some(PointerId::Touch(1)));
        assert_eq!(rig.registry.len(), 1);

        rig.up(1);
        // a quick re-touch would be a double tap
        rig.now += rig.settings.double_tap_window();
        assert_eq!(rig.down(7, centre), Some(stick));
    }

    #[test]
    fn quick_retouch_on_a_stick_is_not_bound() {
        let mut rig = Rig::new();
        let centre = rig.controls.layout().left_stick.center;
        rig.down(1, centre);
        rig.up(1);
        rig.now += Duration::from_millis(100);

        assert_eq!(rig.down(2, centre), None);
        assert!(rig.registry.is_empty());
        assert_eq!(rig.registry.owner(ControlSlot::Stick(StickSide::Left)), None);
        assert!(matches!(
            &rig.sink.events()[..],
            [SyntheticEvent::Key { stroke, state: KeyState::Down }] if stroke.key == "shift"
        ));
    }

    #[test]
    fn sliding_off_a_button_releases_it() {
        let mut rig = Rig::new();
        let a = rig.button_centre(ControlId::ButtonA);
        let slot = ControlSlot::Button(ControlId::ButtonA);
        assert_eq!(rig.down(1, a), Some(slot));
        rig.moved(1, Point::new(640.0, 300.0));

        assert!(!rig.controls.button(ControlId::ButtonA).unwrap().is_pressed());
        assert_eq!(rig.registry.owner(slot), None);
        assert_eq!(rig.registry.get(PointerId::Touch(1)).unwrap().bound, None);

        // sliding back in does not rebind
        rig.moved(1, a);
        assert!(!rig.controls.button(ControlId::ButtonA).unwrap().is_pressed());

        let events = rig.sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            SyntheticEvent::Key {
                state: KeyState::Up,
                ..
            }
        ));
    }

    #[test]
    fn repeated_down_cancels_the_first_contact() {
        let mut rig = Rig::new();
        let a = rig.button_centre(ControlId::ButtonA);
        let b = rig.button_centre(ControlId::ButtonB);
        rig.down(1, a);
        assert_eq!(rig.down(1, b), Some(ControlSlot::Button(ControlId::ButtonB)));
        assert!(!rig.controls.button(ControlId::ButtonA).unwrap().is_pressed());
        assert!(rig.controls.button(ControlId::ButtonB).unwrap().is_pressed());
        assert_eq!(rig.registry.len(), 1);
    }

    #[test]
    fn unknown_pointers_are_ignored() {
        let mut rig = Rig::new();
        rig.moved(42, Point::new(1.0, 1.0));
        rig.up(42);
        assert!(rig.sink.events().is_empty());
    }
}
