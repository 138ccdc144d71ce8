use super::ControlContext;
use crate::diagnostics::Category;
use crate::profile::ControlId;
use crate::synth::KeyState;

/// A discrete button: face, D-pad, shoulder or system.
///
/// The hit region is not stored here; it is rendered from the layout on
/// every pointer event.
#[derive(Debug, Clone)]
pub struct ButtonControl {
    id: ControlId,
    pressed: bool,
    /// Action sent on press, released on release
    sent: Option<String>,
}

impl ButtonControl {
    pub fn new(id: ControlId) -> Self {
        Self {
            id,
            pressed: false,
            sent: None,
        }
    }

    pub fn id(&self) -> ControlId {
        self.id
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Returns false if already pressed.
    pub fn press(&mut self, ctx: &mut ControlContext<'_>) -> bool {
        if self.pressed {
            return false;
        }
        self.pressed = true;

        if let Some(action) = ctx.mapping.get(self.id) {
            ctx.synth.send_key(action, KeyState::Down, ctx.now);
            ctx.diagnostics
                .debug(ctx.now, Category::Input, format!("{} down ({:?})", self.id, action));
            self.sent = Some(action.to_string());
        }
        true
    }

    /// Returns false if not pressed.
    pub fn release(&mut self, ctx: &mut ControlContext<'_>) -> bool {
        if !self.pressed {
            return false;
        }
        self.pressed = false;

        if let Some(action) = self.sent.take() {
            ctx.synth.send_key(&action, KeyState::Up, ctx.now);
            ctx.diagnostics
                .debug(ctx.now, Category::Input, format!("{} up ({:?})", self.id, action));
        }
        true
    }
}
