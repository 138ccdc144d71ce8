use super::{InputSink, KeyState, KeyStroke, MouseButton, SyntheticEvent};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Logs every event. Used by the console host, which has no window to inject into.
#[derive(Debug, Default)]
pub struct TracingSink;

impl InputSink for TracingSink {
    fn emit_key(&mut self, stroke: &KeyStroke, state: KeyState) {
        info!("key {} {:?} ({})", state, stroke.key, stroke.code);
    }

    fn emit_mouse_button(&mut self, button: MouseButton, state: KeyState) {
        info!("mouse {:?} {}", button, state);
    }

    fn emit_mouse_move(&mut self, dx: f32, dy: f32) {
        info!("mouse move {:.2} {:.2}", dx, dy);
    }
}

/// Records events into a shared buffer. Clones see the same buffer, so a test
/// keeps one clone and gives the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SyntheticEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyntheticEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns and clears everything recorded so far.
    pub fn take(&self) -> Vec<SyntheticEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn push(&self, event: SyntheticEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl InputSink for RecordingSink {
    fn emit_key(&mut self, stroke: &KeyStroke, state: KeyState) {
        self.push(SyntheticEvent::Key {
            stroke: stroke.clone(),
            state,
        });
    }

    fn emit_mouse_button(&mut self, button: MouseButton, state: KeyState) {
        self.push(SyntheticEvent::MouseButton { button, state });
    }

    fn emit_mouse_move(&mut self, dx: f32, dy: f32) {
        self.push(SyntheticEvent::MouseMove { dx, dy });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let sink = RecordingSink::new();
        let mut engine_side = sink.clone();
        engine_side.emit_mouse_move(1.0, -1.0);
        engine_side.emit_mouse_button(MouseButton::Left, KeyState::Down);
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.events().is_empty());
    }
}
