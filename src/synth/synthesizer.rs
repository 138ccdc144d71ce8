use super::{Action, InputSink, KeyState, KeyStroke, LookDirection, MouseButton};
use crate::engine::timer::Ticker;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Period of the mouse-look tickers (about 60 Hz).
pub const LOOK_TICK: Duration = Duration::from_millis(16);
/// Pixels per tick at full deflection and sensitivity 1.
pub const LOOK_SPEED_SCALE: f32 = 8.0;

/// Dispatches actions to the sink and tracks what is currently held.
///
/// The held sets exist for introspection and for [`Synthesizer::release_all`];
/// every call is forwarded to the sink regardless.
pub struct Synthesizer {
    sink: Box<dyn InputSink + Send>,
    pressed_keys: BTreeMap<String, (KeyStroke, usize)>,
    mouse_buttons: BTreeMap<MouseButton, usize>,
    look_held: BTreeMap<LookDirection, usize>,
    look_ticker: Ticker,
}

impl Synthesizer {
    pub fn new(sink: Box<dyn InputSink + Send>) -> Self {
        Self {
            sink,
            pressed_keys: BTreeMap::new(),
            mouse_buttons: BTreeMap::new(),
            look_held: BTreeMap::new(),
            look_ticker: Ticker::new(LOOK_TICK),
        }
    }

    /// Sends `action` down or up. Unmapped actions are ignored.
    pub fn send_key(&mut self, action: &str, state: KeyState, now: Instant) {
        match Action::parse(action) {
            Action::Unmapped => {}
            Action::Mouse(button) => self.send_mouse_button(button, state),
            Action::Look(direction) => self.hold_look(direction, state, now),
            Action::Key(stroke) => {
                debug!("Key {} {}", action, state);
                match state {
                    KeyState::Down => {
                        self.pressed_keys
                            .entry(action.to_string())
                            .or_insert_with(|| (stroke.clone(), 0))
                            .1 += 1;
                    }
                    KeyState::Up => {
                        if let Some((_, count)) = self.pressed_keys.get_mut(action) {
                            *count -= 1;
                            if *count == 0 {
                                self.pressed_keys.remove(action);
                            }
                        }
                    }
                }
                self.sink.emit_key(&stroke, state);
            }
        }
    }

    pub fn send_mouse_button(&mut self, button: MouseButton, state: KeyState) {
        debug!("Mouse {:?} {}", button, state);
        match state {
            KeyState::Down => *self.mouse_buttons.entry(button).or_insert(0) += 1,
            KeyState::Up => {
                if let Some(count) = self.mouse_buttons.get_mut(&button) {
                    *count -= 1;
                    if *count == 0 {
                        self.mouse_buttons.remove(&button);
                    }
                }
            }
        }
        self.sink.emit_mouse_button(button, state);
    }

    pub fn send_mouse_move(&mut self, dx: f32, dy: f32) {
        self.sink.emit_mouse_move(dx, dy);
    }

    /// Types `text` as one down/up pair per character.
    ///
    /// `\n` and `\r` become Enter and `\u{8}` becomes Backspace. Nothing is
    /// held afterwards, so the held sets are not touched. Returns the number
    /// of strokes sent.
    pub fn type_text(&mut self, text: &str) -> usize {
        let mut sent = 0;
        for c in text.chars() {
            let stroke = match c {
                '\n' | '\r' => KeyStroke {
                    key: "Enter".to_string(),
                    code: "Enter".to_string(),
                },
                '\u{8}' => KeyStroke {
                    key: "Backspace".to_string(),
                    code: "Backspace".to_string(),
                },
                c if c.is_control() => continue,
                c => text_stroke(c),
            };
            debug!("Text {:?}", stroke.key);
            self.sink.emit_key(&stroke, KeyState::Down);
            self.sink.emit_key(&stroke, KeyState::Up);
            sent += 1;
        }
        sent
    }

    fn hold_look(&mut self, direction: LookDirection, state: KeyState, now: Instant) {
        debug!("Mouse look {:?} {}", direction, state);
        match state {
            KeyState::Down => *self.look_held.entry(direction).or_insert(0) += 1,
            KeyState::Up => {
                if let Some(count) = self.look_held.get_mut(&direction) {
                    *count -= 1;
                    if *count == 0 {
                        self.look_held.remove(&direction);
                    }
                }
            }
        }

        if self.look_held.is_empty() {
            self.look_ticker.stop();
        } else {
            self.look_ticker.start(now);
        }
    }

    /// Emits one mouse move for held look directions if a tick is due.
    pub fn advance(&mut self, now: Instant, sensitivity: f32) {
        if !self.look_ticker.poll(now) {
            return;
        }
        let held = |d: LookDirection| if self.look_held.contains_key(&d) { 1.0 } else { 0.0 };
        let x = held(LookDirection::Right) - held(LookDirection::Left);
        let y = held(LookDirection::Down) - held(LookDirection::Up);
        if x != 0.0 || y != 0.0 {
            let speed = sensitivity * LOOK_SPEED_SCALE;
            self.sink.emit_mouse_move(x * speed, y * speed);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.look_ticker.deadline()
    }

    /// Releases every held key and mouse button exactly once and drops held
    /// mouse-look.
    pub fn release_all(&mut self) {
        let keys = std::mem::take(&mut self.pressed_keys);
        for (action, (stroke, _)) in keys {
            debug!("Bulk release {}", action);
            self.sink.emit_key(&stroke, KeyState::Up);
        }
        let buttons = std::mem::take(&mut self.mouse_buttons);
        for button in buttons.into_keys() {
            self.sink.emit_mouse_button(button, KeyState::Up);
        }
        self.look_held.clear();
        self.look_ticker.stop();
    }

    /// Actions of the keys currently held.
    pub fn pressed_keys(&self) -> Vec<String> {
        self.pressed_keys.keys().cloned().collect()
    }

    pub fn pressed_mouse_buttons(&self) -> Vec<MouseButton> {
        self.mouse_buttons.keys().copied().collect()
    }

    pub fn is_looking(&self) -> bool {
        self.look_ticker.is_running()
    }
}

/// Letters get a `Key<upper>` code, like a physical keyboard reports them.
fn text_stroke(c: char) -> KeyStroke {
    let key = c.to_string();
    let code = if c.is_alphabetic() {
        format!("Key{}", c.to_uppercase())
    } else if c == ' ' {
        "Space".to_string()
    } else {
        key.to_uppercase()
    };
    KeyStroke { key, code }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{RecordingSink, SyntheticEvent};

    fn synth() -> (Synthesizer, RecordingSink) {
        let sink = RecordingSink::new();
        (Synthesizer::new(Box::new(sink.clone())), sink)
    }

    #[test]
    fn keys_are_forwarded_and_tracked() {
        let (mut s, sink) = synth();
        let now = Instant::now();
        s.send_key("w", KeyState::Down, now);
        assert_eq!(s.pressed_keys(), vec!["w".to_string()]);
        s.send_key("w", KeyState::Up, now);
        assert!(s.pressed_keys().is_empty());
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn shared_key_stays_held_until_last_release() {
        let (mut s, sink) = synth();
        let now = Instant::now();
        s.send_key("e", KeyState::Down, now);
        s.send_key("e", KeyState::Down, now);
        s.send_key("e", KeyState::Up, now);
        assert_eq!(s.pressed_keys(), vec!["e".to_string()]);
        sink.take();
        s.release_all();
        let events = sink.take();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn mouse_actions_route_to_buttons() {
        let (mut s, sink) = synth();
        s.send_key("MOUSE_LEFT", KeyState::Down, Instant::now());
        assert_eq!(s.pressed_mouse_buttons(), vec![MouseButton::Left]);
        assert!(s.pressed_keys().is_empty());
        assert_eq!(
            sink.events(),
            vec![SyntheticEvent::MouseButton {
                button: MouseButton::Left,
                state: KeyState::Down
            }]
        );
    }

    #[test]
    fn held_look_moves_each_tick_until_released() {
        let (mut s, sink) = synth();
        let t0 = Instant::now();
        s.send_key("MOUSE_LOOK_RIGHT", KeyState::Down, t0);
        assert!(s.is_looking());
        s.advance(t0 + LOOK_TICK, 2.5);
        assert_eq!(
            sink.take(),
            vec![SyntheticEvent::MouseMove { dx: 20.0, dy: 0.0 }]
        );
        s.send_key("MOUSE_LOOK_RIGHT", KeyState::Up, t0 + LOOK_TICK);
        assert!(!s.is_looking());
        s.advance(t0 + LOOK_TICK * 4, 2.5);
        assert!(sink.take().is_empty());
    }

    #[test]
    fn release_all_covers_keys_and_buttons() {
        let (mut s, sink) = synth();
        let now = Instant::now();
        s.send_key("w", KeyState::Down, now);
        s.send_key("a", KeyState::Down, now);
        s.send_key("MOUSE_RIGHT", KeyState::Down, now);
        s.send_key("MOUSE_UP", KeyState::Down, now);
        sink.take();

        s.release_all();
        let events = sink.take();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| matches!(
            e,
            SyntheticEvent::Key { state: KeyState::Up, .. }
                | SyntheticEvent::MouseButton { state: KeyState::Up, .. }
        )));
        assert!(s.pressed_keys().is_empty());
        assert!(s.pressed_mouse_buttons().is_empty());
        assert!(!s.is_looking());
    }

    #[test]
    fn shared_mouse_button_stays_held_until_last_release() {
        let (mut s, sink) = synth();
        let now = Instant::now();
        s.send_key("MOUSE_LEFT", KeyState::Down, now);
        s.send_mouse_button(MouseButton::Left, KeyState::Down);
        s.send_key("MOUSE_LEFT", KeyState::Up, now);
        assert_eq!(s.pressed_mouse_buttons(), vec![MouseButton::Left]);

        sink.take();
        s.release_all();
        assert_eq!(
            sink.take(),
            vec![SyntheticEvent::MouseButton {
                button: MouseButton::Left,
                state: KeyState::Up
            }]
        );
        assert!(s.pressed_mouse_buttons().is_empty());
    }

    #[test]
    fn typed_text_is_a_pair_per_character() {
        let (mut s, sink) = synth();
        assert_eq!(s.type_text("hi 2\n\u{8}"), 6);

        let strokes: Vec<(String, String, KeyState)> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SyntheticEvent::Key { stroke, state } => Some((stroke.key, stroke.code, state)),
                _ => None,
            })
            .collect();
        assert_eq!(strokes.len(), 12);
        assert_eq!(strokes[0], ("h".into(), "KeyH".into(), KeyState::Down));
        assert_eq!(strokes[1], ("h".into(), "KeyH".into(), KeyState::Up));
        assert_eq!(strokes[4], (" ".into(), "Space".into(), KeyState::Down));
        assert_eq!(strokes[8], ("Enter".into(), "Enter".into(), KeyState::Down));
        assert_eq!(strokes[11], ("Backspace".into(), "Backspace".into(), KeyState::Up));
        assert!(s.pressed_keys().is_empty());
    }

    #[test]
    fn typed_control_characters_are_skipped() {
        let (mut s, sink) = synth();
        assert_eq!(s.type_text("\t\u{1b}"), 0);
        assert!(sink.events().is_empty());
    }
}
