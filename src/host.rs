//! Headless host binding: a line protocol read from stdin.
//!
//! ```text
//! down <id|mouse> <x> <y>     move <id|mouse> <x> <y>
//! up <id|mouse>               cancel <id|mouse>
//! key <value>                 click <button index>
//! text <chars>                (escapes: \n enter, \b backspace, \\)
//! calibrate <CONTROL_ID>      save | reset
//! profile <id>                enable | disable
//! status | feed | profiles
//! ```

use crate::engine::{EngineCommand, EngineHandle, InputSnapshot, StickSnapshot};
use crate::error::EngineError;
use crate::input::{PhysicalInput, PointerEvent, PointerId, PointerPhase};
use crate::profile::store::SaveOutcome;
use crate::profile::templates;
use crate::profile::ControlId;
use std::fmt::Write as _;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Empty line")]
    Empty,
    #[error("Unknown command: {0}")]
    UnknownVerb(String),
    #[error("{verb}: missing {argument}")]
    MissingArgument {
        verb: &'static str,
        argument: &'static str,
    },
    #[error("{verb}: invalid {argument} {value:?}")]
    InvalidArgument {
        verb: &'static str,
        argument: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Pointer(PointerEvent),
    Key(String),
    Text(String),
    Click(u8),
    Calibrate(ControlId),
    Save,
    Reset,
    Profile(String),
    Profiles,
    Enable,
    Disable,
    Status,
    Feed,
}

struct Args<'a> {
    verb: &'static str,
    rest: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next(&mut self, argument: &'static str) -> Result<&'a str, ParseError> {
        self.rest.next().ok_or(ParseError::MissingArgument {
            verb: self.verb,
            argument,
        })
    }

    fn parse<T: FromStr>(&mut self, argument: &'static str) -> Result<T, ParseError> {
        let value = self.next(argument)?;
        value.parse().map_err(|_| ParseError::InvalidArgument {
            verb: self.verb,
            argument,
            value: value.to_string(),
        })
    }

    fn pointer(&mut self, phase: PointerPhase) -> Result<HostCommand, ParseError> {
        let id: PointerId = self.parse("pointer id")?;
        let (x, y) = match phase {
            PointerPhase::Down | PointerPhase::Move => (self.parse("x")?, self.parse("y")?),
            PointerPhase::Up | PointerPhase::Cancel => (0.0, 0.0),
        };
        Ok(HostCommand::Pointer(PointerEvent::new(id, phase, x, y)))
    }
}

impl FromStr for HostCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        // `key " "` is the only way to type a space
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(value) = line.strip_prefix("key ") {
            let value = value.trim_start();
            let value = match value {
                "\" \"" | "space" => " ",
                v => v.trim_end(),
            };
            if value.is_empty() {
                return Err(ParseError::MissingArgument {
                    verb: "key",
                    argument: "value",
                });
            }
            return Ok(HostCommand::Key(value.to_string()));
        }

        if let Some(text) = line.strip_prefix("text ") {
            return Ok(HostCommand::Text(unescape(text)));
        }

        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseError::Empty);
        };
        let verb: &'static str = match verb.to_ascii_lowercase().as_str() {
            "down" => "down",
            "move" => "move",
            "up" => "up",
            "cancel" => "cancel",
            "key" => "key",
            "text" => "text",
            "click" => "click",
            "calibrate" => "calibrate",
            "save" => "save",
            "reset" => "reset",
            "profile" => "profile",
            "profiles" => "profiles",
            "enable" => "enable",
            "disable" => "disable",
            "status" => "status",
            "feed" => "feed",
            _ => return Err(ParseError::UnknownVerb(verb.to_string())),
        };
        let mut args = Args { verb, rest: words };

        let command = match verb {
            "down" => args.pointer(PointerPhase::Down)?,
            "move" => args.pointer(PointerPhase::Move)?,
            "up" => args.pointer(PointerPhase::Up)?,
            "cancel" => args.pointer(PointerPhase::Cancel)?,
            "key" => HostCommand::Key(args.next("value")?.to_string()),
            "text" => {
                return Err(ParseError::MissingArgument {
                    verb: "text",
                    argument: "chars",
                })
            }
            "click" => HostCommand::Click(args.parse("button index")?),
            "calibrate" => HostCommand::Calibrate(args.parse("control id")?),
            "save" => HostCommand::Save,
            "reset" => HostCommand::Reset,
            "profile" => HostCommand::Profile(args.next("profile id")?.to_string()),
            "profiles" => HostCommand::Profiles,
            "enable" => HostCommand::Enable,
            "disable" => HostCommand::Disable,
            "status" => HostCommand::Status,
            _ => HostCommand::Feed,
        };
        Ok(command)
    }
}

/// Runs one command against the driver. Returns text for the console, if
/// the command produces any.
pub async fn dispatch(
    handle: &EngineHandle,
    command: HostCommand,
) -> Result<Option<String>, EngineError> {
    let reply = match command {
        HostCommand::Pointer(event) => {
            handle.pointer(event).await?;
            None
        }
        HostCommand::Key(value) => {
            let consumed = handle.physical_input(PhysicalInput::Key(value)).await?;
            consumed.then(|| "captured".to_string())
        }
        HostCommand::Text(text) => {
            let sent = handle.text_input(&text).await?;
            (sent == 0).then(|| "text ignored".to_string())
        }
        HostCommand::Click(index) => {
            let consumed = handle
                .physical_input(PhysicalInput::MouseButton(index))
                .await?;
            consumed.then(|| "captured".to_string())
        }
        HostCommand::Calibrate(target) => {
            handle.send(EngineCommand::StartCalibration(target)).await?;
            Some(format!("calibrating {}, press a key", target))
        }
        HostCommand::Save => Some(describe_save(handle.save_calibration().await?)),
        HostCommand::Reset => Some(describe_save(handle.reset_calibration().await?)),
        HostCommand::Profile(id) => {
            handle.switch_profile(&id).await?;
            Some(format!("profile {}", id))
        }
        HostCommand::Profiles => {
            let lines: Vec<String> = templates::catalogue()
                .into_iter()
                .map(|(id, name)| format!("{:<12} {}", id, name))
                .collect();
            Some(lines.join("\n"))
        }
        HostCommand::Enable => {
            handle.send(EngineCommand::Enable).await?;
            None
        }
        HostCommand::Disable => {
            handle.send(EngineCommand::Disable).await?;
            None
        }
        HostCommand::Status => Some(render_status(&handle.snapshot().await?)),
        HostCommand::Feed => Some(handle.feed().await?.join("\n")),
    };
    Ok(reply)
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('b') => out.push('\u{8}'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn describe_save(outcome: SaveOutcome) -> String {
    match outcome {
        SaveOutcome::Saved => "saved".to_string(),
        SaveOutcome::MemoryOnly => "storage unavailable, kept in memory".to_string(),
    }
}

/// Multi-line text view of a snapshot.
pub fn render_status(snapshot: &InputSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} | profile {} ({})",
        if snapshot.enabled { "enabled" } else { "disabled" },
        snapshot.profile_id,
        snapshot.profile_name
    );
    let _ = writeln!(out, "pointers: {}", snapshot.pointers);
    let _ = writeln!(out, "keys down: {:?}", snapshot.pressed_keys);
    let _ = writeln!(out, "mouse down: {:?}", snapshot.mouse_buttons);
    let _ = writeln!(out, "buttons: {:?}", snapshot.pressed_buttons);
    let _ = writeln!(out, "left  {}", render_stick(&snapshot.left_stick));
    let _ = writeln!(out, "right {}", render_stick(&snapshot.right_stick));
    if let Some(target) = snapshot.calibrating {
        let _ = writeln!(out, "calibrating {}", target);
    }
    for (control, action) in snapshot.mapping.iter() {
        let _ = writeln!(out, "  {:<22} {:?}", control.as_str(), action);
    }
    out.trim_end().to_string()
}

fn render_stick(stick: &StickSnapshot) -> String {
    format!(
        "{:?} ({:+.2}, {:+.2}) {:?}{}",
        stick.mode,
        stick.position.x,
        stick.position.y,
        stick.active,
        if stick.thumb_click { " click" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pointer_lines() {
        assert_eq!(
            "down 3 100 620.5".parse::<HostCommand>().unwrap(),
            HostCommand::Pointer(PointerEvent::new(
                PointerId::Touch(3),
                PointerPhase::Down,
                100.0,
                620.5
            ))
        );
        assert_eq!(
            "up mouse".parse::<HostCommand>().unwrap(),
            HostCommand::Pointer(PointerEvent::new(PointerId::Mouse, PointerPhase::Up, 0.0, 0.0))
        );
    }

    #[test]
    fn parses_keys_including_space() {
        assert_eq!(
            "key k".parse::<HostCommand>().unwrap(),
            HostCommand::Key("k".into())
        );
        assert_eq!(
            "key space".parse::<HostCommand>().unwrap(),
            HostCommand::Key(" ".into())
        );
        assert_eq!(
            "key \" \"".parse::<HostCommand>().unwrap(),
            HostCommand::Key(" ".into())
        );
    }

    #[test]
    fn parses_text_with_escapes() {
        assert_eq!(
            "text hello world".parse::<HostCommand>().unwrap(),
            HostCommand::Text("hello world".into())
        );
        assert_eq!(
            "text a\\nb\\b\\\\".parse::<HostCommand>().unwrap(),
            HostCommand::Text("a\nb\u{8}\\".into())
        );
        assert!(matches!(
            "text".parse::<HostCommand>(),
            Err(ParseError::MissingArgument { verb: "text", .. })
        ));
    }

    #[test]
    fn parses_control_ids() {
        assert_eq!(
            "calibrate BUTTON_A".parse::<HostCommand>().unwrap(),
            HostCommand::Calibrate(ControlId::ButtonA)
        );
        assert!(matches!(
            "calibrate BUTTON_Z".parse::<HostCommand>(),
            Err(ParseError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn reports_bad_lines() {
        assert_eq!("".parse::<HostCommand>(), Err(ParseError::Empty));
        assert_eq!(
            "jump".parse::<HostCommand>(),
            Err(ParseError::UnknownVerb("jump".into()))
        );
        assert_eq!(
            "down 1 5".parse::<HostCommand>(),
            Err(ParseError::MissingArgument {
                verb: "down",
                argument: "y"
            })
        );
        assert!(matches!(
            "down finger 1 2".parse::<HostCommand>(),
            Err(ParseError::InvalidArgument { .. })
        ));
    }
}
