//! Built-in game profiles

use super::{ControlId, Mapping, Profile};

macro_rules! mapping {
    ($($control:ident => $action:expr),* $(,)?) => {{
        let mut m = Mapping::new();
        $( m.set(ControlId::$control, $action); )*
        m
    }};
}

/// Profile used when nothing else is configured.
pub const DEFAULT_PROFILE: &str = "quake3";

/// Ids of all built-in templates, in display order.
pub const TEMPLATE_IDS: [&str; 4] = ["quake3", "fps", "platformer", "custom"];

/// Returns a fresh copy of the template `id`, if it exists.
pub fn template(id: &str) -> Option<Profile> {
    let (name, mappings) = match id {
        "quake3" => (
            "Quake III Arena",
            mapping! {
                JoystickLeftUp => "w",
                JoystickLeftDown => "s",
                JoystickLeftLeft => "a",
                JoystickLeftRight => "d",
                JoystickRightUp => "MOUSE_UP",
                JoystickRightDown => "MOUSE_DOWN",
                JoystickRightLeft => "MOUSE_LOOK_LEFT",
                JoystickRightRight => "MOUSE_LOOK_RIGHT",
                ButtonA => " ",           // jump
                ButtonB => "ctrl",        // crouch
                ButtonX => "r",
                ButtonY => "e",
                ButtonLb => "q",
                ButtonRb => "e",
                ButtonLt => "MOUSE_RIGHT", // alt-fire
                ButtonRt => "MOUSE_LEFT",  // fire
                ButtonL3 => "shift",
                ButtonR3 => "f",
                ButtonStart => "esc",
                ButtonSelect => "tab",
                ButtonDpadUp => "1",
                ButtonDpadDown => "2",
                ButtonDpadLeft => "3",
                ButtonDpadRight => "4",
            },
        ),
        "fps" => (
            "Generic FPS",
            mapping! {
                JoystickLeftUp => "w",
                JoystickLeftDown => "s",
                JoystickLeftLeft => "a",
                JoystickLeftRight => "d",
                ButtonA => " ",
                ButtonB => "ctrl",
                ButtonX => "r",
                ButtonY => "e",
                ButtonRt => "MOUSE_LEFT",
                ButtonLt => "MOUSE_RIGHT",
            },
        ),
        "platformer" => (
            "Platformer",
            mapping! {
                JoystickLeftLeft => "ArrowLeft",
                JoystickLeftRight => "ArrowRight",
                ButtonA => " ",
                ButtonB => "Shift",
            },
        ),
        "custom" => ("Custom Mapping", Mapping::new()),
        _ => return None,
    };

    Some(Profile {
        id: id.to_string(),
        name: name.to_string(),
        mappings,
    })
}

/// `(id, display name)` of every template.
pub fn catalogue() -> Vec<(String, String)> {
    TEMPLATE_IDS
        .iter()
        .filter_map(|id| template(id))
        .map(|p| (p.id, p.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_template_exists() {
        for id in TEMPLATE_IDS {
            assert!(template(id).is_some(), "missing template {id}");
        }
        assert!(template("doom").is_none());
    }

    #[test]
    fn quake3_binds_thumb_clicks() {
        let p = template(DEFAULT_PROFILE).unwrap();
        assert_eq!(p.mappings.get(ControlId::ButtonL3), Some("shift"));
        assert_eq!(p.mappings.get(ControlId::ButtonR3), Some("f"));
    }

    #[test]
    fn custom_starts_empty() {
        assert!(template("custom").unwrap().mappings.is_empty());
    }
}
