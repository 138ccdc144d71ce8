//! Touch-to-input translation: on-screen joysticks and buttons driven by
//! pointer events, emitted as synthetic keyboard and mouse input.

pub mod calibration;
pub mod config;
pub mod controls;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod host;
pub mod input;
pub mod persistence;
pub mod profile;
pub mod synth;

pub use config::{Settings, SettingsOverlay};
pub use engine::{Engine, EngineCommand, EngineHandle, InputSnapshot};
pub use error::EngineError;
pub use input::{PhysicalInput, PointerEvent, PointerId, PointerPhase};
pub use persistence::{FileStore, KeyValueStore, MemoryStore};
pub use profile::ControlId;
pub use synth::{InputSink, KeyState, MouseButton, SyntheticEvent};
