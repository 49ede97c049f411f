//! Input normalization for handheld boards
//!
//! Buttons, I2C keypad controllers, scanned keyboards and capacitive touch
//! panels are normalized into navigation signals, keystrokes and touch points,
//! gated by debounce and a wake-from-sleep rule.

pub mod config;
pub mod error;
pub mod input;
pub mod keymap;
pub mod peripherals;
pub mod power;
pub mod sources;

pub use config::{BoardKind, InputSettings};
pub use error::InputError;
pub use input::{Board, InputCore, InputFrame, NavSet};
pub use power::{PowerSave, PowerSaveTimer, PowerState};
pub use sources::{PollContext, RawInputSource};
