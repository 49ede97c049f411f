//! Key tables, sticky modifiers and the matrix decoder

pub mod decoder;
pub mod layout;
pub mod modifiers;

pub use decoder::{Decoded, KeyMatrixDecoder, Released, ResolvedKey};
pub use layout::{logical_code, KeyCell, KeyLayout, ScanEncoding, Sentinel, Variant};
pub use modifiers::{ModifierInput, ModifierPhase, ModifierState};
