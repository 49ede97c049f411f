//! Input normalization core
//!
//! ```text
//!   RawInputSource ──► KeyMatrixDecoder ──► DebounceGate ──► PowerSave ──► EventPublisher
//!   (dedicated first)   (matrix events)      (200ms floor)    (wake gate)    (nav mailbox,
//!                                                                              keystroke, touch)
//! ```
//!
//! One [`InputCore::poll_input`] call per main-loop iteration drives the whole
//! pipeline. The only concurrent producer is the button sampler, which talks
//! to the cycle through a lock-free latch.

pub mod board;
pub mod clock;
pub mod debounce;
pub mod event;
pub mod processor;
pub mod publisher;

pub use board::{Board, BoardState, Probing, Ready};
pub use clock::MonotonicClock;
pub use debounce::{elapsed_ms, DebounceGate, IntervalFloor};
pub use event::{
    KeyChar, KeyKind, KeyStroke, LogicalKeyEvent, Modifiers, NavSet, RawEvent, RawInput,
    Rotation, SourceKind, StrokeFlags, TouchPoint,
};
pub use processor::{InputCore, InputFrame};
pub use publisher::{EventPublisher, TouchSink};
