//! Error definitions for the input subsystem
//!
//! Nothing in the poll path returns these: sources log and yield zero events.
//! They surface only during board bring-up and configuration handling.

use thiserror::Error;

/// Error types for board input
#[derive(Debug, Error)]
pub enum InputError {
    /// A bus transaction failed
    #[error("Bus error: {0:?}")]
    Bus(embedded_hal::i2c::ErrorKind),

    /// A controller did not answer on the bus during discovery
    #[error("Controller absent: {0}")]
    ControllerAbsent(String),

    /// Rotation outside 0..=3
    #[error("Invalid rotation state: {0}")]
    InvalidRotation(u8),

    /// Discovery finished without any usable input source
    #[error("No input source could be initialized")]
    NoInputSource,

    /// Settings could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// A GPIO or PWM line failed
    #[error("Pin error: {0}")]
    Pin(String),

    /// A board sensor returned no usable reading
    #[error("Sensor error: {0}")]
    Sensor(String),
}

impl InputError {
    pub fn bus<E: embedded_hal::i2c::Error>(err: E) -> Self {
        InputError::Bus(err.kind())
    }

    pub fn pin<E: embedded_hal::digital::Error>(err: E) -> Self {
        InputError::Pin(format!("{:?}", err.kind()))
    }
}
