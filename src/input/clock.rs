use std::time::Instant;

/// Monotonic millisecond clock.
///
/// Truncated to `u32`, so readings wrap after ~49.7 days; consumers compare
/// with [`crate::input::debounce::elapsed_ms`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
