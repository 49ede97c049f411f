//! Power-save coordination
//!
//! The poll cycle only talks to [`PowerSave::request_wake`]. [`PowerSaveTimer`]
//! is an idle-timeout coordinator driving a backlight; boards with their own
//! power management implement the trait directly.

use tracing::{info, warn};

use crate::input::debounce::elapsed_ms;
use crate::peripherals::{set_brightness, Backlight};

pub trait PowerSave {
    /// Signals activity. Returns `true` when the device was already awake,
    /// `false` when it was asleep and has now been woken.
    fn request_wake(&mut self) -> bool;
}

impl<T: PowerSave + ?Sized> PowerSave for Box<T> {
    fn request_wake(&mut self) -> bool {
        (**self).request_wake()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Awake,
    Asleep,
}

pub struct PowerSaveTimer<B> {
    backlight: B,
    idle_timeout_ms: u32,
    brightness: u8,
    state: PowerState,
    last_activity: u32,
    activity_pending: bool,
}

impl<B: Backlight> PowerSaveTimer<B> {
    pub fn new(backlight: B, idle_timeout_ms: u32, brightness: u8, now: u32) -> Self {
        let mut timer = Self {
            backlight,
            idle_timeout_ms,
            brightness,
            state: PowerState::Awake,
            last_activity: now,
            activity_pending: false,
        };
        timer.restore_brightness();
        timer
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn backlight(&self) -> &B {
        &self.backlight
    }

    /// Advances the idle timer; sleeps once the timeout passes without activity
    pub fn tick(&mut self, now: u32) {
        if std::mem::take(&mut self.activity_pending) {
            self.last_activity = now;
            return;
        }
        if self.state == PowerState::Awake
            && elapsed_ms(now, self.last_activity) >= self.idle_timeout_ms
        {
            info!(
                "No input for {}ms, entering power save",
                elapsed_ms(now, self.last_activity)
            );
            self.sleep();
        }
    }

    pub fn sleep(&mut self) {
        self.state = PowerState::Asleep;
        if let Err(e) = self.backlight.set_duty(0) {
            warn!("Failed to dim backlight: {}", e);
        }
    }

    pub fn set_brightness(&mut self, percent: u8) {
        self.brightness = percent;
        if self.state == PowerState::Awake {
            self.restore_brightness();
        }
    }

    fn restore_brightness(&mut self) {
        if let Err(e) = set_brightness(&mut self.backlight, self.brightness) {
            warn!("Failed to restore backlight: {}", e);
        }
    }
}

impl<B: Backlight> PowerSave for PowerSaveTimer<B> {
    fn request_wake(&mut self) -> bool {
        self.activity_pending = true;
        match self.state {
            PowerState::Awake => true,
            PowerState::Asleep => {
                info!("Waking from power save");
                self.state = PowerState::Awake;
                self.restore_brightness();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;

    #[derive(Default)]
    struct Recorder(Vec<u8>);

    impl Backlight for Recorder {
        fn set_duty(&mut self, duty: u8) -> Result<(), InputError> {
            self.0.push(duty);
            Ok(())
        }
    }

    #[test]
    fn sleeps_after_idle_timeout() {
        let mut timer = PowerSaveTimer::new(Recorder::default(), 1_000, 100, 0);
        timer.tick(500);
        assert_eq!(timer.state(), PowerState::Awake);
        timer.tick(1_000);
        assert_eq!(timer.state(), PowerState::Asleep);
        assert_eq!(timer.backlight().0, vec![250, 0]);
    }

    #[test]
    fn first_wake_request_reports_asleep() {
        let mut timer = PowerSaveTimer::new(Recorder::default(), 1_000, 50, 0);
        timer.sleep();
        assert!(!timer.request_wake());
        assert!(timer.request_wake());
        assert_eq!(timer.state(), PowerState::Awake);
        assert_eq!(timer.backlight().0, vec![70, 0, 70]);
    }

    #[test]
    fn activity_restarts_the_idle_window() {
        let mut timer = PowerSaveTimer::new(Recorder::default(), 1_000, 100, 0);
        timer.tick(900);
        timer.request_wake();
        timer.tick(950);
        timer.tick(1_500);
        assert_eq!(timer.state(), PowerState::Awake);
        timer.tick(1_950);
        assert_eq!(timer.state(), PowerState::Asleep);
    }
}
