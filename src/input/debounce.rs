//! Interval gates for the poll cycle
//!
//! All comparisons use the wrapping difference `now - last`, so a `u32`
//! millisecond clock stays correct across wraparound.

/// Milliseconds elapsed between `since` and `now` on a wrapping clock
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Minimum interval between processed poll cycles
#[derive(Debug, Clone)]
pub struct DebounceGate {
    /// Minimal spacing between accepted presses (in milliseconds)
    min_interval_ms: u32,

    /// Time of the last accepted press
    last_accepted: Option<u32>,
}

impl DebounceGate {
    pub fn new(min_interval_ms: u32) -> Self {
        Self {
            min_interval_ms,
            last_accepted: None,
        }
    }

    /// Whether presses may be processed at `now`.
    ///
    /// A latched long press bypasses the interval so repeats fire every cycle.
    pub fn is_open(&self, now: u32, long_press: bool) -> bool {
        if long_press {
            return true;
        }
        match self.last_accepted {
            None => true,
            Some(last) => elapsed_ms(now, last) >= self.min_interval_ms,
        }
    }

    /// Records that a cycle processed a press at `now`
    pub fn accept(&mut self, now: u32) {
        self.last_accepted = Some(now);
    }
}

/// Fixed cadence floor, checked before any bus transaction is issued
#[derive(Debug, Clone)]
pub struct IntervalFloor {
    interval_ms: u32,
    last: Option<u32>,
}

impl IntervalFloor {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last: None,
        }
    }

    fn elapsed(&self, now: u32) -> bool {
        self.last
            .map_or(true, |last| elapsed_ms(now, last) >= self.interval_ms)
    }

    /// Claims the slot at `now` if the interval has passed
    pub fn try_claim(&mut self, now: u32) -> bool {
        if self.elapsed(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    /// Quiet-period check: stamps `now` unconditionally and reports whether the
    /// previous stamp was at least one interval ago.
    pub fn touch(&mut self, now: u32) -> bool {
        let quiet = self.elapsed(now);
        self.last = Some(now);
        quiet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_opens_after_interval() {
        let mut gate = DebounceGate::new(200);
        assert!(gate.is_open(1_000, false));
        gate.accept(1_000);
        assert!(!gate.is_open(1_150, false));
        assert!(!gate.is_open(1_199, false));
        assert!(gate.is_open(1_200, false));
    }

    #[test]
    fn long_press_bypasses_interval() {
        let mut gate = DebounceGate::new(200);
        gate.accept(500);
        assert!(!gate.is_open(510, false));
        assert!(gate.is_open(510, true));
    }

    #[test]
    fn gate_survives_clock_wraparound() {
        let mut gate = DebounceGate::new(200);
        gate.accept(u32::MAX - 50);
        assert!(!gate.is_open(100, false));
        assert!(gate.is_open(160, false));
    }

    #[test]
    fn floor_claims_at_fixed_cadence() {
        let mut floor = IntervalFloor::new(100);
        assert!(floor.try_claim(0));
        assert!(!floor.try_claim(60));
        assert!(floor.try_claim(100));
        assert!(!floor.try_claim(150));
    }

    #[test]
    fn touch_requires_a_quiet_period() {
        let mut limiter = IntervalFloor::new(200);
        assert!(limiter.touch(1_000));
        // held: every report restarts the quiet period
        assert!(!limiter.touch(1_150));
        assert!(!limiter.touch(1_300));
        assert!(limiter.touch(1_600));
    }
}
