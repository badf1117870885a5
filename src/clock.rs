//! Free-running monotonic millisecond clock.
//!
//! Driven by a hardware timer configured for 1 ms compare-match; the ISR
//! calls [`Clock::tick`] and returns. Mainline code reads the counter
//! through [`Clock::now`]. Ground truth: `libTimer.c`'s single `volatile`
//! millisecond counter plus `Timer_TimeDifference`'s wrapping subtraction.

use core::sync::atomic::{AtomicU32, Ordering};

/// Monotonic millisecond counter, safe to share between an ISR and
/// mainline through an `&'static` reference (RTIC resources give the
/// concrete binaries the locking needed around this on Cortex-M; the
/// atomic here gives host tests and single-core reasoning a correct
/// answer without needing a critical section type).
pub struct Clock {
    ms: AtomicU32,
}

impl Clock {
    pub const fn new() -> Self {
        Self {
            ms: AtomicU32::new(0),
        }
    }

    /// Called from the timer ISR once per millisecond.
    pub fn tick(&self) {
        self.ms.fetch_add(1, Ordering::Relaxed);
    }

    /// Current millisecond count.
    pub fn now(&self) -> u32 {
        self.ms.load(Ordering::Relaxed)
    }

    /// Elapsed milliseconds since `earlier`, correct across wraparound for
    /// spans up to 2^31 ms (~24.8 days) via unsigned wrapping subtraction.
    pub fn time_difference(&self, earlier: u32) -> u32 {
        self.now().wrapping_sub(earlier)
    }

    /// Reset to an explicit value, used after MCU sleep when the RTC
    /// alarm woke the device rather than the millisecond timer.
    pub fn set(&self, ms: u32) {
        self.ms.store(ms, Ordering::Relaxed);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Free function form of the wraparound-correct elapsed-time calculation,
/// usable without a [`Clock`] instance (e.g. in tests comparing two
/// captured timestamps).
pub fn time_difference(now: u32, earlier: u32) -> u32 {
    now.wrapping_sub(earlier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_accumulate() {
        let clock = Clock::new();
        for _ in 0..1000 {
            clock.tick();
        }
        assert_eq!(clock.now(), 1000);
    }

    #[test]
    fn time_difference_handles_wraparound() {
        let earlier = u32::MAX - 5;
        let now = 4u32;
        assert_eq!(time_difference(now, earlier), 10);
    }

    #[test]
    fn time_difference_ordinary_case() {
        assert_eq!(time_difference(1_500, 1_000), 500);
    }

    #[test]
    fn set_overrides_counter() {
        let clock = Clock::new();
        clock.set(42);
        assert_eq!(clock.now(), 42);
    }
}
