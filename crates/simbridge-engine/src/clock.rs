//! The simulated clock.
//!
//! The clock is the single source of truth for simulated time. It is
//! written only by the engine on the simulator thread and read lock-free
//! from any thread, which is what lets HTTP handlers answer "what time is
//! it" without going through the controller's command queues.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic simulated clock in seconds.
///
/// The value is stored as the bit pattern of an `f64` inside an
/// [`AtomicU64`] so reads never take a lock. Writes happen only on the
/// simulator thread and never move the clock backwards.
#[derive(Debug)]
pub struct SimClock {
    bits: AtomicU64,
}

impl SimClock {
    /// Create a clock at simulated time zero.
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Current simulated time in seconds. Safe from any thread.
    pub fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Advance the clock to `target` seconds.
    ///
    /// A target earlier than the current time is ignored; the clock is
    /// monotonic by construction.
    pub fn advance_to(&self, target: f64) {
        if target > self.now() {
            self.bits.store(target.to_bits(), Ordering::Release);
        }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let clock = SimClock::new();
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn advances_forward() {
        let clock = SimClock::new();
        clock.advance_to(10.5);
        assert_eq!(clock.now(), 10.5);
        clock.advance_to(12.0);
        assert_eq!(clock.now(), 12.0);
    }

    #[test]
    fn never_moves_backwards() {
        let clock = SimClock::new();
        clock.advance_to(100.0);
        clock.advance_to(50.0);
        assert_eq!(clock.now(), 100.0);
    }

    #[test]
    fn readable_from_other_threads() {
        use std::sync::Arc;

        let clock = Arc::new(SimClock::new());
        clock.advance_to(42.0);

        let reader = Arc::clone(&clock);
        let handle = std::thread::spawn(move || reader.now());
        assert_eq!(handle.join().unwrap(), 42.0);
    }
}
