//! Millisecond clock capability
//!
//! Timestamps are free-running `u32` milliseconds that wrap after ~49 days;
//! consumers use wrapping arithmetic on them.

/// Source of the current time in milliseconds
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<K: Clock + ?Sized> Clock for &K {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Clock backed by the embassy time driver
#[cfg(feature = "embedded")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embedded")]
impl Clock for EmbassyClock {
    fn now_ms(&self) -> u32 {
        // Truncation gives the wrapping millisecond counter
        embassy_time::Instant::now().as_millis() as u32
    }
}

#[cfg(test)]
pub mod mock {
    //! Manually driven clock for testing

    use super::Clock;
    use core::cell::Cell;

    /// Clock that only moves when told to.
    ///
    /// With a non-zero step every reading advances the clock, which makes
    /// the time measured around a transmit call equal to the step.
    pub struct MockClock {
        now: Cell<u32>,
        step: Cell<u32>,
    }

    impl MockClock {
        pub fn new(start: u32) -> Self {
            Self {
                now: Cell::new(start),
                step: Cell::new(0),
            }
        }

        pub fn advance(&self, ms: u32) {
            self.now.set(self.now.get().wrapping_add(ms));
        }

        /// Advance by `ms` after every reading.
        pub fn set_step(&self, ms: u32) {
            self.step.set(ms);
        }
    }

    impl Clock for MockClock {
        fn now_ms(&self) -> u32 {
            let now = self.now.get();
            self.now.set(now.wrapping_add(self.step.get()));
            now
        }
    }
}
