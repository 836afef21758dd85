//! Rolling one-hour airtime accountant
//!
//! Transmitted airtime is tracked in 60 one-minute buckets. The newest bucket
//! sits at the front of the ring, the oldest at the back. The window advances
//! lazily whenever a timestamp is passed in, and all timestamp arithmetic is
//! wrapping so the ~49 day rollover of a `u32` millisecond clock is harmless.

use crate::airtime::ring::FixedRing;
use crate::config::airtime::{BUCKETS, HOUR_MS, MINUTE_MS};

/// Largest value a single one-minute bucket can hold
const MAX_BUCKET_MS: u32 = MINUTE_MS;

/// Tracks airtime over the last hour and compares it with a limit.
pub struct AirTimeAccountant {
    buckets: FixedRing<u16, BUCKETS>,
    /// Sum of all buckets
    total_ms: u32,
    last_update: u32,
    limit_ppm: u16,
}

impl AirTimeAccountant {
    /// Create an accountant whose window starts at `now`.
    pub fn new(limit_ppm: u16, now: u32) -> Self {
        let mut buckets = FixedRing::new();
        buckets.fill(0);

        Self {
            buckets,
            total_ms: 0,
            last_update: now,
            limit_ppm,
        }
    }

    pub fn limit_ppm(&self) -> u16 {
        self.limit_ppm
    }

    /// Roll the window forward to `now`.
    pub fn update(&mut self, now: u32) {
        let mut elapsed = now.wrapping_sub(self.last_update);

        if elapsed >= HOUR_MS {
            // Every bucket would roll out; reset in one step.
            self.total_ms = 0;
            self.buckets.clear();
            self.buckets.fill(0);
            self.last_update = self
                .last_update
                .wrapping_add((elapsed / HOUR_MS) * HOUR_MS);
            elapsed = now.wrapping_sub(self.last_update);
        }

        while elapsed >= MINUTE_MS {
            if let Some(oldest) = self.buckets.pop_back() {
                self.total_ms -= oldest as u32;
            }
            self.buckets.push_front(0);
            self.last_update = self.last_update.wrapping_add(MINUTE_MS);
            elapsed -= MINUTE_MS;
        }
    }

    /// Add airtime to the newest bucket.
    ///
    /// A bucket can never hold more than one minute of airtime; exceeding
    /// that is a caller bug.
    pub fn add_to_current_minute(&mut self, ms: u32) {
        if let Some(current) = self.buckets.front_mut() {
            let previous = *current as u32;
            let updated = previous + ms;
            debug_assert!(updated <= MAX_BUCKET_MS, "bucket overflow: {} ms", updated);
            let updated = updated.min(MAX_BUCKET_MS);
            *current = updated as u16;
            self.total_ms += updated - previous;
        }
    }

    /// Attribute the interval `[start, end)` to the minute buckets it covers.
    pub fn record(&mut self, start: u32, end: u32) {
        let mut t1 = start;

        // Only the final hour of a longer interval can remain in the window
        if end.wrapping_sub(t1) > HOUR_MS {
            t1 = end.wrapping_sub(HOUR_MS);
        }

        while t1 != end {
            self.update(t1);

            let to_boundary = self.last_update.wrapping_add(MINUTE_MS).wrapping_sub(t1);
            let to_end = end.wrapping_sub(t1);
            let step = to_boundary.min(to_end);

            self.add_to_current_minute(step);
            t1 = t1.wrapping_add(step);
        }
    }

    /// Airtime used over the last hour, in milliseconds.
    pub fn time_ms(&mut self, now: u32) -> u32 {
        self.update(now);
        self.total_ms
    }

    /// Airtime used over the last hour, in parts per million of an hour.
    ///
    /// Truncating, so the limit trips exactly when the budget is consumed.
    /// Saturates at `u16::MAX`.
    pub fn time_ppm(&mut self, now: u32) -> u16 {
        let ms = self.time_ms(now) as u64;
        let ppm = ms * 10 / 36;
        ppm.min(u16::MAX as u64) as u16
    }

    pub fn is_limit_reached(&mut self, now: u32) -> bool {
        self.time_ppm(now) >= self.limit_ppm
    }

    /// Sum of the buckets, bypassing the cached total.
    #[cfg(test)]
    fn bucket_sum(&self) -> u32 {
        self.buckets.iter().map(|&b| b as u32).sum()
    }
}
