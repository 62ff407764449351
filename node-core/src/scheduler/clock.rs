//! Process-wide tick counter shared between the tick interrupt and the
//! foreground loop.
//!
//! The counter is a single 32-bit atomic. Cortex-M0+ parts have no atomic
//! read-modify-write instructions, so `portable-atomic` falls back to a
//! critical section for `fetch_add` there; loads and stores stay plain
//! word accesses.

use portable_atomic::{AtomicU16, AtomicU32, Ordering};

/// Tick rate the firmware programs into the clock (1 tick == 1 ms).
pub const TICK_RATE_HZ: u16 = 1_000;

/// Source of the millisecond uptime stamped onto messages and errors.
pub trait UptimeSource {
    /// Returns the current uptime in milliseconds.
    fn uptime_ms(&self) -> u32;
}

impl<T> UptimeSource for &T
where
    T: UptimeSource + ?Sized,
{
    fn uptime_ms(&self) -> u32 {
        (**self).uptime_ms()
    }
}

/// Wrapping tick counter advanced once per hardware tick.
#[derive(Debug)]
pub struct TickClock {
    ticks: AtomicU32,
    rate_hz: AtomicU16,
}

impl TickClock {
    /// Creates a stopped clock with no configured rate.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(0, 0)
    }

    /// Creates a clock seeded with an arbitrary tick value.
    ///
    /// Mostly useful to exercise wraparound without waiting 49 days.
    #[must_use]
    pub const fn starting_at(rate_hz: u16, ticks: u32) -> Self {
        Self {
            ticks: AtomicU32::new(ticks),
            rate_hz: AtomicU16::new(rate_hz),
        }
    }

    /// Resets the counter to zero and records the tick rate.
    pub fn init(&self, rate_hz: u16) {
        self.rate_hz.store(rate_hz, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Release);
    }

    /// Advances the counter by one tick. Interrupt context only.
    pub fn on_tick(&self) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns a snapshot of the tick counter.
    #[must_use]
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Returns the configured tick rate (0 when never initialised).
    #[must_use]
    pub fn rate_hz(&self) -> u16 {
        self.rate_hz.load(Ordering::Relaxed)
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeSource for TickClock {
    fn uptime_ms(&self) -> u32 {
        let rate = self.rate_hz();
        if rate == 0 {
            return 0;
        }

        let scaled = u64::from(self.now()) * 1_000;
        // Millisecond uptime wraps along with the tick counter.
        #[allow(clippy::cast_possible_truncation)]
        let uptime = (scaled / u64::from(rate)) as u32;
        uptime
    }
}
