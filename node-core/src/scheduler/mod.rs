//! Cooperative tick scheduler.
//!
//! A fixed table of tasks is scanned once per [`Scheduler::run_once`] call
//! from the foreground loop. Deadlines live in the 32-bit tick space and are
//! compared with wraparound-safe subtraction, so the counter rolling over
//! after ~49 days at 1 kHz never causes a misfire.

mod clock;

pub use clock::{TICK_RATE_HZ, TickClock, UptimeSource};

/// Half of the 32-bit tick space; deltas below this count as "in the past".
pub const DUE_WINDOW: u32 = 1 << 31;

/// Returns `true` when `deadline` has been reached at tick `now`.
///
/// The tick space is treated as a signed half-circle: a deadline is due for
/// the `2^31` ticks starting at the deadline itself, and pending for the
/// `2^31` ticks before it.
#[must_use]
pub const fn is_due(now: u32, deadline: u32) -> bool {
    now.wrapping_sub(deadline) < DUE_WINDOW
}

/// Task body. The scheduler hands every task the same application context.
pub type TaskFn<C> = fn(&mut C);

/// Entry in the scheduler's task table.
pub struct ScheduledTask<C> {
    action: TaskFn<C>,
    period_ticks: u16,
    next_deadline: u32,
}

impl<C> ScheduledTask<C> {
    /// Creates a task that fires every `period_ticks` ticks.
    ///
    /// A period of zero makes the task fire on every scheduler pass in which
    /// the tick counter has moved since it last ran.
    #[must_use]
    pub const fn new(action: TaskFn<C>, period_ticks: u16) -> Self {
        Self {
            action,
            period_ticks,
            next_deadline: 0,
        }
    }

    /// Returns the configured period in ticks.
    #[must_use]
    pub const fn period_ticks(&self) -> u16 {
        self.period_ticks
    }

    /// Returns the tick at which the task is next due.
    #[must_use]
    pub const fn next_deadline(&self) -> u32 {
        self.next_deadline
    }

    fn rebase(&mut self, now: u32) {
        self.next_deadline = now.wrapping_add(u32::from(self.period_ticks));
    }

    fn advance(&mut self, now: u32) {
        if self.period_ticks == 0 {
            self.next_deadline = now.wrapping_add(1);
            return;
        }

        // Missed periods collapse into a single firing; the phase is kept.
        let period = u32::from(self.period_ticks);
        loop {
            self.next_deadline = self.next_deadline.wrapping_add(period);
            if !is_due(now, self.next_deadline) {
                break;
            }
        }
    }
}

impl<C> Clone for ScheduledTask<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ScheduledTask<C> {}

impl<C> core::fmt::Debug for ScheduledTask<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("period_ticks", &self.period_ticks)
            .field("next_deadline", &self.next_deadline)
            .finish_non_exhaustive()
    }
}

/// Polling scheduler over a caller-owned task table.
pub struct Scheduler<'c, 't, C> {
    clock: &'c TickClock,
    tasks: &'t mut [ScheduledTask<C>],
}

impl<'c, 't, C> Scheduler<'c, 't, C> {
    /// Creates a scheduler with an empty task table.
    #[must_use]
    pub fn new(clock: &'c TickClock) -> Self {
        Self {
            clock,
            tasks: &mut [],
        }
    }

    /// Resets the tick counter, records the tick rate and drops every task.
    pub fn init(&mut self, tick_rate_hz: u16) {
        self.clock.init(tick_rate_hz);
        self.tasks = &mut [];
    }

    /// Replaces the task table and re-baselines every deadline to
    /// `now + period`. An empty table disables scheduling.
    pub fn register_tasks(&mut self, tasks: &'t mut [ScheduledTask<C>]) {
        let now = self.clock.now();
        for task in tasks.iter_mut() {
            task.rebase(now);
        }
        self.tasks = tasks;
    }

    /// Drops the task table; subsequent passes do nothing.
    pub fn clear_tasks(&mut self) {
        self.tasks = &mut [];
    }

    /// Forwards a hardware tick to the shared clock.
    pub fn on_tick(&self) {
        self.clock.on_tick();
    }

    /// Runs one pass over the task table in registration order.
    ///
    /// "Now" is sampled once, so a tick landing mid-pass is only seen by the
    /// next pass.
    pub fn run_once(&mut self, context: &mut C) {
        let now = self.clock.now();
        for task in self.tasks.iter_mut() {
            if is_due(now, task.next_deadline) {
                (task.action)(context);
                task.advance(now);
            }
        }
    }

    /// Returns the uptime derived from the shared clock.
    #[must_use]
    pub fn uptime_ms(&self) -> u32 {
        self.clock.uptime_ms()
    }

    /// Returns the registered tasks.
    #[must_use]
    pub fn tasks(&self) -> &[ScheduledTask<C>] {
        self.tasks
    }

    /// Returns the clock driving this scheduler.
    #[must_use]
    pub fn clock(&self) -> &'c TickClock {
        self.clock
    }
}
