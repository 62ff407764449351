use node_core::scheduler::{ScheduledTask, Scheduler, TICK_RATE_HZ, TickClock, UptimeSource, is_due};

#[derive(Default)]
struct Runs {
    every_tick: u32,
    every_ten: u32,
    every_hundred: u32,
}

fn every_tick(runs: &mut Runs) {
    runs.every_tick += 1;
}

fn every_ten(runs: &mut Runs) {
    runs.every_ten += 1;
}

fn every_hundred(runs: &mut Runs) {
    runs.every_hundred += 1;
}

fn tick(clock: &TickClock, count: u32) {
    for _ in 0..count {
        clock.on_tick();
    }
}

#[test]
fn periodic_task_survives_counter_wraparound() {
    let clock = TickClock::starting_at(TICK_RATE_HZ, u32::MAX - 5);
    let mut tasks = [ScheduledTask::new(every_ten, 10)];
    let mut scheduler = Scheduler::new(&clock);
    scheduler.register_tasks(&mut tasks);

    assert_eq!(scheduler.tasks()[0].next_deadline(), 4, "deadline wraps past zero");

    let mut runs = Runs::default();
    for _ in 0..9 {
        clock.on_tick();
        scheduler.run_once(&mut runs);
    }
    assert_eq!(runs.every_ten, 0, "wrapped deadline must not look overdue");

    clock.on_tick();
    scheduler.run_once(&mut runs);
    assert_eq!(clock.now(), 4);
    assert_eq!(runs.every_ten, 1);
    assert_eq!(scheduler.tasks()[0].next_deadline(), 14);
}

#[test]
fn missed_periods_coalesce_into_one_run() {
    let clock = TickClock::starting_at(TICK_RATE_HZ, 0);
    let mut tasks = [ScheduledTask::new(every_ten, 10)];
    let mut scheduler = Scheduler::new(&clock);
    scheduler.register_tasks(&mut tasks);

    tick(&clock, 35);
    let mut runs = Runs::default();
    scheduler.run_once(&mut runs);
    scheduler.run_once(&mut runs);

    assert_eq!(runs.every_ten, 1, "a late scheduler must not replay missed periods");
    assert_eq!(
        scheduler.tasks()[0].next_deadline(),
        40,
        "catch-up keeps the original phase"
    );
}

#[test]
fn mixed_periods_over_one_second() {
    let clock = TickClock::new();
    let mut tasks = [
        ScheduledTask::new(every_tick, 1),
        ScheduledTask::new(every_ten, 10),
        ScheduledTask::new(every_hundred, 100),
    ];
    let mut scheduler = Scheduler::new(&clock);
    scheduler.init(TICK_RATE_HZ);
    scheduler.register_tasks(&mut tasks);

    let mut runs = Runs::default();
    for _ in 0..1_000 {
        scheduler.on_tick();
        scheduler.run_once(&mut runs);
        scheduler.run_once(&mut runs);
    }

    assert_eq!(runs.every_tick, 1_000);
    assert_eq!(runs.every_ten, 100);
    assert_eq!(runs.every_hundred, 10);
    assert_eq!(scheduler.uptime_ms(), 1_000);
}

#[test]
fn uptime_truncates_and_tolerates_missing_rate() {
    let unconfigured = TickClock::starting_at(0, 1_000);
    assert_eq!(unconfigured.uptime_ms(), 0);

    let slow = TickClock::starting_at(3, 10);
    assert_eq!(slow.uptime_ms(), 3_333);

    let clock = TickClock::starting_at(TICK_RATE_HZ, u32::MAX);
    assert_eq!(clock.uptime_ms(), u32::MAX);
    clock.on_tick();
    assert_eq!(clock.now(), 0);
    assert_eq!(clock.uptime_ms(), 0);
}

#[test]
fn due_rule_is_symmetric_around_the_wrap() {
    assert!(is_due(2, u32::MAX - 1));
    assert!(!is_due(u32::MAX - 1, 2));
    assert!(is_due(0, 0));
}
