use cortex_m::interrupt as cpu;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_futures::yield_now;
use embassy_stm32 as hal;
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::InterruptExt;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Delay;
use node_core::master::{BitBangMaster, MasterConfig};
use node_core::scheduler::{ScheduledTask, Scheduler, TICK_RATE_HZ, TickClock};
use node_core::slave::{ErrorContext, ErrorSink, SlaveEngine};
use node_core::sync::Shared;

use crate::app;
use crate::hw;
use crate::hw::lines::BoardLines;
use crate::hw::slave::{BUS_PRIORITY, I2cSlave};

mod tasks;
mod tick_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        cpu::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                cpu::enable();
            }
        }
    }
}

/// Depth of the slave error queue drained by the recovery task.
pub(crate) const ERROR_QUEUE_DEPTH: usize = 8;

pub(crate) type ErrorQueue = Channel<CriticalSectionRawMutex, ErrorContext, ERROR_QUEUE_DEPTH>;
pub(crate) type NodeEngine = SlaveEngine<I2cSlave, ErrorForwarder, &'static TickClock>;
pub(crate) type NodeMaster = BitBangMaster<BoardLines, Delay, &'static Shared<NodeEngine>>;

pub(crate) static CLOCK: TickClock = TickClock::new();
pub(crate) static SLAVE: Shared<NodeEngine> = Shared::new();
pub(crate) static ERRORS: ErrorQueue = Channel::new();

static TICK_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn USART3_4_5_6_LPUART1() {
    unsafe { TICK_EXECUTOR.on_interrupt() }
}

/// Error sink installed in the engine. Runs in interrupt context, so it only
/// queues the report for the foreground.
pub(crate) struct ErrorForwarder;

impl ErrorSink for ErrorForwarder {
    fn report(&mut self, context: ErrorContext) {
        if ERRORS.try_send(context).is_err() {
            defmt::warn!("i2c: error queue full, dropping {}", context.kind);
        }
    }
}

/// State shared by the scheduled foreground tasks.
pub(crate) struct Node {
    pub master: NodeMaster,
    pub watchdog: IndependentWatchdog<'static, hal::peripherals::IWDG>,
}

#[embassy_executor::main]
pub async fn main(_spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PB6,
        PB7,
        I2C1,
        IWDG,
        ..
    } = hal::init(config);

    defmt::info!(
        "i2c-node: address {=u8:#x}, tick {=u16} Hz",
        hw::OWN_ADDRESS,
        TICK_RATE_HZ
    );

    let mut scheduler = Scheduler::new(&CLOCK);
    scheduler.init(TICK_RATE_HZ);

    let mut engine = SlaveEngine::new(I2cSlave::new(I2C1), &CLOCK, ErrorForwarder)
        .with_status_bits(hw::STATUS_BITS);
    engine.init();
    let _ = SLAVE.install(engine);

    interrupt::USART3_4_5_6_LPUART1.set_priority(BUS_PRIORITY);
    let tick_spawner = TICK_EXECUTOR.start(interrupt::USART3_4_5_6_LPUART1);
    tick_spawner
        .spawn(tick_task::run(&CLOCK, &SLAVE))
        .expect("failed to spawn tick task");

    let mut watchdog = IndependentWatchdog::new(IWDG, hw::WATCHDOG_TIMEOUT_US);
    watchdog.unleash();

    let mut node = Node {
        master: BitBangMaster::new(
            BoardLines::new(PB6, PB7),
            Delay,
            &SLAVE,
            MasterConfig::default(),
        ),
        watchdog,
    };

    let mut table = [
        ScheduledTask::new(tasks::process_i2c, app::PROCESS_PERIOD_TICKS),
        ScheduledTask::new(tasks::housekeeping, app::HOUSEKEEPING_PERIOD_TICKS),
        ScheduledTask::new(tasks::recover_errors, app::RECOVERY_PERIOD_TICKS),
    ];
    scheduler.register_tasks(&mut table);

    loop {
        scheduler.run_once(&mut node);
        yield_now().await;
    }
}
