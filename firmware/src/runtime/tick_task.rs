use embassy_time::{Duration, Ticker};
use node_core::scheduler::{TICK_RATE_HZ, TickClock};
use node_core::sync::Shared;

use super::NodeEngine;

/// 1 kHz system tick: advances the clock, then the slave frame timeout.
#[embassy_executor::task]
pub async fn run(clock: &'static TickClock, slave: &'static Shared<NodeEngine>) -> ! {
    let mut ticker = Ticker::every(Duration::from_hz(u64::from(TICK_RATE_HZ)));

    loop {
        ticker.next().await;
        clock.on_tick();
        let _ = slave.with(NodeEngine::on_tick_1ms);
    }
}
