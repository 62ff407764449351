//! Application layer: answers register reads and decides how to recover
//! from slave bus errors.
//!
//! Everything here is target independent so it can be exercised on the host.

pub mod registers;

use node_core::scheduler::UptimeSource;
use node_core::slave::{ErrorSink, Message, SlaveEngine, SlaveError, SlavePeripheral};

/// Period of the message-processing task, in ticks.
pub const PROCESS_PERIOD_TICKS: u16 = 1;
/// Period of the housekeeping (watchdog) task, in ticks.
pub const HOUSEKEEPING_PERIOD_TICKS: u16 = 10;
/// Period of the error-recovery task, in ticks.
pub const RECOVERY_PERIOD_TICKS: u16 = 1;

/// What the foreground does after the engine reports an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum RecoveryAction {
    /// Re-arm the slave engine.
    ResetEngine,
    /// Clock a stuck slave free, then re-arm the slave engine.
    RecoverBusThenReset,
}

/// Maps an engine error to its recovery action.
#[must_use]
pub const fn recovery_for(kind: SlaveError) -> RecoveryAction {
    match kind {
        SlaveError::BusError | SlaveError::LineStuck => RecoveryAction::RecoverBusThenReset,
        SlaveError::Overrun
        | SlaveError::Timeout
        | SlaveError::Nack
        | SlaveError::ArbitrationLost
        | SlaveError::Frame => RecoveryAction::ResetEngine,
    }
}

/// Answers one received frame by staging the selected register's response.
///
/// The previous response is always cleared first, so an unknown selector or
/// an empty frame leaves nothing to read.
pub fn process_message<P, S, U>(engine: &mut SlaveEngine<P, S, U>, message: &Message)
where
    P: SlavePeripheral,
    S: ErrorSink,
    U: UptimeSource,
{
    engine.clear_response();

    let Some(entry) = message.selector().and_then(registers::find) else {
        return;
    };

    if let Some(handler) = entry.handler {
        handler(message);
    }

    if !entry.response.is_empty() {
        let _ = engine.set_response(entry.response);
    }
}

/// Pops at most one frame and answers it. Returns `true` if a frame was
/// handled.
pub fn service_one<P, S, U>(engine: &mut SlaveEngine<P, S, U>) -> bool
where
    P: SlavePeripheral,
    S: ErrorSink,
    U: UptimeSource,
{
    match engine.pop_message() {
        Some(message) => {
            process_message(engine, &message);
            true
        }
        None => false,
    }
}
