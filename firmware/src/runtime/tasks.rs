//! Foreground tasks run by the tick scheduler.

use crate::app::{self, RecoveryAction};

use super::{ERRORS, Node, NodeEngine, SLAVE};

/// Answers at most one received frame per pass.
pub fn process_i2c(_node: &mut Node) {
    let _ = SLAVE.with(app::service_one);
}

pub fn housekeeping(node: &mut Node) {
    node.watchdog.pet();
}

/// Applies the recovery policy to every error queued by the engine.
pub fn recover_errors(node: &mut Node) {
    while let Ok(context) = ERRORS.try_receive() {
        let action = app::recovery_for(context.kind);
        defmt::warn!(
            "i2c: {} (flags {=u8:#x}, dropped {=bool}) at {=u32} ms -> {}",
            context.kind,
            context.hw_status_flags,
            context.message_dropped,
            context.timestamp_ms,
            action
        );

        if action == RecoveryAction::RecoverBusThenReset && node.master.recover_bus().is_err() {
            defmt::error!("i2c: SDA still held low after recovery pulses");
        }
        let _ = SLAVE.with(NodeEngine::reset);
    }
}
