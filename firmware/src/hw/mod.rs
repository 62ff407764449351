//! Board support for the STM32G0B1 node: I2C1 on PB6 (SCL) / PB7 (SDA).
//!
//! The slave peripheral and the bit-bang master share the same two pins. The
//! register-level glue lives in [`slave`] and [`lines`]; the bit layouts below
//! are target independent so the status translation can be checked on the
//! host.

pub mod lines;
pub mod slave;

use node_core::slave::StatusBits;

/// 7-bit slave address answered by the node.
pub const OWN_ADDRESS: u8 = 0x42;

/// I2C1 TIMINGR for 100 kHz standard mode from the 16 MHz HSI kernel clock.
pub const I2C_TIMINGR: u32 = 0x0050_3D58;

/// Pin numbers on GPIOB.
pub const SCL_PIN: u32 = 6;
pub const SDA_PIN: u32 = 7;

/// Alternate function selecting I2C1 on PB6/PB7.
pub const I2C1_AF: u32 = 6;

/// Watchdog timeout; the housekeeping task pets it every 10 ms.
pub const WATCHDOG_TIMEOUT_US: u32 = 500_000;

pub(crate) mod isr {
    pub const TXE: u32 = 1 << 0;
    pub const TXIS: u32 = 1 << 1;
    pub const RXNE: u32 = 1 << 2;
    pub const ADDR: u32 = 1 << 3;
    pub const NACKF: u32 = 1 << 4;
    pub const STOPF: u32 = 1 << 5;
    pub const BERR: u32 = 1 << 8;
    pub const ARLO: u32 = 1 << 9;
    pub const OVR: u32 = 1 << 10;
    pub const PECERR: u32 = 1 << 11;
    pub const TIMEOUT: u32 = 1 << 12;
    pub const BUSY: u32 = 1 << 15;
    /// Set when the addressed transfer is a read (slave transmits).
    pub const DIR: u32 = 1 << 16;

    pub const ERRORS: u32 = BERR | ARLO | OVR | PECERR | TIMEOUT;
}

/// Raw status byte layout handed to the slave engine.
pub const STATUS_BITS: StatusBits = StatusBits::DEFAULT;
/// Informational bits carried next to the error bits.
pub const STATUS_DIR: u8 = 1 << 6;
pub const STATUS_BUSY: u8 = 1 << 7;

/// Folds the I2C ISR register into the engine's 8-bit status byte.
#[must_use]
pub const fn status_flags(isr_bits: u32) -> u8 {
    let mut flags = 0;
    if isr_bits & isr::BERR != 0 {
        flags |= STATUS_BITS.bus_error;
    }
    if isr_bits & isr::ARLO != 0 {
        flags |= STATUS_BITS.arbitration_lost;
    }
    if isr_bits & isr::OVR != 0 {
        flags |= STATUS_BITS.overrun;
    }
    if isr_bits & isr::NACKF != 0 {
        flags |= STATUS_BITS.nack;
    }
    if isr_bits & isr::TIMEOUT != 0 {
        flags |= STATUS_BITS.line_stuck;
    }
    if isr_bits & isr::PECERR != 0 {
        flags |= STATUS_BITS.frame_error;
    }
    if isr_bits & isr::DIR != 0 {
        flags |= STATUS_DIR;
    }
    if isr_bits & isr::BUSY != 0 {
        flags |= STATUS_BUSY;
    }
    flags
}
