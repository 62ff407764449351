//! Register table answered over the slave bus.
//!
//! Byte 0 of every received frame selects an entry. The entry's optional
//! handler sees the whole message and its response is staged for the next
//! read phase.

use node_core::slave::Message;

pub const REG_HW_VERSION: u8 = 0x01;
pub const REG_SW_VERSION: u8 = 0x02;

pub const HW_VERSION: [u8; 2] = [0x00, 0x01];
pub const SW_VERSION: [u8; 2] = [0x00, 0x10];

/// Side effect run when a register is written.
pub type RegisterHandler = fn(&Message);

/// One addressable register.
#[derive(Copy, Clone, Debug)]
pub struct RegisterEntry {
    pub address: u8,
    pub response: &'static [u8],
    pub handler: Option<RegisterHandler>,
}

pub static REGISTERS: [RegisterEntry; 2] = [
    RegisterEntry {
        address: REG_HW_VERSION,
        response: &HW_VERSION,
        handler: None,
    },
    RegisterEntry {
        address: REG_SW_VERSION,
        response: &SW_VERSION,
        handler: None,
    },
];

/// Looks up the register selected by `address`.
#[must_use]
pub fn find(address: u8) -> Option<&'static RegisterEntry> {
    REGISTERS.iter().find(|entry| entry.address == address)
}
