#![no_std]

// Hardware-facing communication core for the I2C node firmware.
//
// Everything in here is target independent: the tick scheduler, the
// interrupt-driven slave engine and the bit-banged master only talk to the
// board through the small traits they declare, so the same code runs on the
// MCU and under `cargo test` on the host.

pub mod master;
pub mod scheduler;
pub mod slave;
pub mod sync;
