//! Software bit-banged bus master.
//!
//! The master shares its two lines with the slave peripheral. Every
//! transaction suspends the peripheral, snapshots the line configuration and
//! releases both lines. It then clocks the transfer by hand, restores the
//! snapshot and hands the lines back to the slave, whatever the outcome.
//!
//! Timing is open loop. One bit delay separates every line change, and clock
//! stretching is not honoured.

mod hal;
mod paged;

use core::fmt;

use embedded_hal::delay::DelayNs;

pub use paged::{MAX_PAGE_SIZE, PagedDevice};

/// One of the two bus lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    Scl,
    Sda,
}

/// Open-drain control over the clock and data lines.
///
/// `release` lets the pull-up raise the line. `drive_low` actively pulls
/// it down. A line is never driven high.
pub trait BusLines {
    /// Saved pin configuration.
    type Snapshot;

    /// Records the current pin configuration and releases both lines as
    /// open-drain general-purpose pins with pull-ups.
    fn claim(&mut self) -> Self::Snapshot;

    /// Puts back the configuration captured by [`BusLines::claim`].
    fn restore(&mut self, snapshot: Self::Snapshot);

    fn release(&mut self, line: Line);

    fn drive_low(&mut self, line: Line);

    /// Samples the line level.
    fn is_high(&mut self, line: Line) -> bool;
}

impl<T> BusLines for &mut T
where
    T: BusLines + ?Sized,
{
    type Snapshot = T::Snapshot;

    fn claim(&mut self) -> Self::Snapshot {
        (**self).claim()
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        (**self).restore(snapshot);
    }

    fn release(&mut self, line: Line) {
        (**self).release(line);
    }

    fn drive_low(&mut self, line: Line) {
        (**self).drive_low(line);
    }

    fn is_high(&mut self, line: Line) -> bool {
        (**self).is_high(line)
    }
}

/// Lends the bus lines from the slave peripheral for one transaction.
pub trait SlaveHandoff {
    /// Stops the slave peripheral before the lines are claimed.
    fn suspend(&mut self);

    /// Re-creates, starts and re-arms the slave peripheral after the lines
    /// are restored.
    fn resume(&mut self);
}

/// Handoff used when no slave peripheral shares the lines.
impl SlaveHandoff for () {
    fn suspend(&mut self) {}

    fn resume(&mut self) {}
}

/// Failure of a master transaction.
///
/// A missing acknowledge, an empty request and an exhausted ready poll are
/// not distinguished.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferError;

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bus transfer failed")
    }
}

/// Timing and device parameters of the bit-bang master.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MasterConfig {
    /// Delay between line transitions; 5 µs gives roughly 100 kHz.
    pub bit_delay_us: u32,
    /// Upper bound on address probes while waiting for a write cycle.
    pub max_ready_polls: u32,
    /// Paged memory device served by [`BitBangMaster::device_write`].
    pub device: PagedDevice,
}

impl MasterConfig {
    pub const DEFAULT: Self = Self {
        bit_delay_us: 5,
        max_ready_polls: 100,
        device: PagedDevice::EEPROM,
    };
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Number of clock pulses used to free a slave stuck mid-byte.
pub const RECOVERY_PULSES: u8 = 9;

/// Reduces an address to 7 bits, accepting the 8-bit (shifted) form.
#[must_use]
pub const fn normalize_address(address: u8) -> u8 {
    let address = if address & 0x80 != 0 {
        address >> 1
    } else {
        address
    };
    address & 0x7F
}

/// Blocking bus master built from two open-drain lines and a delay.
pub struct BitBangMaster<L, D, H> {
    lines: L,
    delay: D,
    handoff: H,
    config: MasterConfig,
}

impl<L, D, H> BitBangMaster<L, D, H>
where
    L: BusLines,
    D: DelayNs,
    H: SlaveHandoff,
{
    #[must_use]
    pub fn new(lines: L, delay: D, handoff: H, config: MasterConfig) -> Self {
        Self {
            lines,
            delay,
            handoff,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    #[must_use]
    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    #[must_use]
    pub fn handoff(&self) -> &H {
        &self.handoff
    }

    /// Returns the owned lines, delay and handoff.
    #[must_use]
    pub fn into_parts(self) -> (L, D, H) {
        (self.lines, self.delay, self.handoff)
    }

    /// Writes `data` to the device at `address`.
    ///
    /// # Errors
    ///
    /// Fails when `data` is empty or any byte is not acknowledged.
    pub fn write(&mut self, address: u8, data: &[u8]) -> Result<(), TransferError> {
        if data.is_empty() {
            return Err(TransferError);
        }
        self.write_read(address, data, &mut [])
    }

    /// Reads `buffer.len()` bytes from the device at `address`.
    ///
    /// # Errors
    ///
    /// Fails when `buffer` is empty or the address is not acknowledged.
    pub fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), TransferError> {
        if buffer.is_empty() {
            return Err(TransferError);
        }
        self.write_read(address, &[], buffer)
    }

    /// Writes `tx`, then reads into `rx` after a repeated start.
    ///
    /// Either side may be empty, but not both. The read phase is skipped
    /// when the write phase fails. A single stop closes the transaction.
    ///
    /// # Errors
    ///
    /// Fails when both sides are empty or a byte is not acknowledged.
    pub fn write_read(
        &mut self,
        address: u8,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), TransferError> {
        if tx.is_empty() && rx.is_empty() {
            return Err(TransferError);
        }

        let address = normalize_address(address);
        let snapshot = self.acquire();

        let mut acknowledged = true;
        if !tx.is_empty() {
            self.start();
            acknowledged = self.write_byte(address << 1)
                && tx.iter().all(|&byte| self.write_byte(byte));
        }

        if acknowledged && !rx.is_empty() {
            self.start();
            acknowledged = self.write_byte((address << 1) | 1);
            if acknowledged {
                self.read_into(rx, true);
            }
        }

        self.stop();
        self.restore(snapshot);

        if acknowledged { Ok(()) } else { Err(TransferError) }
    }

    /// Addresses the device once and reports whether it acknowledged.
    ///
    /// The probe is a complete transaction of its own.
    pub fn probe(&mut self, address: u8) -> bool {
        let address = normalize_address(address);
        let snapshot = self.acquire();

        self.start();
        let acknowledged = self.write_byte(address << 1);
        self.stop();

        self.restore(snapshot);
        acknowledged
    }

    /// Probes `address` until it acknowledges or the poll budget runs out.
    ///
    /// # Errors
    ///
    /// Fails after [`MasterConfig::max_ready_polls`] unacknowledged probes.
    pub fn wait_ready(&mut self, address: u8) -> Result<(), TransferError> {
        for _ in 0..self.config.max_ready_polls {
            if self.probe(address) {
                return Ok(());
            }
            self.bit_delay();
        }
        Err(TransferError)
    }

    /// Clocks SCL until a slave holding SDA low lets go, then issues a stop.
    ///
    /// # Errors
    ///
    /// Fails when SDA is still low after [`RECOVERY_PULSES`] clocks.
    pub fn recover_bus(&mut self) -> Result<(), TransferError> {
        let snapshot = self.acquire();

        let mut released = false;
        for _ in 0..RECOVERY_PULSES {
            self.lines.drive_low(Line::Scl);
            self.bit_delay();
            self.lines.release(Line::Scl);
            self.bit_delay();

            if self.lines.is_high(Line::Sda) {
                released = true;
                break;
            }
        }

        self.lines.drive_low(Line::Sda);
        self.bit_delay();
        self.lines.drive_low(Line::Scl);
        self.bit_delay();
        self.lines.release(Line::Scl);
        self.bit_delay();
        self.lines.release(Line::Sda);
        self.bit_delay();

        self.restore(snapshot);

        if released { Ok(()) } else { Err(TransferError) }
    }

    fn acquire(&mut self) -> L::Snapshot {
        self.handoff.suspend();
        self.lines.claim()
    }

    fn restore(&mut self, snapshot: L::Snapshot) {
        self.lines.restore(snapshot);
        self.handoff.resume();
    }

    fn bit_delay(&mut self) {
        self.delay.delay_us(self.config.bit_delay_us);
    }

    fn start(&mut self) {
        self.lines.release(Line::Sda);
        self.lines.release(Line::Scl);
        self.bit_delay();
        self.lines.drive_low(Line::Sda);
        self.bit_delay();
        self.lines.drive_low(Line::Scl);
    }

    fn stop(&mut self) {
        self.lines.drive_low(Line::Sda);
        self.bit_delay();
        self.lines.release(Line::Scl);
        self.bit_delay();
        self.lines.release(Line::Sda);
        self.bit_delay();
    }

    fn write_bit(&mut self, bit: bool) {
        if bit {
            self.lines.release(Line::Sda);
        } else {
            self.lines.drive_low(Line::Sda);
        }
        self.bit_delay();
        self.lines.release(Line::Scl);
        self.bit_delay();
        self.lines.drive_low(Line::Scl);
    }

    fn read_bit(&mut self) -> bool {
        self.lines.release(Line::Sda);
        self.bit_delay();
        self.lines.release(Line::Scl);
        self.bit_delay();
        let high = self.lines.is_high(Line::Sda);
        self.lines.drive_low(Line::Scl);
        high
    }

    /// Shifts out one byte MSB first; `true` when the receiver acknowledged.
    fn write_byte(&mut self, value: u8) -> bool {
        for shift in (0..8).rev() {
            self.write_bit(value & (1 << shift) != 0);
        }
        !self.read_bit()
    }

    fn read_byte(&mut self, ack: bool) -> u8 {
        let mut value = 0;
        for _ in 0..8 {
            value = (value << 1) | u8::from(self.read_bit());
        }
        self.write_bit(!ack);
        value
    }

    /// Fills `buffer`, acknowledging every byte except a final one.
    fn read_into(&mut self, buffer: &mut [u8], last_is_final: bool) {
        let count = buffer.len();
        for (index, slot) in buffer.iter_mut().enumerate() {
            let ack = !(last_is_final && index + 1 == count);
            *slot = self.read_byte(ack);
        }
    }
}
