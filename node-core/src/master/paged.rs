//! Paged memory devices (serial EEPROMs) addressed with a 16-bit big-endian
//! memory offset.

use embedded_hal::delay::DelayNs;

use super::{BitBangMaster, BusLines, SlaveHandoff, TransferError};

/// Largest page size the write path can buffer.
pub const MAX_PAGE_SIZE: usize = 64;

const ADDRESS_BYTES: usize = 2;

/// Bus address and write page geometry of a paged device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PagedDevice {
    /// 7-bit bus address.
    pub address: u8,
    /// Bytes per write page, at most [`MAX_PAGE_SIZE`].
    pub page_size: u16,
}

impl PagedDevice {
    /// 24Cxx-style EEPROM at 0x50 (0xA0 in 8-bit form) with 16-byte pages.
    pub const EEPROM: Self = Self {
        address: 0x50,
        page_size: 16,
    };

    /// Page size clamped to what the write buffer holds.
    fn page_len(self) -> u16 {
        let max = u16::try_from(MAX_PAGE_SIZE).unwrap_or(u16::MAX);
        self.page_size.clamp(1, max)
    }
}

impl Default for PagedDevice {
    fn default() -> Self {
        Self::EEPROM
    }
}

impl<L, D, H> BitBangMaster<L, D, H>
where
    L: BusLines,
    D: DelayNs,
    H: SlaveHandoff,
{
    /// Writes `data` starting at `memory_address`, split on page boundaries.
    ///
    /// Each chunk is sent as its own transaction and followed by ready
    /// polling. The memory address wraps at 16 bits.
    ///
    /// # Errors
    ///
    /// Fails when `data` is empty, a chunk is not acknowledged or the device
    /// never finishes its write cycle. Chunks already written stay written.
    pub fn device_write(&mut self, memory_address: u16, data: &[u8]) -> Result<(), TransferError> {
        if data.is_empty() {
            return Err(TransferError);
        }

        let device = self.config.device;
        let page = device.page_len();
        let mut payload = [0_u8; ADDRESS_BYTES + MAX_PAGE_SIZE];
        let mut offset = 0_usize;

        while offset < data.len() {
            let step = u16::try_from(offset).map_err(|_| TransferError)?;
            let current = memory_address.wrapping_add(step);
            let room = usize::from(page - current % page);
            let chunk = room.min(data.len() - offset);

            payload[..ADDRESS_BYTES].copy_from_slice(&current.to_be_bytes());
            payload[ADDRESS_BYTES..ADDRESS_BYTES + chunk]
                .copy_from_slice(&data[offset..offset + chunk]);

            self.write(device.address, &payload[..ADDRESS_BYTES + chunk])?;
            self.wait_ready(device.address)?;

            offset += chunk;
        }

        Ok(())
    }

    /// Reads `buffer.len()` bytes starting at `memory_address`.
    ///
    /// # Errors
    ///
    /// Fails when `buffer` is empty or the device does not acknowledge.
    pub fn device_read(
        &mut self,
        memory_address: u16,
        buffer: &mut [u8],
    ) -> Result<(), TransferError> {
        if buffer.is_empty() {
            return Err(TransferError);
        }

        let address = self.config.device.address;
        self.write_read(address, &memory_address.to_be_bytes(), buffer)
    }
}
