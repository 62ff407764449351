use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};

use super::{BitBangMaster, BusLines, SlaveHandoff, TransferError, normalize_address};

impl i2c::Error for TransferError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl<L, D, H> ErrorType for BitBangMaster<L, D, H> {
    type Error = TransferError;
}

impl<L, D, H> I2c<SevenBitAddress> for BitBangMaster<L, D, H>
where
    L: BusLines,
    D: DelayNs,
    H: SlaveHandoff,
{
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }

        let address = normalize_address(address);
        let snapshot = self.acquire();

        let mut acknowledged = true;
        let mut previous_read = None;
        let count = operations.len();

        for index in 0..count {
            let next_is_read = operations
                .get(index + 1)
                .map(|next| matches!(next, Operation::Read(_)));

            match &mut operations[index] {
                Operation::Write(bytes) => {
                    if previous_read != Some(false) {
                        self.start();
                        acknowledged = self.write_byte(address << 1);
                    }
                    acknowledged = acknowledged && bytes.iter().all(|&byte| self.write_byte(byte));
                    previous_read = Some(false);
                }
                Operation::Read(buffer) => {
                    if previous_read != Some(true) {
                        self.start();
                        acknowledged = self.write_byte((address << 1) | 1);
                    }
                    if acknowledged {
                        self.read_into(buffer, next_is_read != Some(true));
                    }
                    previous_read = Some(true);
                }
            }

            if !acknowledged {
                break;
            }
        }

        self.stop();
        self.restore(snapshot);

        if acknowledged { Ok(()) } else { Err(TransferError) }
    }
}
