use heapless::Vec;

/// Maximum number of bytes carried by one slave frame or response.
pub const MESSAGE_MAX_BYTES: usize = 32;

/// Value clocked out on a read request with nothing staged (released bus).
pub const IDLE_BYTE: u8 = 0xFF;

/// Frame received between a start and a stop condition.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    pub bytes: Vec<u8, MESSAGE_MAX_BYTES>,
    /// Raw peripheral status latched at the stop condition.
    pub hw_status_flags: u8,
    /// Uptime at which the stop condition was observed.
    pub timestamp_ms: u32,
}

impl Message {
    /// Builds a message from a byte slice, or `None` if it is too long.
    #[must_use]
    pub fn from_slice(bytes: &[u8], hw_status_flags: u8, timestamp_ms: u32) -> Option<Self> {
        let bytes = Vec::from_slice(bytes).ok()?;
        Some(Self {
            bytes,
            hw_status_flags,
            timestamp_ms,
        })
    }

    /// Number of payload bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Register/command selector carried in byte 0.
    #[must_use]
    pub fn selector(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    /// Payload following the selector byte.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or(&[])
    }

    pub(super) fn clear(&mut self) {
        self.bytes.clear();
        self.hw_status_flags = 0;
        self.timestamp_ms = 0;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Message {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(
            f,
            "Message {{ bytes: {=[u8]:x}, flags: {=u8:#x}, t: {=u32}ms }}",
            self.bytes.as_slice(),
            self.hw_status_flags,
            self.timestamp_ms
        );
    }
}

/// Bytes staged for the external master's next read phase.
#[derive(Clone, Debug, Default)]
pub(super) struct ResponseBuffer {
    bytes: Vec<u8, MESSAGE_MAX_BYTES>,
    cursor: usize,
    pending: bool,
}

impl ResponseBuffer {
    pub(super) const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            cursor: 0,
            pending: false,
        }
    }

    /// Stages `payload`; the previous contents survive a rejected call.
    pub(super) fn set(&mut self, payload: &[u8]) -> bool {
        if payload.is_empty() {
            self.clear();
            return true;
        }

        let Ok(bytes) = Vec::from_slice(payload) else {
            return false;
        };
        self.bytes = bytes;
        self.cursor = 0;
        self.pending = true;
        true
    }

    pub(super) fn get(&self) -> Option<&[u8]> {
        self.pending.then_some(self.bytes.as_slice())
    }

    pub(super) fn next_byte(&mut self) -> u8 {
        if !self.pending {
            return IDLE_BYTE;
        }

        match self.bytes.get(self.cursor) {
            Some(&byte) => {
                self.cursor += 1;
                byte
            }
            None => IDLE_BYTE,
        }
    }

    pub(super) fn clear(&mut self) {
        self.bytes.clear();
        self.cursor = 0;
        self.pending = false;
    }
}
