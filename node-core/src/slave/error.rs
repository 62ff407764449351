//! Slave-side error taxonomy and the hook used to report it.

use core::fmt;

/// Classified slave bus error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveError {
    /// Frame exceeded the message capacity, or the ring was full at stop.
    Overrun,
    /// No byte arrived within the slave timeout while a frame was open.
    Timeout,
    /// Hardware reported a not-acknowledge.
    Nack,
    /// Misplaced start/stop detected by the peripheral.
    BusError,
    /// Another master won arbitration.
    ArbitrationLost,
    /// A bus line is held low.
    LineStuck,
    /// Stop without an open frame, or a frame-format error flag.
    Frame,
}

impl SlaveError {
    /// Short lowercase label for log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SlaveError::Overrun => "overrun",
            SlaveError::Timeout => "timeout",
            SlaveError::Nack => "nack",
            SlaveError::BusError => "bus-error",
            SlaveError::ArbitrationLost => "arbitration-lost",
            SlaveError::LineStuck => "line-stuck",
            SlaveError::Frame => "frame",
        }
    }
}

impl fmt::Display for SlaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Details handed to the [`ErrorSink`] for every reported error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorContext {
    pub kind: SlaveError,
    /// Raw peripheral status at the time of the error.
    pub hw_status_flags: u8,
    /// `true` when an in-flight or completed frame was lost.
    pub message_dropped: bool,
    pub timestamp_ms: u32,
}

/// Receives slave errors. Called from interrupt context with the engine
/// locked, so implementations must be short and must not touch the engine.
pub trait ErrorSink {
    fn report(&mut self, context: ErrorContext);
}

impl<F> ErrorSink for F
where
    F: FnMut(ErrorContext),
{
    fn report(&mut self, context: ErrorContext) {
        self(context);
    }
}

/// Sink used when no error callback is registered.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopErrorSink;

impl ErrorSink for NoopErrorSink {
    fn report(&mut self, _: ErrorContext) {}
}

/// Bit masks of the peripheral's raw status byte.
///
/// The priority order of [`StatusBits::classify`] is fixed; only the bit
/// positions vary between targets. A zero mask never matches.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusBits {
    pub bus_error: u8,
    pub arbitration_lost: u8,
    pub overrun: u8,
    pub nack: u8,
    pub line_stuck: u8,
    pub frame_error: u8,
}

impl StatusBits {
    /// Layout with one bit per condition, lowest bit = highest priority.
    pub const DEFAULT: Self = Self {
        bus_error: 1 << 0,
        arbitration_lost: 1 << 1,
        overrun: 1 << 2,
        nack: 1 << 3,
        line_stuck: 1 << 4,
        frame_error: 1 << 5,
    };

    /// Maps a raw status byte to a single error, highest priority first.
    #[must_use]
    pub const fn classify(&self, flags: u8) -> Option<SlaveError> {
        if flags & self.bus_error != 0 {
            Some(SlaveError::BusError)
        } else if flags & self.arbitration_lost != 0 {
            Some(SlaveError::ArbitrationLost)
        } else if flags & self.overrun != 0 {
            Some(SlaveError::Overrun)
        } else if flags & self.nack != 0 {
            Some(SlaveError::Nack)
        } else if flags & self.line_stuck != 0 {
            Some(SlaveError::LineStuck)
        } else if flags & self.frame_error != 0 {
            Some(SlaveError::Frame)
        } else {
            None
        }
    }
}

impl Default for StatusBits {
    fn default() -> Self {
        Self::DEFAULT
    }
}
