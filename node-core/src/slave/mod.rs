//! Interrupt-driven slave protocol engine.
//!
//! The bus peripheral reports four conditions (start, byte, stop, error) from
//! interrupt context. The engine assembles the bytes between a start and the
//! next stop into a [`Message`], queues completed frames in a fixed 8-slot
//! ring, and serves a staged response to the external master's read phase.
//! The 1 ms tick closes frames that stall mid-transfer.
//!
//! Every error path is "report once, re-arm the hardware, carry on". A frame
//! is never retried and a truncated frame is never queued.

mod error;
mod message;

use heapless::Deque;

use crate::master::SlaveHandoff;
use crate::scheduler::UptimeSource;
use crate::sync::Shared;

pub use error::{ErrorContext, ErrorSink, NoopErrorSink, SlaveError, StatusBits};
pub use message::{IDLE_BYTE, MESSAGE_MAX_BYTES, Message};

use message::ResponseBuffer;

/// Number of completed frames buffered for the foreground.
pub const RING_CAPACITY: usize = 8;

/// Milliseconds without a byte after which an open frame is aborted.
pub const SLAVE_TIMEOUT_MS: u16 = 5;

/// Vendor peripheral calls used to (re)configure slave mode.
///
/// Implementations must be idempotent; the engine calls them in the fixed
/// order `stop`, `create`, `start`, `rearm_slave_receive` on every re-arm.
pub trait SlavePeripheral {
    /// Halts the bus peripheral.
    fn stop(&mut self);
    /// Applies the peripheral configuration.
    fn create(&mut self);
    /// Enables the peripheral.
    fn start(&mut self);
    /// Re-enables slave address matching and reception.
    fn rearm_slave_receive(&mut self);
}

impl<T> SlavePeripheral for &mut T
where
    T: SlavePeripheral + ?Sized,
{
    fn stop(&mut self) {
        (**self).stop();
    }

    fn create(&mut self) {
        (**self).create();
    }

    fn start(&mut self) {
        (**self).start();
    }

    fn rearm_slave_receive(&mut self) {
        (**self).rearm_slave_receive();
    }
}

#[derive(Debug, Default)]
struct FrameState {
    receiving: bool,
    message: Message,
    in_frame_ticks: u16,
}

impl FrameState {
    fn reset(&mut self) {
        self.receiving = false;
        self.in_frame_ticks = 0;
        self.message.clear();
    }
}

/// Slave protocol state: in-progress frame, message ring and response.
pub struct SlaveEngine<P, S, U> {
    peripheral: P,
    sink: S,
    uptime: U,
    status_bits: StatusBits,
    queue: Deque<Message, RING_CAPACITY>,
    frame: FrameState,
    response: ResponseBuffer,
    /// Set while the master driver owns the lines.
    suspended: bool,
}

impl<P, S, U> SlaveEngine<P, S, U>
where
    P: SlavePeripheral,
    S: ErrorSink,
    U: UptimeSource,
{
    /// Creates an idle engine. The hardware is untouched until [`init`].
    ///
    /// [`init`]: SlaveEngine::init
    #[must_use]
    pub fn new(peripheral: P, uptime: U, sink: S) -> Self {
        Self {
            peripheral,
            sink,
            uptime,
            status_bits: StatusBits::DEFAULT,
            queue: Deque::new(),
            frame: FrameState::default(),
            response: ResponseBuffer::new(),
            suspended: false,
        }
    }

    /// Overrides the raw status bit layout used by [`on_error`].
    ///
    /// [`on_error`]: SlaveEngine::on_error
    #[must_use]
    pub fn with_status_bits(mut self, status_bits: StatusBits) -> Self {
        self.status_bits = status_bits;
        self
    }

    /// Empties the ring, clears the frame and response, then re-arms.
    pub fn init(&mut self) {
        self.queue.clear();
        self.response.clear();
        self.frame.reset();
        self.rearm();
    }

    /// Replaces the registered error sink.
    pub fn set_error_sink(&mut self, sink: S) {
        self.sink = sink;
    }

    /// Re-arms the hardware and discards the in-flight frame and response.
    ///
    /// Completed frames already in the ring are kept.
    pub fn reset(&mut self) {
        self.rearm();
        self.response.clear();
        self.frame.reset();
    }

    /// Dequeues the oldest completed frame.
    pub fn pop_message(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    /// Number of completed frames waiting in the ring.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    /// Stages a response for the next read phase.
    ///
    /// An empty payload clears the response. A payload longer than
    /// [`MESSAGE_MAX_BYTES`] is rejected and the previous response is kept.
    pub fn set_response(&mut self, payload: &[u8]) -> bool {
        self.response.set(payload)
    }

    /// Returns the staged response, if one is pending.
    #[must_use]
    pub fn get_response(&self) -> Option<&[u8]> {
        self.response.get()
    }

    pub fn clear_response(&mut self) {
        self.response.clear();
    }

    /// Supplies the next response byte to a slave-transmit request.
    pub fn on_read_request(&mut self) -> u8 {
        self.response.next_byte()
    }

    /// Opens a new frame, discarding any frame that never saw its stop.
    pub fn on_start(&mut self, hw_status_flags: u8) {
        self.frame.message.clear();
        self.frame.message.hw_status_flags = hw_status_flags;
        self.frame.in_frame_ticks = 0;
        self.frame.receiving = true;
    }

    /// Appends a received byte to the open frame.
    ///
    /// A byte beyond capacity drops the whole frame and forces a reset.
    pub fn on_byte(&mut self, byte: u8) {
        if !self.frame.receiving {
            return;
        }

        if self.frame.message.bytes.push(byte).is_ok() {
            self.frame.in_frame_ticks = 0;
        } else {
            let flags = self.frame.message.hw_status_flags;
            self.report(SlaveError::Overrun, flags, true);
            self.reset();
        }
    }

    /// Closes the open frame and queues it.
    pub fn on_stop(&mut self, hw_status_flags: u8) {
        if !self.frame.receiving {
            self.report(SlaveError::Frame, hw_status_flags, false);
            return;
        }

        let mut message = core::mem::take(&mut self.frame.message);
        message.hw_status_flags = hw_status_flags;
        message.timestamp_ms = self.uptime.uptime_ms();

        if self.queue.push_back(message).is_err() {
            self.report(SlaveError::Overrun, hw_status_flags, true);
        }

        self.frame.reset();
    }

    /// Classifies a hardware error, reports it and re-arms unconditionally.
    pub fn on_error(&mut self, hw_status_flags: u8) {
        if let Some(kind) = self.status_bits.classify(hw_status_flags) {
            let dropped = self.frame.receiving;
            self.report(kind, hw_status_flags, dropped);
        }

        self.reset();
    }

    /// Advances the in-frame timeout. Called from the 1 ms tick.
    pub fn on_tick_1ms(&mut self) {
        if !self.frame.receiving {
            return;
        }

        self.frame.in_frame_ticks = self.frame.in_frame_ticks.saturating_add(1);
        if self.frame.in_frame_ticks >= SLAVE_TIMEOUT_MS {
            let flags = self.frame.message.hw_status_flags;
            self.report(SlaveError::Timeout, flags, true);
            self.reset();
        }
    }

    /// Stops the peripheral so the master driver can take the lines.
    ///
    /// Until [`resume_peripheral`] runs, forced resets still clear engine
    /// state but leave the hardware stopped.
    ///
    /// [`resume_peripheral`]: SlaveEngine::resume_peripheral
    pub fn suspend_peripheral(&mut self) {
        self.peripheral.stop();
        self.suspended = true;
    }

    /// Restores slave mode after a master transaction. Frame and ring state
    /// are left as they were.
    pub fn resume_peripheral(&mut self) {
        self.suspended = false;
        self.peripheral.create();
        self.peripheral.start();
        self.peripheral.rearm_slave_receive();
    }

    /// Returns `true` between a suspend and the matching resume.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Returns `true` while a frame is open.
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        self.frame.receiving
    }

    /// Ticks elapsed since the open frame last received a byte.
    #[must_use]
    pub fn in_frame_ticks(&self) -> u16 {
        self.frame.in_frame_ticks
    }

    #[must_use]
    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    #[must_use]
    pub fn error_sink(&self) -> &S {
        &self.sink
    }

    pub fn error_sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn rearm(&mut self) {
        if self.suspended {
            return;
        }
        self.peripheral.stop();
        self.resume_peripheral();
    }

    fn report(&mut self, kind: SlaveError, hw_status_flags: u8, message_dropped: bool) {
        self.sink.report(ErrorContext {
            kind,
            hw_status_flags,
            message_dropped,
            timestamp_ms: self.uptime.uptime_ms(),
        });
    }
}

impl<P, S, U> SlaveHandoff for &mut SlaveEngine<P, S, U>
where
    P: SlavePeripheral,
    S: ErrorSink,
    U: UptimeSource,
{
    fn suspend(&mut self) {
        self.suspend_peripheral();
    }

    fn resume(&mut self) {
        self.resume_peripheral();
    }
}

impl<P, S, U> SlaveHandoff for &Shared<SlaveEngine<P, S, U>>
where
    P: SlavePeripheral,
    S: ErrorSink,
    U: UptimeSource,
{
    fn suspend(&mut self) {
        let _ = self.with(SlaveEngine::suspend_peripheral);
    }

    fn resume(&mut self) {
        let _ = self.with(SlaveEngine::resume_peripheral);
    }
}
