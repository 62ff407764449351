#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use node_core::master::{BusLines, Line, SlaveHandoff};
use node_core::slave::{ErrorContext, ErrorSink, SlavePeripheral};

/// Observable steps shared between the simulated bus and the handoff.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Suspend,
    Claim,
    Restore,
    Resume,
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// One start-to-start or start-to-stop segment seen on the wire.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Segment {
    pub address_byte: u8,
    pub acknowledged: bool,
    /// Bytes written by the master after the address.
    pub written: Vec<u8>,
    /// Bytes the device shifted out.
    pub read: Vec<u8>,
    /// Rising SCL edges between this start and the following start or stop.
    pub scl_rises: u32,
}

impl Segment {
    pub fn is_read(&self) -> bool {
        self.address_byte & 1 == 1
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Idle,
    Receive,
    Transmit,
    Ignore,
}

/// Passive device on a simulated open-drain bus.
///
/// The device decodes start, stop and clock edges from the master's line
/// changes and behaves like a 24Cxx EEPROM: two address bytes set the
/// pointer, further written bytes are stored, reads stream from the pointer.
/// After a write with data it NACKs its address for `busy_polls` probes.
/// In echo mode it instead replays the data of its last write.
pub struct SimBus {
    pub device_address: u8,
    pub memory: Vec<u8>,
    pub busy_polls: u32,
    busy_remaining: u32,
    pointer: u16,
    pointer_bytes: u8,
    echo: bool,
    last_write: Vec<u8>,
    echo_index: usize,

    master_scl_low: bool,
    master_sda_low: bool,
    device_sda_low: bool,
    /// Forces SDA low regardless of the master, like a slave stuck mid-byte.
    pub stuck_sda_pulses: u32,

    phase: Phase,
    addressing: bool,
    /// Rising SCL edges seen in the current byte, including the ninth.
    clocks: u8,
    shift: u8,
    tx_byte: u8,
    master_ack: bool,

    pub segments: Vec<Segment>,
    pub starts: u32,
    pub stops: u32,
    pub claimed: bool,
    log: Option<EventLog>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Snapshot(pub u32);

impl SimBus {
    pub fn new(device_address: u8) -> Self {
        Self {
            device_address,
            memory: vec![0xFF; 1_024],
            busy_polls: 0,
            busy_remaining: 0,
            pointer: 0,
            pointer_bytes: 0,
            echo: false,
            last_write: Vec::new(),
            echo_index: 0,
            master_scl_low: false,
            master_sda_low: false,
            device_sda_low: false,
            stuck_sda_pulses: 0,
            phase: Phase::Idle,
            addressing: false,
            clocks: 0,
            shift: 0,
            tx_byte: 0xFF,
            master_ack: false,
            segments: Vec::new(),
            starts: 0,
            stops: 0,
            claimed: false,
            log: None,
        }
    }

    /// Device that answers reads with the bytes of its last write.
    pub fn echo(device_address: u8) -> Self {
        Self {
            echo: true,
            ..Self::new(device_address)
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_busy_polls(mut self, busy_polls: u32) -> Self {
        self.busy_polls = busy_polls;
        self
    }

    /// Address-only write segments, i.e. ready probes.
    pub fn probes(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| !segment.is_read() && segment.written.is_empty())
            .count()
    }

    /// Write segments that carried data and were acknowledged.
    pub fn data_writes(&self) -> Vec<&Segment> {
        self.segments
            .iter()
            .filter(|segment| {
                !segment.is_read() && segment.acknowledged && !segment.written.is_empty()
            })
            .collect()
    }

    pub fn scl_high(&self) -> bool {
        !self.master_scl_low
    }

    pub fn sda_high(&self) -> bool {
        !(self.master_sda_low || self.device_sda_low || self.stuck_sda_pulses > 0)
    }

    fn record(&self, event: Event) {
        if let Some(log) = &self.log {
            log.borrow_mut().push(event);
        }
    }

    fn mem_index(&self) -> usize {
        usize::from(self.pointer) % self.memory.len()
    }

    fn apply(&mut self, scl_low: bool, sda_low: bool) {
        let scl_before = self.scl_high();
        let sda_before = self.sda_high();

        self.master_scl_low = scl_low;
        self.master_sda_low = sda_low;

        let scl_after = self.scl_high();
        let sda_after = self.sda_high();

        if scl_before && scl_after && sda_before != sda_after {
            if sda_after {
                self.on_stop();
            } else {
                self.on_start();
            }
        } else if !scl_before && scl_after {
            self.on_scl_rise(sda_after);
        } else if scl_before && !scl_after {
            self.on_scl_fall();
        }
    }

    fn on_start(&mut self) {
        self.starts += 1;
        self.phase = Phase::Receive;
        self.addressing = true;
        self.clocks = 0;
        self.shift = 0;
        self.device_sda_low = false;
        self.segments.push(Segment::default());
    }

    fn on_stop(&mut self) {
        self.stops += 1;
        let wrote_data = self.segments.last().is_some_and(|segment| {
            !segment.is_read() && segment.acknowledged && segment.written.len() > 2
        });
        if wrote_data {
            self.busy_remaining = self.busy_polls;
        }
        self.phase = Phase::Idle;
        self.device_sda_low = false;
    }

    fn on_scl_rise(&mut self, sda: bool) {
        if self.phase != Phase::Idle {
            if let Some(segment) = self.segments.last_mut() {
                segment.scl_rises += 1;
            }
        }

        if self.stuck_sda_pulses > 0 {
            self.stuck_sda_pulses -= 1;
            return;
        }

        match self.phase {
            Phase::Receive if self.clocks < 8 => {
                self.shift = (self.shift << 1) | u8::from(sda);
                self.clocks += 1;
            }
            Phase::Transmit if self.clocks < 8 => self.clocks += 1,
            Phase::Receive | Phase::Transmit if self.clocks == 8 => {
                self.master_ack = !sda;
                self.clocks = 9;
            }
            _ => {}
        }
    }

    fn on_scl_fall(&mut self) {
        match self.phase {
            Phase::Receive => self.receive_fall(),
            Phase::Transmit => self.transmit_fall(),
            Phase::Idle | Phase::Ignore => {}
        }
    }

    fn receive_fall(&mut self) {
        match self.clocks {
            8 => {
                let byte = self.shift;
                self.device_sda_low = self.accept(byte);
            }
            9 => {
                self.device_sda_low = false;
                self.clocks = 0;
                self.shift = 0;

                let (acknowledged, is_read) = self
                    .segments
                    .last()
                    .map_or((false, false), |segment| (segment.acknowledged, segment.is_read()));
                if !acknowledged {
                    self.phase = Phase::Ignore;
                } else if self.addressing {
                    self.addressing = false;
                    if is_read {
                        self.phase = Phase::Transmit;
                        self.load_tx();
                    }
                }
            }
            _ => {}
        }
    }

    fn transmit_fall(&mut self) {
        match self.clocks {
            1..=7 => self.device_sda_low = (self.tx_byte >> (7 - self.clocks)) & 1 == 0,
            8 => self.device_sda_low = false,
            9 => {
                if self.master_ack {
                    self.clocks = 0;
                    self.load_tx();
                } else {
                    self.phase = Phase::Ignore;
                    self.device_sda_low = false;
                }
            }
            _ => {}
        }
    }

    fn load_tx(&mut self) {
        if self.echo {
            self.tx_byte = self
                .last_write
                .get(self.echo_index)
                .copied()
                .unwrap_or(0xFF);
            self.echo_index += 1;
        } else {
            self.tx_byte = self.memory[self.mem_index()];
            self.pointer = self.pointer.wrapping_add(1);
        }
        if let Some(segment) = self.segments.last_mut() {
            segment.read.push(self.tx_byte);
        }
        self.device_sda_low = self.tx_byte & 0x80 == 0;
    }

    fn accept(&mut self, byte: u8) -> bool {
        if self.addressing {
            let matches = byte >> 1 == self.device_address;
            let ack = if matches && self.busy_remaining > 0 {
                self.busy_remaining -= 1;
                false
            } else {
                matches
            };
            if let Some(segment) = self.segments.last_mut() {
                segment.address_byte = byte;
                segment.acknowledged = ack;
            }
            if ack && byte & 1 == 0 {
                self.pointer_bytes = 0;
                if self.echo {
                    self.last_write.clear();
                }
            }
            if ack && byte & 1 == 1 {
                self.echo_index = 0;
            }
            return ack;
        }

        if let Some(segment) = self.segments.last_mut() {
            segment.written.push(byte);
        }
        if self.echo {
            self.last_write.push(byte);
            return true;
        }
        match self.pointer_bytes {
            0 => {
                self.pointer = u16::from(byte) << 8;
                self.pointer_bytes = 1;
            }
            1 => {
                self.pointer |= u16::from(byte);
                self.pointer_bytes = 2;
            }
            _ => {
                let index = self.mem_index();
                self.memory[index] = byte;
                self.pointer = self.pointer.wrapping_add(1);
            }
        }
        true
    }
}

impl BusLines for SimBus {
    type Snapshot = Snapshot;

    fn claim(&mut self) -> Snapshot {
        assert!(!self.claimed, "lines claimed twice");
        self.claimed = true;
        self.record(Event::Claim);
        self.apply(false, false);
        Snapshot(0x5A5A)
    }

    fn restore(&mut self, snapshot: Snapshot) {
        assert!(self.claimed, "restore without claim");
        assert_eq!(snapshot, Snapshot(0x5A5A));
        self.claimed = false;
        self.record(Event::Restore);
        self.apply(false, false);
    }

    fn release(&mut self, line: Line) {
        assert!(self.claimed, "line released while not claimed");
        match line {
            Line::Scl => self.apply(false, self.master_sda_low),
            Line::Sda => self.apply(self.master_scl_low, false),
        }
    }

    fn drive_low(&mut self, line: Line) {
        assert!(self.claimed, "line driven while not claimed");
        match line {
            Line::Scl => self.apply(true, self.master_sda_low),
            Line::Sda => self.apply(self.master_scl_low, true),
        }
    }

    fn is_high(&mut self, line: Line) -> bool {
        match line {
            Line::Scl => self.scl_high(),
            Line::Sda => self.sda_high(),
        }
    }
}

/// Handoff that only records its calls.
pub struct RecordingHandoff {
    log: EventLog,
}

impl RecordingHandoff {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl SlaveHandoff for RecordingHandoff {
    fn suspend(&mut self) {
        self.log.borrow_mut().push(Event::Suspend);
    }

    fn resume(&mut self) {
        self.log.borrow_mut().push(Event::Resume);
    }
}

/// Delay that accumulates requested time instead of waiting.
#[derive(Default)]
pub struct CountingDelay {
    pub total_ns: u64,
    pub calls: u32,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PeripheralCall {
    Stop,
    Create,
    Start,
    Rearm,
}

pub const REARM_SEQUENCE: [PeripheralCall; 4] = [
    PeripheralCall::Stop,
    PeripheralCall::Create,
    PeripheralCall::Start,
    PeripheralCall::Rearm,
];

/// Slave peripheral that logs every vendor call.
#[derive(Default)]
pub struct RecordingPeripheral {
    pub calls: Vec<PeripheralCall>,
}

impl RecordingPeripheral {
    pub fn rearm_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| **call == PeripheralCall::Rearm)
            .count()
    }
}

impl SlavePeripheral for RecordingPeripheral {
    fn stop(&mut self) {
        self.calls.push(PeripheralCall::Stop);
    }

    fn create(&mut self) {
        self.calls.push(PeripheralCall::Create);
    }

    fn start(&mut self) {
        self.calls.push(PeripheralCall::Start);
    }

    fn rearm_slave_receive(&mut self) {
        self.calls.push(PeripheralCall::Rearm);
    }
}

/// Error sink that keeps every report.
#[derive(Default)]
pub struct RecordingSink {
    pub reports: Vec<ErrorContext>,
}

impl ErrorSink for RecordingSink {
    fn report(&mut self, context: ErrorContext) {
        self.reports.push(context);
    }
}
