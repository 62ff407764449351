//! I2C1 in slave mode, driven from its interrupt.
//!
//! The peripheral is programmed through the PAC so the slave engine keeps
//! full control over when it is stopped and re-armed.

#![cfg(target_os = "none")]

use embassy_stm32::Peri;
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::pac;
use embassy_stm32::peripherals::I2C1;
use node_core::slave::SlavePeripheral;

use super::{I2C_TIMINGR, I2C1_AF, OWN_ADDRESS, SCL_PIN, SDA_PIN, isr, status_flags};
use crate::runtime::SLAVE;

const CR1_PE: u32 = 1 << 0;
const CR1_TXIE: u32 = 1 << 1;
const CR1_RXIE: u32 = 1 << 2;
const CR1_ADDRIE: u32 = 1 << 3;
const CR1_NACKIE: u32 = 1 << 4;
const CR1_STOPIE: u32 = 1 << 5;
const CR1_ERRIE: u32 = 1 << 7;
const CR1_INTERRUPTS: u32 = CR1_TXIE | CR1_RXIE | CR1_ADDRIE | CR1_NACKIE | CR1_STOPIE | CR1_ERRIE;

const OAR1_OA1EN: u32 = 1 << 15;

const ICR_ALL: u32 = 0x3F38;
const ICR_ADDRCF: u32 = 1 << 3;
const ICR_NACKCF: u32 = 1 << 4;
const ICR_STOPCF: u32 = 1 << 5;

const MODE_ALTERNATE: u32 = 0b10;

/// Priority shared with the tick executor so only one interrupt level exists.
pub const BUS_PRIORITY: Priority = Priority::P1;

/// Vendor-call implementation for I2C1.
pub struct I2cSlave {
    _peripheral: Peri<'static, I2C1>,
}

impl I2cSlave {
    #[must_use]
    pub fn new(peripheral: Peri<'static, I2C1>) -> Self {
        pac::RCC.apbenr1().modify(|w| w.set_i2c1en(true));
        Self {
            _peripheral: peripheral,
        }
    }
}

impl SlavePeripheral for I2cSlave {
    fn stop(&mut self) {
        interrupt::I2C1.disable();
        pac::I2C1.cr1().modify(|w| w.0 &= !(CR1_PE | CR1_INTERRUPTS));
    }

    fn create(&mut self) {
        let gpio = pac::GPIOB;
        gpio.afr(0).modify(|w| {
            let mask = (0xF << (SCL_PIN * 4)) | (0xF << (SDA_PIN * 4));
            w.0 = (w.0 & !mask)
                | (I2C1_AF << (SCL_PIN * 4))
                | (I2C1_AF << (SDA_PIN * 4));
        });
        gpio.otyper().modify(|w| w.0 |= (1 << SCL_PIN) | (1 << SDA_PIN));
        gpio.moder().modify(|w| {
            let mask = (0b11 << (SCL_PIN * 2)) | (0b11 << (SDA_PIN * 2));
            w.0 = (w.0 & !mask)
                | (MODE_ALTERNATE << (SCL_PIN * 2))
                | (MODE_ALTERNATE << (SDA_PIN * 2));
        });

        let regs = pac::I2C1;
        regs.timingr().write_value(pac::i2c::regs::Timingr(I2C_TIMINGR));
        regs.oar1().write_value(pac::i2c::regs::Oar1(0));
        regs.oar1()
            .write_value(pac::i2c::regs::Oar1(OAR1_OA1EN | (u32::from(OWN_ADDRESS) << 1)));
    }

    fn start(&mut self) {
        pac::I2C1.cr1().modify(|w| w.0 |= CR1_PE);
    }

    fn rearm_slave_receive(&mut self) {
        let regs = pac::I2C1;
        regs.icr().write_value(pac::i2c::regs::Icr(ICR_ALL));
        regs.cr1().modify(|w| w.0 |= CR1_INTERRUPTS);

        interrupt::I2C1.set_priority(BUS_PRIORITY);
        interrupt::I2C1.unpend();
        unsafe { interrupt::I2C1.enable() };
    }
}

/// Translates one I2C1 interrupt into slave engine callbacks.
pub fn on_interrupt() {
    let regs = pac::I2C1;
    let isr_bits = regs.isr().read().0;
    let flags = status_flags(isr_bits);

    let handled = SLAVE.with(|engine| {
        if isr_bits & isr::ERRORS != 0 {
            regs.icr().write_value(pac::i2c::regs::Icr(isr_bits & isr::ERRORS));
            engine.on_error(flags);
            return;
        }

        if isr_bits & isr::ADDR != 0 {
            regs.icr().write_value(pac::i2c::regs::Icr(ICR_ADDRCF));
            if isr_bits & isr::DIR == 0 {
                engine.on_start(flags);
            } else {
                // Repeated start into a read: close the written frame first.
                if engine.is_receiving() {
                    engine.on_stop(flags);
                }
                regs.isr().modify(|w| w.0 |= isr::TXE);
            }
        }

        if isr_bits & isr::RXNE != 0 {
            // Reading RXDR clears RXNE.
            #[allow(clippy::cast_possible_truncation)]
            let byte = regs.rxdr().read().0 as u8;
            engine.on_byte(byte);
        }

        if isr_bits & isr::TXIS != 0 {
            let byte = engine.on_read_request();
            regs.txdr().write_value(pac::i2c::regs::Txdr(u32::from(byte)));
        }

        if isr_bits & isr::NACKF != 0 {
            // The master NACKs the last byte it reads; that ends a read.
            regs.icr().write_value(pac::i2c::regs::Icr(ICR_NACKCF));
        }

        if isr_bits & isr::STOPF != 0 {
            regs.icr().write_value(pac::i2c::regs::Icr(ICR_STOPCF));
            let read_transfer = isr_bits & isr::DIR != 0;
            if !read_transfer || engine.is_receiving() {
                engine.on_stop(flags);
            }
        }
    });

    if handled.is_none() {
        // Engine not installed yet: quiesce the peripheral.
        regs.cr1().modify(|w| w.0 &= !CR1_INTERRUPTS);
        regs.icr().write_value(pac::i2c::regs::Icr(ICR_ALL));
    }
}

#[interrupt]
fn I2C1() {
    on_interrupt();
}
