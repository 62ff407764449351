//! Direct GPIOB access for bit-banging PB6/PB7.
//!
//! A released line is an input and floats high on the pull-up. A driven line
//! is an open-drain output with ODR cleared. The pins are handed back to the
//! I2C1 alternate function by restoring the snapshot taken on claim.

#![cfg(target_os = "none")]

use embassy_stm32::Peri;
use embassy_stm32::pac;
use embassy_stm32::peripherals::{PB6, PB7};
use node_core::master::{BusLines, Line};

use super::{SCL_PIN, SDA_PIN};

const MODE_INPUT: u32 = 0b00;
const MODE_OUTPUT: u32 = 0b01;
const PULL_UP: u32 = 0b01;

const PINS_1BIT: u32 = (1 << SCL_PIN) | (1 << SDA_PIN);
const PINS_2BIT: u32 = (0b11 << (SCL_PIN * 2)) | (0b11 << (SDA_PIN * 2));

/// GPIOB state of the two bus pins, captured before bit-banging.
#[derive(Copy, Clone, Debug, defmt::Format)]
pub struct PinSnapshot {
    moder: u32,
    otyper: u32,
    pupdr: u32,
    odr: u32,
}

/// Owner of PB6/PB7 while the master needs them.
pub struct BoardLines {
    _scl: Peri<'static, PB6>,
    _sda: Peri<'static, PB7>,
}

impl BoardLines {
    #[must_use]
    pub fn new(scl: Peri<'static, PB6>, sda: Peri<'static, PB7>) -> Self {
        Self { _scl: scl, _sda: sda }
    }
}

const fn pin(line: Line) -> u32 {
    match line {
        Line::Scl => SCL_PIN,
        Line::Sda => SDA_PIN,
    }
}

fn set_mode(pin: u32, mode: u32) {
    let shift = pin * 2;
    pac::GPIOB
        .moder()
        .modify(|w| w.0 = (w.0 & !(0b11 << shift)) | (mode << shift));
}

impl BusLines for BoardLines {
    type Snapshot = PinSnapshot;

    fn claim(&mut self) -> PinSnapshot {
        let gpio = pac::GPIOB;
        let snapshot = PinSnapshot {
            moder: gpio.moder().read().0,
            otyper: gpio.otyper().read().0,
            pupdr: gpio.pupdr().read().0,
            odr: gpio.odr().read().0,
        };

        let pull_ups = (PULL_UP << (SCL_PIN * 2)) | (PULL_UP << (SDA_PIN * 2));
        gpio.pupdr().modify(|w| w.0 = (w.0 & !PINS_2BIT) | pull_ups);
        gpio.otyper().modify(|w| w.0 |= PINS_1BIT);
        gpio.odr().modify(|w| w.0 |= PINS_1BIT);
        gpio.moder().modify(|w| w.0 &= !PINS_2BIT);

        snapshot
    }

    fn restore(&mut self, snapshot: PinSnapshot) {
        let gpio = pac::GPIOB;
        gpio.pupdr()
            .modify(|w| w.0 = (w.0 & !PINS_2BIT) | (snapshot.pupdr & PINS_2BIT));
        gpio.odr()
            .modify(|w| w.0 = (w.0 & !PINS_1BIT) | (snapshot.odr & PINS_1BIT));
        gpio.otyper()
            .modify(|w| w.0 = (w.0 & !PINS_1BIT) | (snapshot.otyper & PINS_1BIT));
        gpio.moder()
            .modify(|w| w.0 = (w.0 & !PINS_2BIT) | (snapshot.moder & PINS_2BIT));
    }

    fn release(&mut self, line: Line) {
        set_mode(pin(line), MODE_INPUT);
    }

    fn drive_low(&mut self, line: Line) {
        let pin = pin(line);
        pac::GPIOB.odr().modify(|w| w.0 &= !(1 << pin));
        set_mode(pin, MODE_OUTPUT);
    }

    fn is_high(&mut self, line: Line) -> bool {
        pac::GPIOB.idr().read().0 & (1 << pin(line)) != 0
    }
}
