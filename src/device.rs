//! Seam between the harness and a device implementation
//!
//! A [`Device`] is evaluated once per rising edge of the main clock, the
//! way an HDL co-simulation binding or a behavioural model would be. It
//! sees the pins through [`DeviceIo`]: harness-driven inputs can only be
//! read, device-driven outputs only written.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::DutPins;
use crate::sim::{JoinHandle, Sim, SimTime};

pub trait Device {
    /// Called on every rising edge of `clk`.
    fn clock_edge(&mut self, io: &mut DeviceIo<'_>);
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn clock_edge(&mut self, io: &mut DeviceIo<'_>) {
        (**self).clock_edge(io)
    }
}

/// Shared devices let a test inspect state after the run.
impl<D: Device> Device for Rc<RefCell<D>> {
    fn clock_edge(&mut self, io: &mut DeviceIo<'_>) {
        self.borrow_mut().clock_edge(io)
    }
}

/// Typed pin access for one evaluation.
pub struct DeviceIo<'a> {
    sim: &'a Sim,
    pins: &'a DutPins,
}

impl DeviceIo<'_> {
    pub fn now(&self) -> SimTime {
        self.sim.now()
    }

    /// `rst_n` level (reset is active low).
    pub fn rst_n(&self) -> bool {
        self.sim.get_bit(self.pins.system.rst_n)
    }

    pub fn spi_cs_n(&self) -> bool {
        self.sim.get_bit(self.pins.config.cs_n)
    }

    pub fn spi_sclk(&self) -> bool {
        self.sim.get_bit(self.pins.config.sclk)
    }

    pub fn spi_mosi(&self) -> bool {
        self.sim.get_bit(self.pins.config.mosi)
    }

    pub fn i2s_din(&self) -> bool {
        self.sim.get_bit(self.pins.audio.din)
    }

    pub fn set_i2s_mclk(&mut self, level: bool) {
        self.sim.set_bit(self.pins.audio.mclk, level);
    }

    pub fn set_i2s_bclk(&mut self, level: bool) {
        self.sim.set_bit(self.pins.audio.bclk, level);
    }

    pub fn set_i2s_lrclk(&mut self, level: bool) {
        self.sim.set_bit(self.pins.audio.lrclk, level);
    }

    pub fn set_i2s_dout(&mut self, level: bool) {
        self.sim.set_bit(self.pins.audio.dout, level);
    }
}

/// Spawns the task evaluating `device` on every main-clock rising edge.
pub fn attach<D: Device + 'static>(sim: &Sim, pins: DutPins, device: D) -> JoinHandle<()> {
    sim.spawn(evaluate(sim.clone(), pins, device))
}

async fn evaluate<D: Device>(sim: Sim, pins: DutPins, mut device: D) {
    loop {
        sim.rising_edge(pins.system.clk).await;
        let mut io = DeviceIo {
            sim: &sim,
            pins: &pins,
        };
        device.clock_edge(&mut io);
    }
}
