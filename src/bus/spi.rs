//! Configuration bus master
//!
//! Mode-0 style transfer: the harness asserts chip select on a rising serial
//! clock edge, changes MOSI on every falling edge (MSB of each byte first)
//! and releases chip select one falling edge after the last bit. The device
//! samples MOSI on rising edges.

use log::{debug, trace};

use super::EdgeSpacing;
use super::pins::ConfigBusPins;
use crate::error::Result;
use crate::sim::{Clock, JoinHandle, Sim, SimDuration};

pub struct SerialConfigBus {
    sim: Sim,
    pins: ConfigBusPins,
    period: SimDuration,
    _clock: Option<JoinHandle<()>>,
}

impl SerialConfigBus {
    /// Creates the bus and starts its free-running serial clock.
    pub fn new(sim: &Sim, pins: ConfigBusPins, period: SimDuration) -> Self {
        let clock = Clock::new(pins.sclk, period).start(sim);
        Self {
            sim: sim.clone(),
            pins,
            period,
            _clock: Some(clock),
        }
    }

    /// Creates the bus on a serial clock driven by someone else, checking
    /// its edges against `period`.
    pub fn on_external_clock(sim: &Sim, pins: ConfigBusPins, period: SimDuration) -> Self {
        Self {
            sim: sim.clone(),
            pins,
            period,
            _clock: None,
        }
    }

    pub fn period(&self) -> SimDuration {
        self.period
    }

    /// Shifts `bytes` out in order, each MSB first, inside one chip-select
    /// window.
    ///
    /// # Errors
    /// `ProtocolTiming` if two falling serial-clock edges are not exactly one
    /// period apart. Chip select is left asserted in that case.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        let sim = &self.sim;
        let pins = self.pins;
        let mut spacing = EdgeSpacing::new("spi_sclk", self.period);

        let start = sim.rising_edge(pins.sclk).await;
        sim.set_bit(pins.cs_n, false);
        debug!("SPI: cs asserted at {}, {} bytes", start, bytes.len());

        for (index, &byte) in bytes.iter().enumerate() {
            trace!("SPI: byte {} = 0x{:02X}", index, byte);
            for bit in (0..8).rev() {
                let at = sim.falling_edge(pins.sclk).await;
                spacing.check(at)?;
                sim.set_bit(pins.mosi, (byte >> bit) & 1 == 1);
            }
        }

        let at = sim.falling_edge(pins.sclk).await;
        spacing.check(at)?;
        sim.set_bit(pins.cs_n, true);
        sim.set_bit(pins.mosi, false);
        debug!("SPI: cs released at {}", at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::bus::DutPins;
    use crate::error::HarnessError;
    use crate::sim::Simulator;

    /// Collects bytes sampled on rising sclk while cs is low.
    fn spawn_listener(sim: &Sim, pins: ConfigBusPins) -> Rc<RefCell<Vec<u8>>> {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        let sim = sim.clone();
        sim.clone().spawn(async move {
            sim.falling_edge(pins.cs_n).await;
            let mut shift = 0u8;
            let mut count = 0;
            loop {
                sim.rising_edge(pins.sclk).await;
                if sim.get_bit(pins.cs_n) {
                    break;
                }
                shift = (shift << 1) | u8::from(sim.get_bit(pins.mosi));
                count += 1;
                if count == 8 {
                    sink.borrow_mut().push(shift);
                    count = 0;
                }
            }
        });
        received
    }

    #[test]
    fn test_bytes_are_shifted_msb_first() {
        let simulator = Simulator::new();
        let sim = simulator.handle();
        let pins = DutPins::declare(&sim).config;
        let received = spawn_listener(&sim, pins);

        let bus = SerialConfigBus::new(&sim, pins, SimDuration::from_us(1));
        let probe = sim.clone();
        let end = simulator
            .run(
                async move {
                    bus.send(&[0xA5, 0x3C, 0x01]).await?;
                    Ok::<_, HarnessError>(probe.now())
                },
                SimDuration::from_ms(1),
            )
            .unwrap()
            .unwrap();

        assert_eq!(*received.borrow(), vec![0xA5, 0x3C, 0x01]);
        assert!(sim.get_bit(pins.cs_n));
        // the clock rises at t=0 before send starts waiting, so cs goes low at
        // 1 us; 24 data edges and the release edge follow at 1.5 us + k us
        assert_eq!(end.as_ps(), 25 * 1_000_000 + 500_000);
    }

    #[test]
    fn test_wrong_clock_period_is_rejected() {
        let simulator = Simulator::new();
        let sim = simulator.handle();
        let pins = DutPins::declare(&sim).config;
        Clock::new(pins.sclk, SimDuration::from_us(2)).start(&sim);

        let bus = SerialConfigBus::on_external_clock(&sim, pins, SimDuration::from_us(1));
        let result = simulator
            .run(async move { bus.send(&[0xFF]).await }, SimDuration::from_ms(1))
            .unwrap();

        assert!(matches!(
            result,
            Err(HarnessError::ProtocolTiming { bus: "spi_sclk", .. })
        ));
    }
}
