//! Pin-level bus drivers for the filter core
//!
//! - [`spi`]: configuration bus, harness to device
//! - [`i2s`]: duplex audio bus, clocked by the device

pub mod i2s;
pub mod pins;
pub mod spi;

pub use i2s::{I2sReceiver, I2sSender, SerialAudioBus};
pub use pins::{AudioBusPins, ConfigBusPins, DutPins, SystemPins};
pub use spi::SerialConfigBus;

use crate::error::{HarnessError, Result};
use crate::sim::{SimDuration, SimTime};

/// Checks that successive edges of a bus clock are exactly one period apart.
#[derive(Debug, Clone)]
struct EdgeSpacing {
    bus: &'static str,
    period: SimDuration,
    last: Option<SimTime>,
}

impl EdgeSpacing {
    fn new(bus: &'static str, period: SimDuration) -> Self {
        Self {
            bus,
            period,
            last: None,
        }
    }

    fn check(&mut self, at: SimTime) -> Result<()> {
        if let Some(last) = self.last {
            let expected = last + self.period;
            if at != expected {
                return Err(HarnessError::ProtocolTiming {
                    bus: self.bus,
                    expected,
                    observed: at,
                });
            }
        }
        self.last = Some(at);
        Ok(())
    }
}
