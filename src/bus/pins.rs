use crate::sim::{SignalId, Sim};

/// Main clock and active-low reset, driven by the harness.
#[derive(Debug, Clone, Copy)]
pub struct SystemPins {
    pub clk: SignalId,
    pub rst_n: SignalId,
}

/// Configuration bus, driven by the harness.
#[derive(Debug, Clone, Copy)]
pub struct ConfigBusPins {
    pub cs_n: SignalId,
    pub sclk: SignalId,
    pub mosi: SignalId,
}

/// Audio bus. The clocks and `dout` are driven by the device, `din` by the
/// harness.
#[derive(Debug, Clone, Copy)]
pub struct AudioBusPins {
    pub mclk: SignalId,
    pub bclk: SignalId,
    pub lrclk: SignalId,
    pub din: SignalId,
    pub dout: SignalId,
}

/// Every pin of the filter core.
#[derive(Debug, Clone, Copy)]
pub struct DutPins {
    pub system: SystemPins,
    pub config: ConfigBusPins,
    pub audio: AudioBusPins,
}

impl DutPins {
    /// Declares all pins on `sim` at their idle levels: reset and chip
    /// select deasserted, everything else low.
    pub fn declare(sim: &Sim) -> Self {
        Self {
            system: SystemPins {
                clk: sim.signal("clk", 1, 0),
                rst_n: sim.signal("rst_n", 1, 1),
            },
            config: ConfigBusPins {
                cs_n: sim.signal("spi_cs_n", 1, 1),
                sclk: sim.signal("spi_sclk", 1, 0),
                mosi: sim.signal("spi_mosi", 1, 0),
            },
            audio: AudioBusPins {
                mclk: sim.signal("i2s_mclk", 1, 0),
                bclk: sim.signal("i2s_bclk", 1, 0),
                lrclk: sim.signal("i2s_lrclk", 1, 0),
                din: sim.signal("i2s_din", 1, 0),
                dout: sim.signal("i2s_dout", 1, 0),
            },
        }
    }
}
