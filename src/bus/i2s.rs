//! Audio bus (I2S, 24-bit words, left slot only)
//!
//! The device drives the master, bit and frame clocks. Each frame starts
//! with a rising frame clock that coincides with a falling bit-clock edge;
//! data lags it by one bit, is sent MSB first, changes on falling edges and
//! is sampled on rising edges. Only the high phase of the frame clock
//! carries data.

use log::trace;

use super::EdgeSpacing;
use super::pins::AudioBusPins;
use crate::constants::FRAME_BITS;
use crate::error::{HarnessError, Result};
use crate::filter::SampleFrame;
use crate::sim::{Sim, SimDuration};

/// Duplex audio bus. Split it to run sending and receiving as separate
/// tasks.
pub struct SerialAudioBus {
    sender: I2sSender,
    receiver: I2sReceiver,
}

impl SerialAudioBus {
    /// `bit_period` is the bit-clock period every edge is checked against.
    pub fn new(sim: &Sim, pins: AudioBusPins, bit_period: SimDuration) -> Self {
        Self {
            sender: I2sSender {
                sim: sim.clone(),
                pins,
                bit_period,
            },
            receiver: I2sReceiver {
                sim: sim.clone(),
                pins,
                bit_period,
            },
        }
    }

    pub fn split(self) -> (I2sSender, I2sReceiver) {
        (self.sender, self.receiver)
    }
}

/// Drives `i2s_din`.
#[derive(Clone)]
pub struct I2sSender {
    sim: Sim,
    pins: AudioBusPins,
    bit_period: SimDuration,
}

impl I2sSender {
    /// Sends one sample in the next frame.
    ///
    /// # Errors
    /// `ProtocolTiming` if falling bit-clock edges are not one bit period
    /// apart, `FrameSync` if the frame clock dropped before the word ended.
    pub async fn send(&self, frame: SampleFrame) -> Result<()> {
        let sim = &self.sim;
        let pins = self.pins;
        let mut spacing = EdgeSpacing::new("i2s_din", self.bit_period);
        let bits = frame.to_bits();

        let start = sim.rising_edge(pins.lrclk).await;
        trace!("I2S tx: frame at {}: {}", start, frame);

        for bit in (0..FRAME_BITS).rev() {
            let at = sim.falling_edge(pins.bclk).await;
            spacing.check(at)?;
            sim.set_bit(pins.din, (bits >> bit) & 1 == 1);
        }

        let at = sim.falling_edge(pins.bclk).await;
        spacing.check(at)?;
        sim.set_bit(pins.din, false);

        if !sim.get_bit(pins.lrclk) {
            return Err(HarnessError::FrameSync {
                bus: "i2s_din",
                bit: FRAME_BITS,
                at,
            });
        }
        Ok(())
    }

    /// Sends `frames` in consecutive frames.
    pub async fn send_all(&self, frames: &[SampleFrame]) -> Result<()> {
        for &frame in frames {
            self.send(frame).await?;
        }
        Ok(())
    }
}

/// Samples `i2s_dout`.
#[derive(Clone)]
pub struct I2sReceiver {
    sim: Sim,
    pins: AudioBusPins,
    bit_period: SimDuration,
}

impl I2sReceiver {
    /// Receives the sample carried by the next frame.
    ///
    /// # Errors
    /// `ProtocolTiming` if rising bit-clock edges are not one bit period
    /// apart, `FrameSync` if the frame clock is low after the last bit.
    pub async fn receive(&self) -> Result<SampleFrame> {
        let sim = &self.sim;
        let pins = self.pins;
        let mut spacing = EdgeSpacing::new("i2s_dout", self.bit_period);

        let start = sim.rising_edge(pins.lrclk).await;

        // first rising edge is the one-bit delay slot
        let at = sim.rising_edge(pins.bclk).await;
        spacing.check(at)?;

        let mut word = 0u32;
        for _ in 0..FRAME_BITS {
            let at = sim.rising_edge(pins.bclk).await;
            spacing.check(at)?;
            word = (word << 1) | u32::from(sim.get_bit(pins.dout));
        }

        if !sim.get_bit(pins.lrclk) {
            return Err(HarnessError::FrameSync {
                bus: "i2s_dout",
                bit: FRAME_BITS,
                at: sim.now(),
            });
        }

        let frame = SampleFrame::from_bits(word);
        trace!("I2S rx: frame at {}: {}", start, frame);
        Ok(frame)
    }

    /// Receives `count` consecutive frames.
    pub async fn receive_n(&self, count: usize) -> Result<Vec<SampleFrame>> {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.receive().await?);
        }
        Ok(frames)
    }
}
