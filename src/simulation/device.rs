//! Cycle-based behavioural model of the filter core
//!
//! Evaluated on every main-clock rising edge. Everything is derived from a
//! single tick counter that restarts on reset and whenever a new
//! configuration is applied:
//!
//! - master clock: `2 << clock_select` ticks per period
//! - bit clock: 4 master periods
//! - frame clock: 64 bit periods, rising together with a falling bit clock
//!
//! The datapath is a plain direct-form MAC over the expanded impulse
//! response, independent of the folded reference model, followed by an
//! output FIFO that sets the latency in frames.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::constants::{BIT_CLOCK_RATIO, FRAME_BITS, FRAME_CLOCK_RATIO, master_divider};
use crate::device::{Device, DeviceIo};
use crate::filter::{ConfigurationEncoder, FilterConfiguration, FilterFormat};

/// Deliberate defects, for checking that the harness catches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Fault {
    /// Accumulator wraps to the tap width instead of saturating
    WrapOnOverflow,
    /// Frame clock is 32 bit clocks instead of 64
    ShortFrame,
    /// Bit clock is 2 master clocks instead of 4
    FastBitClock,
    /// Output data LSB stuck high
    StuckOutputBit,
    /// Symmetry flag ignored, response always mirrored with the same sign
    IgnoreSymmetry,
}

#[derive(Debug, Default)]
struct SpiState {
    active: bool,
    last_sclk: bool,
    bits: Vec<bool>,
}

#[derive(Debug, Default)]
struct I2sState {
    last_bclk: bool,
    last_lrclk: bool,
    in_frame: bool,
    falls: u32,
    rises: u32,
    rx_word: u32,
    tx_word: u32,
}

/// Behavioural filter core with a fixed coefficient count and formats.
pub struct BehavioralFir {
    format: FilterFormat,
    encoder: ConfigurationEncoder,
    latency: usize,
    faults: Vec<Fault>,

    clock_select: u8,
    symmetric: bool,
    coefficients: Vec<i64>,
    impulse: Vec<i64>,
    applied: Vec<FilterConfiguration>,
    rejected_transfers: usize,

    tick: u64,
    taps: VecDeque<i64>,
    fifo: VecDeque<u32>,
    spi: SpiState,
    i2s: I2sState,
}

impl BehavioralFir {
    /// Core accepting `n_coeffs` coefficients in `format.coefficient()`.
    /// Out of reset it runs with `clock_select = 0` and all-zero
    /// coefficients.
    pub fn new(format: FilterFormat, n_coeffs: usize) -> Self {
        let n_coeffs = n_coeffs.max(1);
        let mut device = Self {
            format,
            encoder: ConfigurationEncoder::new(format.coefficient(), n_coeffs),
            latency: 1,
            faults: Vec::new(),
            clock_select: 0,
            symmetric: true,
            coefficients: vec![0; n_coeffs],
            impulse: Vec::new(),
            applied: Vec::new(),
            rejected_transfers: 0,
            tick: 0,
            taps: VecDeque::new(),
            fifo: VecDeque::new(),
            spi: SpiState::default(),
            i2s: I2sState::default(),
        };
        device.expand_impulse();
        device.restart();
        device
    }

    /// Frames between an input and its output on the bus (at least 1).
    pub fn with_latency(mut self, latency: usize) -> Self {
        self.latency = latency.max(1);
        self.restart();
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self.expand_impulse();
        self
    }

    pub fn latency(&self) -> usize {
        self.latency
    }

    /// Configuration applied by the last complete transfer.
    pub fn active_configuration(&self) -> Option<&FilterConfiguration> {
        self.applied.last()
    }

    /// Every configuration applied so far, oldest first.
    pub fn applied_configurations(&self) -> &[FilterConfiguration] {
        &self.applied
    }

    /// Transfers ignored because of a wrong length or an undecodable field.
    pub fn rejected_transfers(&self) -> usize {
        self.rejected_transfers
    }

    fn has_fault(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn n_taps(&self) -> usize {
        2 * self.coefficients.len() - 1
    }

    fn expand_impulse(&mut self) {
        let sign = if self.symmetric || self.has_fault(Fault::IgnoreSymmetry) {
            1
        } else {
            -1
        };
        let (centre, half) = match self.coefficients.split_last() {
            Some(split) => split,
            None => return,
        };
        let mut impulse = half.to_vec();
        impulse.push(*centre);
        impulse.extend(half.iter().rev().map(|&c| sign * c));
        self.impulse = impulse;
    }

    /// Clears the datapath and restarts all derived clocks.
    fn restart(&mut self) {
        self.tick = 0;
        self.taps = VecDeque::from(vec![0; self.n_taps()]);
        self.fifo = VecDeque::from(vec![0; self.latency]);
        self.i2s = I2sState::default();
    }

    fn reset(&mut self, io: &mut DeviceIo<'_>) {
        self.restart();
        self.spi = SpiState::default();
        io.set_i2s_mclk(false);
        io.set_i2s_bclk(false);
        io.set_i2s_lrclk(false);
        io.set_i2s_dout(false);
    }

    fn sample_spi(&mut self, io: &DeviceIo<'_>) {
        let sclk = io.spi_sclk();
        if io.spi_cs_n() {
            if self.spi.active {
                self.spi.active = false;
                self.finish_transfer();
            }
        } else if !self.spi.active {
            // the edge that saw chip select go low carries no data
            self.spi.active = true;
            self.spi.bits.clear();
        } else if sclk && !self.spi.last_sclk {
            self.spi.bits.push(io.spi_mosi());
        }
        self.spi.last_sclk = sclk;
    }

    fn finish_transfer(&mut self) {
        let bits = std::mem::take(&mut self.spi.bits);
        let expected = self.encoder.byte_len() * 8;
        if bits.len() != expected {
            warn!(
                "DUT: ignoring configuration transfer of {} bits (expected {})",
                bits.len(),
                expected
            );
            self.rejected_transfers += 1;
            return;
        }

        let bytes: Vec<u8> = bits
            .chunks(8)
            .map(|byte| byte.iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
            .collect();
        match self.encoder.decode(&bytes) {
            Ok(configuration) => self.apply(configuration),
            Err(e) => {
                warn!("DUT: ignoring configuration transfer: {}", e);
                self.rejected_transfers += 1;
            }
        }
    }

    fn apply(&mut self, configuration: FilterConfiguration) {
        debug!("DUT: applying {}", configuration);
        self.clock_select = configuration.clock_select().value();
        self.symmetric = configuration.symmetric();
        self.coefficients = configuration.coefficients().iter().map(|c| c.raw()).collect();
        self.expand_impulse();
        self.restart();
        self.applied.push(configuration);
    }

    fn step_clocks(&mut self, io: &mut DeviceIo<'_>) {
        let master = master_divider(self.clock_select);
        let bit_ratio = if self.has_fault(Fault::FastBitClock) {
            BIT_CLOCK_RATIO / 2
        } else {
            BIT_CLOCK_RATIO
        };
        let frame_ratio = if self.has_fault(Fault::ShortFrame) {
            FRAME_CLOCK_RATIO / 2
        } else {
            FRAME_CLOCK_RATIO
        };
        let bit = master * bit_ratio;
        let frame = bit * frame_ratio;

        let mclk = level(self.tick, master / 2);
        let bclk = level(self.tick, bit / 2);
        let lrclk = level(self.tick, frame / 2);
        self.tick += 1;

        let bclk_rise = bclk && !self.i2s.last_bclk;
        let bclk_fall = !bclk && self.i2s.last_bclk;
        let lrclk_rise = lrclk && !self.i2s.last_lrclk;
        self.i2s.last_bclk = bclk;
        self.i2s.last_lrclk = lrclk;

        // the bit edge coinciding with a frame start still belongs to the
        // previous frame
        if bclk_fall {
            self.bit_clock_fall(io);
        }
        if bclk_rise {
            self.bit_clock_rise(io);
        }
        if lrclk_rise {
            self.start_frame();
        }

        io.set_i2s_mclk(mclk);
        io.set_i2s_bclk(bclk);
        io.set_i2s_lrclk(lrclk);
    }

    fn start_frame(&mut self) {
        self.i2s.in_frame = true;
        self.i2s.falls = 0;
        self.i2s.rises = 0;
        self.i2s.rx_word = 0;
        self.i2s.tx_word = self.fifo.pop_front().unwrap_or(0);
    }

    fn bit_clock_fall(&mut self, io: &mut DeviceIo<'_>) {
        if !self.i2s.in_frame {
            return;
        }
        self.i2s.falls += 1;
        let k = self.i2s.falls;
        if k <= FRAME_BITS {
            let mut bit = (self.i2s.tx_word >> (FRAME_BITS - k)) & 1 == 1;
            if k == FRAME_BITS && self.has_fault(Fault::StuckOutputBit) {
                bit = true;
            }
            io.set_i2s_dout(bit);
        } else if k == FRAME_BITS + 1 {
            io.set_i2s_dout(false);
        }
    }

    fn bit_clock_rise(&mut self, io: &DeviceIo<'_>) {
        if !self.i2s.in_frame {
            return;
        }
        self.i2s.rises += 1;
        let k = self.i2s.rises;
        // rise 1 is the one-bit delay slot
        if (2..=FRAME_BITS + 1).contains(&k) {
            self.i2s.rx_word = (self.i2s.rx_word << 1) | u32::from(io.i2s_din());
            if k == FRAME_BITS + 1 {
                self.i2s.in_frame = false;
                let output = self.filter(self.i2s.rx_word);
                self.fifo.push_back(output);
            }
        }
    }

    /// One filter step on a received 24-bit word; returns the output word.
    fn filter(&mut self, word: u32) -> u32 {
        let tap = self.format.tap();
        let coefficient = self.format.coefficient();
        let sample_frac = FRAME_BITS - 1;
        let shift = sample_frac - tap.frac_bits();

        let acc: i128 = self
            .impulse
            .iter()
            .zip(self.taps.iter())
            .map(|(&h, &x)| i128::from(h) * i128::from(x))
            .sum();
        let scaled = acc >> coefficient.frac_bits();
        let y = if self.has_fault(Fault::WrapOnOverflow) {
            let unused = 128 - tap.word_bits();
            (scaled << unused) >> unused
        } else {
            scaled.clamp(i128::from(tap.min_raw()), i128::from(tap.max_raw()))
        };

        let x = sign_extend(word) >> shift;
        self.taps.pop_back();
        self.taps.push_front(x);

        ((y << shift) as i64 as u32) & ((1 << FRAME_BITS) - 1)
    }
}

impl Device for BehavioralFir {
    fn clock_edge(&mut self, io: &mut DeviceIo<'_>) {
        if !io.rst_n() {
            self.reset(io);
            return;
        }
        let configured = self.applied.len();
        self.sample_spi(io);
        if self.applied.len() != configured {
            // clocks restart from low
            io.set_i2s_dout(false);
        }
        self.step_clocks(io);
    }
}

fn level(tick: u64, half_period: u64) -> bool {
    (tick / half_period.max(1)) % 2 == 1
}

fn sign_extend(word: u32) -> i64 {
    i64::from(((word << (32 - FRAME_BITS)) as i32) >> (32 - FRAME_BITS))
}
