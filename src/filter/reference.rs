//! Bit-exact golden model of the filter core
//!
//! Uses the folded (linear-phase) structure of the hardware: each pair of
//! taps mirrored around the centre is added (or subtracted, for an
//! antisymmetric response) before a single multiply. The accumulator is
//! wide enough that nothing is lost until the final floor to tap precision.

use crate::error::Result;
use crate::filter::configuration::{FilterConfiguration, FilterFormat};
use crate::filter::sample::SampleFrame;
use crate::fixed::{Fixed, QFormat};

/// Ring buffer of past samples at tap precision. Index 0 is the newest.
#[derive(Debug, Clone)]
pub struct TapDelayLine {
    delay_line: Vec<Fixed>,
    pos: usize,
}

impl TapDelayLine {
    pub fn new(len: usize, format: QFormat) -> Self {
        Self {
            delay_line: vec![Fixed::zero(format); len.max(1)],
            pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.delay_line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delay_line.is_empty()
    }

    /// Sample pushed `index` steps ago.
    pub fn get(&self, index: usize) -> Fixed {
        self.delay_line[(self.pos + index) % self.delay_line.len()]
    }

    /// Makes `sample` the newest entry, dropping the oldest.
    pub fn push(&mut self, sample: Fixed) {
        self.pos = if self.pos == 0 {
            self.delay_line.len() - 1
        } else {
            self.pos - 1
        };
        self.delay_line[self.pos] = sample;
    }

    pub fn clear(&mut self) {
        for tap in self.delay_line.iter_mut() {
            *tap = Fixed::zero(tap.format());
        }
        self.pos = 0;
    }

    /// Newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = Fixed> + '_ {
        (0..self.len()).map(|index| self.get(index))
    }
}

/// Golden model of the configured filter. Produces one output per input,
/// computed from the taps *before* the input is shifted in.
#[derive(Debug, Clone)]
pub struct FirReferenceModel {
    configuration: FilterConfiguration,
    tap_format: QFormat,
    accumulator: QFormat,
    taps: TapDelayLine,
}

impl FirReferenceModel {
    pub fn new(configuration: &FilterConfiguration, format: FilterFormat) -> Result<Self> {
        let tap_format = format.tap();
        let coefficient = configuration.coefficient_format();

        // one bit for the pre-add, then enough guard bits for n_coeffs
        // products plus sign headroom
        let product_bits = tap_format.word_bits() + 1 + coefficient.word_bits();
        let n = configuration.n_coeffs();
        let guard_bits = usize::BITS - (n - 1).leading_zeros() + 1;
        let accumulator = QFormat::signed(
            product_bits + guard_bits,
            tap_format.frac_bits() + coefficient.frac_bits(),
        )?;

        Ok(Self {
            configuration: configuration.clone(),
            tap_format,
            accumulator,
            taps: TapDelayLine::new(configuration.n_taps(), tap_format),
        })
    }

    pub fn configuration(&self) -> &FilterConfiguration {
        &self.configuration
    }

    pub fn accumulator_format(&self) -> QFormat {
        self.accumulator
    }

    pub fn taps(&self) -> &TapDelayLine {
        &self.taps
    }

    /// Consumes one input sample and returns the filter output for this step.
    pub fn process(&mut self, input: SampleFrame) -> Result<SampleFrame> {
        let coefficients = self.configuration.coefficients();
        let n = self.taps.len();
        let centre = coefficients.len() - 1;

        let mut acc = Fixed::zero(self.accumulator);
        for (i, coefficient) in coefficients[..centre].iter().enumerate() {
            let near = self.taps.get(i);
            let far = self.taps.get(n - 1 - i);
            let pair = if self.configuration.symmetric() {
                near.add(&far)?
            } else {
                near.sub(&far)?
            };
            acc = acc.add(&pair.mul(coefficient)?)?.resize(self.accumulator)?;
        }
        let middle = self.taps.get(n / 2).mul(&coefficients[centre])?;
        acc = acc.add(&middle)?.resize(self.accumulator)?;

        let output = acc
            .floor_to(self.tap_format.frac_bits())?
            .saturate(self.tap_format);

        self.taps.push(input.to_fixed().resize(self.tap_format)?);
        SampleFrame::from_fixed(&output)
    }

    pub fn process_all(&mut self, inputs: &[SampleFrame]) -> Result<Vec<SampleFrame>> {
        inputs.iter().map(|&input| self.process(input)).collect()
    }

    /// Zeros the delay line.
    pub fn reset(&mut self) {
        self.taps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::configuration::ClockSelect;

    fn q15() -> QFormat {
        QFormat::signed(16, 15).unwrap()
    }

    fn config(raw: &[i64], symmetric: bool) -> FilterConfiguration {
        FilterConfiguration::from_raw(ClockSelect::default(), symmetric, raw, q15()).unwrap()
    }

    fn model(raw: &[i64], symmetric: bool) -> FirReferenceModel {
        FirReferenceModel::new(&config(raw, symmetric), FilterFormat::default()).unwrap()
    }

    fn frame(value: i32) -> SampleFrame {
        SampleFrame::new(value).unwrap()
    }

    /// Full impulse response, mirrored and sign-adjusted.
    fn expand(raw: &[i64], symmetric: bool) -> Vec<i64> {
        let sign = if symmetric { 1 } else { -1 };
        let mut h = raw.to_vec();
        h.extend(raw[..raw.len() - 1].iter().rev().map(|&c| sign * c));
        h
    }

    /// Direct-form convolution on raw integers, for cross-checking.
    fn direct_form(raw: &[i64], symmetric: bool, inputs: &[i32]) -> Vec<i32> {
        let h = expand(raw, symmetric);
        let mut taps = vec![0i64; h.len()];
        inputs
            .iter()
            .map(|&x| {
                let acc: i64 = h.iter().zip(&taps).map(|(c, t)| c * t).sum();
                let y = (acc >> 15).clamp(-32768, 32767) << 8;
                taps.rotate_right(1);
                taps[0] = i64::from(x) >> 8;
                y as i32
            })
            .collect()
    }

    fn pseudo_random(count: usize, seed: u64) -> Vec<i32> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 40) as i32) - (1 << 23)
            })
            .collect()
    }

    #[test]
    fn test_delay_line_order() {
        let fmt = q15();
        let mut line = TapDelayLine::new(3, fmt);
        for raw in 1..=4 {
            line.push(Fixed::from_raw(raw, fmt).unwrap());
        }
        let order: Vec<i64> = line.iter().map(|t| t.raw()).collect();
        assert_eq!(order, vec![4, 3, 2]);

        line.clear();
        assert!(line.iter().all(|t| t.raw() == 0));
    }

    #[test]
    fn test_impulse_response_is_mirrored_coefficients() {
        let raw = [1000, -2000, 3000, 16000];
        let mut m = model(&raw, true);

        // 0.5 is exact at tap precision, so every output is h/2
        let mut inputs = vec![frame(0x40_0000)];
        inputs.resize(9, SampleFrame::ZERO);
        let outputs = m.process_all(&inputs).unwrap();

        let mut expected = vec![0];
        expected.extend(expand(&raw, true).iter().map(|&c| ((c / 2) << 8) as i32));
        expected.push(0);
        let observed: Vec<i32> = outputs.iter().map(|o| o.value()).collect();
        assert_eq!(observed, expected);
    }

    #[test]
    fn test_full_scale_impulse_floors() {
        let raw = [12345, -12345, 7];
        let mut m = model(&raw, true);
        let mut inputs = vec![SampleFrame::MAX];
        inputs.resize(6, SampleFrame::ZERO);
        let outputs = m.process_all(&inputs).unwrap();

        // tap holds 0x7FFF; c * 32767 / 32768 floors to c - 1 for positive c
        let observed: Vec<i32> = outputs.iter().map(|o| o.value() >> 8).collect();
        assert_eq!(observed, vec![0, 12344, -12345, 6, -12345, 12344]);
    }

    #[test]
    fn test_symmetry_toggle_negates_only_mirrored_half() {
        let raw = [2000, -4000, 6000, 8000];
        let mut symmetric = model(&raw, true);
        let mut antisymmetric = model(&raw, false);

        let mut inputs = vec![frame(0x40_0000)];
        inputs.resize(8, SampleFrame::ZERO);
        let a = symmetric.process_all(&inputs).unwrap();
        let b = antisymmetric.process_all(&inputs).unwrap();

        // outputs 1..=4 carry c0..c3, 5..=7 the mirrored c2..c0
        assert_eq!(&a[..5], &b[..5]);
        for k in 5..8 {
            assert_eq!(a[k].value(), -b[k].value());
            assert_ne!(a[k].value(), 0);
        }
    }

    #[test]
    fn test_saturation_clamps_exactly() {
        let raw = [32767; 4];
        let mut m = model(&raw, true);
        let outputs = m.process_all(&[SampleFrame::MAX; 10]).unwrap();
        assert_eq!(outputs[9].value(), 0x7F_FF00);

        m.reset();
        let outputs = m.process_all(&[SampleFrame::MIN; 10]).unwrap();
        assert_eq!(outputs[9], SampleFrame::MIN);
    }

    #[test]
    fn test_matches_direct_form() {
        let raw: Vec<i64> = pseudo_random(8, 7)
            .into_iter()
            .map(|v| i64::from(v >> 11))
            .collect();
        let inputs = pseudo_random(200, 99);
        let frames: Vec<SampleFrame> = inputs.iter().map(|&v| frame(v)).collect();

        for symmetric in [true, false] {
            let mut m = model(&raw, symmetric);
            let observed: Vec<i32> = m
                .process_all(&frames)
                .unwrap()
                .iter()
                .map(|o| o.value())
                .collect();
            assert_eq!(observed, direct_form(&raw, symmetric, &inputs));
        }
    }

    #[test]
    fn test_settles_to_zero_after_n_taps_zeros() {
        let raw = [3000, -7000, 11000, 20000, 30000];
        let mut m = model(&raw, false);
        let n_taps = m.taps().len();
        assert_eq!(n_taps, 9);

        let noise: Vec<SampleFrame> = pseudo_random(50, 3).into_iter().map(frame).collect();
        m.process_all(&noise).unwrap();

        let zeros = vec![SampleFrame::ZERO; n_taps + 1];
        let outputs = m.process_all(&zeros).unwrap();
        assert_ne!(outputs[n_taps - 1], SampleFrame::ZERO);
        assert_eq!(outputs[n_taps], SampleFrame::ZERO);
        assert!(m.taps().iter().all(|t| t.raw() == 0));
    }

    #[test]
    fn test_reset_restarts() {
        let raw = [100, 200];
        let mut m = model(&raw, true);
        let inputs: Vec<SampleFrame> = pseudo_random(20, 5).into_iter().map(frame).collect();
        let first = m.process_all(&inputs).unwrap();
        m.reset();
        assert_eq!(m.process_all(&inputs).unwrap(), first);
    }

    #[test]
    fn test_single_coefficient() {
        let mut m = model(&[16384], true);
        let outputs = m.process_all(&[frame(0x40_0000), frame(0)]).unwrap();
        assert_eq!(outputs[0].value(), 0);
        assert_eq!(outputs[1].value(), 0x20_0000);
    }
}
