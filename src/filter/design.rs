use pm_remez::{BandSetting, constant, pm_parameters, pm_remez};

use crate::error::{HarnessError, Result};
use crate::fixed::{Fixed, QFormat};

/// Smallest band edge handed to the optimiser (normalised frequency).
const MIN_NORMALIZED_FREQ: f64 = 0.001;
/// Largest band edge (Nyquist).
const MAX_NORMALIZED_FREQ: f64 = 0.5;

/// Passband shape of a designed filter. Frequencies are normalised to the
/// sample rate, so Nyquist is 0.5.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseShape {
    Lowpass { cutoff: f64 },
    Highpass { cutoff: f64 },
    Bandpass { low: f64, high: f64 },
}

/// Parameters for an equiripple linear-phase design.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct CoefficientDesign {
    #[serde(flatten)]
    pub shape: ResponseShape,
    /// Width of each transition band
    pub transition: f64,
    /// Coefficients to program; the filter has `2 * n_coeffs - 1` taps
    pub n_coeffs: usize,
}

impl Default for CoefficientDesign {
    fn default() -> Self {
        Self {
            shape: ResponseShape::Lowpass { cutoff: 0.1 },
            transition: 0.05,
            n_coeffs: 16,
        }
    }
}

fn band(low: f64, high: f64, gain: f64, name: &str) -> Result<BandSetting<f64>> {
    BandSetting::new(low, high, constant(gain))
        .map_err(|e| HarnessError::FilterDesign(format!("{}: {:?}", name, e)))
}

/// Runs Parks-McClellan for a symmetric (type I) response and quantises
/// the first half of the impulse response, centre tap last, into `format`.
///
/// # Errors
/// `FilterDesign` if the band edges overlap or the optimiser fails;
/// `FixedPointRange` if a coefficient does not fit `format`.
pub fn design(design: &CoefficientDesign, format: QFormat) -> Result<Vec<Fixed>> {
    if design.n_coeffs < 2 {
        return Err(HarnessError::FilterDesign(format!(
            "need at least 2 coefficients, got {}",
            design.n_coeffs
        )));
    }
    let num_taps = 2 * design.n_coeffs - 1;
    let trans = design.transition;

    let bands = match design.shape {
        ResponseShape::Lowpass { cutoff } => {
            let stop = cutoff + trans;
            if cutoff <= MIN_NORMALIZED_FREQ || stop >= MAX_NORMALIZED_FREQ {
                return Err(invalid(design));
            }
            vec![
                band(0.0, cutoff, 1.0, "Passband")?,
                band(stop, MAX_NORMALIZED_FREQ, 0.0, "Stopband")?,
            ]
        }
        ResponseShape::Highpass { cutoff } => {
            let stop = cutoff - trans;
            if stop <= MIN_NORMALIZED_FREQ || cutoff >= MAX_NORMALIZED_FREQ {
                return Err(invalid(design));
            }
            vec![
                band(0.0, stop, 0.0, "Stopband")?,
                band(cutoff, MAX_NORMALIZED_FREQ, 1.0, "Passband")?,
            ]
        }
        ResponseShape::Bandpass { low, high } => {
            let stop1_end = low - trans;
            let stop2_start = high + trans;
            if stop1_end <= MIN_NORMALIZED_FREQ
                || low >= high
                || stop2_start >= MAX_NORMALIZED_FREQ
            {
                return Err(invalid(design));
            }
            vec![
                band(0.0, stop1_end, 0.0, "Lower stopband")?,
                band(low, high, 1.0, "Passband")?,
                band(stop2_start, MAX_NORMALIZED_FREQ, 0.0, "Upper stopband")?,
            ]
        }
    };

    let params = pm_parameters(num_taps, &bands)
        .map_err(|e| HarnessError::FilterDesign(format!("PM parameters: {:?}", e)))?;
    let response = pm_remez(&params)
        .map_err(|e| HarnessError::FilterDesign(format!("PM Remez: {:?}", e)))?;

    log::debug!(
        "Designed {:?}: {} taps, transition {}",
        design.shape,
        num_taps,
        trans
    );
    quantize(&response.impulse_response[..design.n_coeffs], format)
}

fn invalid(design: &CoefficientDesign) -> HarnessError {
    HarnessError::FilterDesign(format!(
        "Invalid band edges: {:?}, transition={}",
        design.shape, design.transition
    ))
}

/// Rounds each value to the nearest representable value in `format`.
pub fn quantize(values: &[f64], format: QFormat) -> Result<Vec<Fixed>> {
    values
        .iter()
        .map(|&value| Fixed::from_f64(value, format))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn q15() -> QFormat {
        QFormat::signed(16, 15).unwrap()
    }

    /// Sum of the full mirrored response, i.e. the gain at DC.
    fn dc_gain(coefficients: &[Fixed]) -> f64 {
        let (centre, half) = coefficients.split_last().unwrap();
        2.0 * half.iter().map(Fixed::to_f64).sum::<f64>() + centre.to_f64()
    }

    #[test]
    fn test_lowpass_design() {
        let coefficients = design(&CoefficientDesign::default(), q15()).unwrap();
        assert_eq!(coefficients.len(), 16);
        assert_abs_diff_eq!(dc_gain(&coefficients), 1.0, epsilon = 0.05);

        // centre tap is the largest
        let centre = coefficients[15];
        assert!(coefficients[..15].iter().all(|c| *c < centre));
        assert!(coefficients.iter().all(|c| c.format() == q15()));
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let spec = CoefficientDesign {
            shape: ResponseShape::Highpass { cutoff: 0.3 },
            transition: 0.05,
            n_coeffs: 20,
        };
        let coefficients = design(&spec, q15()).unwrap();
        assert_abs_diff_eq!(dc_gain(&coefficients), 0.0, epsilon = 0.05);
    }

    #[test]
    fn test_invalid_edges() {
        let spec = CoefficientDesign {
            shape: ResponseShape::Lowpass { cutoff: 0.48 },
            transition: 0.05,
            n_coeffs: 8,
        };
        assert!(matches!(
            design(&spec, q15()),
            Err(HarnessError::FilterDesign(_))
        ));

        let spec = CoefficientDesign {
            n_coeffs: 1,
            ..CoefficientDesign::default()
        };
        assert!(design(&spec, q15()).is_err());
    }

    #[test]
    fn test_quantize_rounds() {
        let values = quantize(&[0.5, -0.25, 1.0 / 65536.0], q15()).unwrap();
        let raw: Vec<i64> = values.iter().map(Fixed::raw).collect();
        assert_eq!(raw, vec![16384, -8192, 1]);
        assert!(quantize(&[1.0], q15()).is_err());
    }
}
