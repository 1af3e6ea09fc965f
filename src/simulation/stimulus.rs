use rand::RngExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

use crate::config::{StimulusConfig, StimulusKind};
use crate::error::{HarnessError, Result};
use crate::filter::SampleFrame;

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

/// Nearest sample to `value` (full scale is 1.0), clipped to the 24-bit range.
pub fn to_frame(value: f64) -> SampleFrame {
    SampleFrame::saturating((value * (1u32 << 23) as f64).round() as i64)
}

/// Input sequence described by `config`.
pub fn generate_stimulus(config: &StimulusConfig) -> Result<Vec<SampleFrame>> {
    let length = config.length;
    let amplitude = config.amplitude;
    let frames = match config.kind {
        StimulusKind::Impulse => impulse(length, amplitude),
        StimulusKind::Zeros => vec![SampleFrame::ZERO; length],
        StimulusKind::Step => vec![to_frame(amplitude); length],
        StimulusKind::Uniform => uniform_noise(length, amplitude, config.seed),
        StimulusKind::Gaussian => gaussian_noise(length, amplitude, config.seed)?,
        StimulusKind::Sine => sine(length, amplitude, config.frequency),
    };
    Ok(frames)
}

pub fn impulse(length: usize, amplitude: f64) -> Vec<SampleFrame> {
    let mut frames = vec![SampleFrame::ZERO; length];
    if let Some(first) = frames.first_mut() {
        *first = to_frame(amplitude);
    }
    frames
}

/// Uniform noise in `[-amplitude, amplitude)`.
pub fn uniform_noise(length: usize, amplitude: f64, seed: Option<u64>) -> Vec<SampleFrame> {
    let mut rng = create_rng(seed);
    (0..length)
        .map(|_| to_frame((rng.random::<f64>() * 2.0 - 1.0) * amplitude))
        .collect()
}

/// Gaussian noise with standard deviation `std_dev`, clipped to full scale.
pub fn gaussian_noise(length: usize, std_dev: f64, seed: Option<u64>) -> Result<Vec<SampleFrame>> {
    let mut rng = create_rng(seed);
    let normal = Normal::new(0.0, std_dev)
        .map_err(|e| HarnessError::Config(format!("gaussian stimulus: {}", e)))?;
    Ok((0..length)
        .map(|_| to_frame(normal.sample(&mut rng)))
        .collect())
}

/// `frequency` is normalised to the sample rate.
pub fn sine(length: usize, amplitude: f64, frequency: f64) -> Vec<SampleFrame> {
    (0..length)
        .map(|i| to_frame(amplitude * (2.0 * PI * frequency * i as f64).sin()))
        .collect()
}
