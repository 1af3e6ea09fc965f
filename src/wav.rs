use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::constants::FRAME_BITS;
use crate::error::{HarnessError, Result};
use crate::filter::SampleFrame;

fn wav_error(path: &Path, e: hound::Error) -> HarnessError {
    match e {
        hound::Error::IoError(io) => HarnessError::Io(io),
        other => HarnessError::Config(format!("{}: {}", path.display(), other)),
    }
}

/// Writes `frames` as a 24-bit mono PCM file.
pub fn save_wav(path: &Path, frames: &[SampleFrame], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: FRAME_BITS as u16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| wav_error(path, e))?;
    for frame in frames {
        writer
            .write_sample(frame.value())
            .map_err(|e| wav_error(path, e))?;
    }
    writer.finalize().map_err(|e| wav_error(path, e))?;
    Ok(())
}

/// Reads the first channel of a PCM or float WAV file as 24-bit samples.
/// Integer samples are shifted to 24 bits (flooring if wider); float
/// samples are scaled and clipped to full scale.
pub fn load_wav(path: &Path) -> Result<Vec<SampleFrame>> {
    let mut reader = WavReader::open(path).map_err(|e| wav_error(path, e))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let frames: Vec<SampleFrame> = match spec.sample_format {
        SampleFormat::Int => {
            let bits = u32::from(spec.bits_per_sample);
            reader
                .samples::<i32>()
                .step_by(channels)
                .map(|s| {
                    let s = i64::from(s.map_err(|e| wav_error(path, e))?);
                    let value = if bits >= FRAME_BITS {
                        s >> (bits - FRAME_BITS)
                    } else {
                        s << (FRAME_BITS - bits)
                    };
                    Ok(SampleFrame::saturating(value))
                })
                .collect::<Result<_>>()?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .step_by(channels)
            .map(|s| {
                let s = s.map_err(|e| wav_error(path, e))?;
                let scaled = (f64::from(s) * f64::from(1u32 << (FRAME_BITS - 1))).round();
                Ok(SampleFrame::saturating(scaled as i64))
            })
            .collect::<Result<_>>()?,
    };

    log::debug!(
        "Loaded {} samples from {} ({} Hz, {} bit)",
        frames.len(),
        path.display(),
        spec.sample_rate,
        spec.bits_per_sample
    );
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("firbench_{}_{}.wav", name, std::process::id()))
    }

    #[test]
    fn test_round_trip_24_bit() {
        let path = temp_path("round_trip");
        let frames: Vec<SampleFrame> = [0, 1, -1, 0x7F_FFFF, -0x80_0000, 0x12_3456]
            .iter()
            .map(|&v| SampleFrame::new(v).unwrap())
            .collect();

        save_wav(&path, &frames, 48_000).unwrap();
        let loaded = load_wav(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, frames);
    }

    #[test]
    fn test_16_bit_input_is_widened() {
        let path = temp_path("widen");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0x4000i16, 7, -0x8000, 7] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = load_wav(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let values: Vec<i32> = loaded.iter().map(|f| f.value()).collect();
        assert_eq!(values, vec![0x40_0000, -0x80_0000]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_wav(Path::new("/nonexistent/firbench.wav"));
        assert!(matches!(result, Err(HarnessError::Io(_))));
    }
}
