use std::fmt;

use crate::constants::FRAME_BITS;
use crate::error::{HarnessError, Result};
use crate::fixed::{Fixed, QFormat};

/// Format of samples on the audio bus: signed 24-bit, range `[-1, 1)`.
pub const SAMPLE_FORMAT: QFormat = QFormat::signed_const(FRAME_BITS, FRAME_BITS - 1);

/// One 24-bit two's-complement PCM sample as exchanged over I2S.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct SampleFrame(i32);

impl SampleFrame {
    pub const ZERO: SampleFrame = SampleFrame(0);
    pub const MAX: SampleFrame = SampleFrame((1 << (FRAME_BITS - 1)) - 1);
    pub const MIN: SampleFrame = SampleFrame(-(1 << (FRAME_BITS - 1)));

    pub fn new(value: i32) -> Result<Self> {
        if value < Self::MIN.0 || value > Self::MAX.0 {
            return Err(HarnessError::FixedPointRange {
                value: value.to_string(),
                format: SAMPLE_FORMAT,
            });
        }
        Ok(Self(value))
    }

    /// Clamps `value` into the 24-bit range.
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as i32)
    }

    /// Sign-extends the low 24 bits of `bits`.
    pub fn from_bits(bits: u32) -> Self {
        Self(((bits << (32 - FRAME_BITS)) as i32) >> (32 - FRAME_BITS))
    }

    /// Two's-complement pattern in the low 24 bits.
    pub fn to_bits(&self) -> u32 {
        self.0 as u32 & ((1 << FRAME_BITS) - 1)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn to_fixed(&self) -> Fixed {
        Fixed::from_bits(self.to_bits() as u64, SAMPLE_FORMAT)
    }

    /// Converts a fixed-point value into the sample format, flooring extra
    /// fractional bits. Fails if the value is outside `[-1, 1)`.
    pub fn from_fixed(value: &Fixed) -> Result<Self> {
        let value = value.resize(SAMPLE_FORMAT)?;
        Ok(Self(value.raw() as i32))
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / (1 << (FRAME_BITS - 1)) as f64
    }
}

impl fmt::Display for SampleFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:06X})", self.0, self.to_bits())
    }
}
