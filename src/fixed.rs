//! Fixed-point numbers with explicit two's-complement raw bits
//!
//! A [`Fixed`] is a raw integer paired with a [`QFormat`] describing its
//! word width, fractional width and signedness. Arithmetic never wraps:
//! add, subtract and multiply return a widened format large enough for the
//! exact result, and narrowing conversions either floor the fractional part
//! (toward negative infinity) or fail when integer bits would be lost.
//! Saturation is the only operation that clamps.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{HarnessError, Result};

/// Fixed-point number format: signedness, total word width and number of
/// fractional bits.
///
/// `S16.15` is a signed 16-bit word with 15 fractional bits (range
/// `[-1, 1)`), `U8.0` an unsigned byte. Parses from the same notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct QFormat {
    signed: bool,
    word_bits: u32,
    frac_bits: u32,
}

impl QFormat {
    /// Widest word a signed format may use. Unsigned formats are limited to
    /// one bit less so every raw value fits an `i64`.
    pub const MAX_WORD_BITS: u32 = 64;

    pub fn new(signed: bool, word_bits: u32, frac_bits: u32) -> Result<Self> {
        let max = if signed {
            Self::MAX_WORD_BITS
        } else {
            Self::MAX_WORD_BITS - 1
        };
        if word_bits == 0 || word_bits > max {
            return Err(HarnessError::FixedPointFormat(format!(
                "word width {} outside 1..={}",
                word_bits, max
            )));
        }
        if frac_bits > word_bits {
            return Err(HarnessError::FixedPointFormat(format!(
                "{} fractional bits exceed word width {}",
                frac_bits, word_bits
            )));
        }
        Ok(Self {
            signed,
            word_bits,
            frac_bits,
        })
    }

    /// Signed format shorthand.
    pub fn signed(word_bits: u32, frac_bits: u32) -> Result<Self> {
        Self::new(true, word_bits, frac_bits)
    }

    /// Signed format for compile-time constants. Callers guarantee
    /// `0 < frac_bits <= word_bits <= 64`.
    pub(crate) const fn signed_const(word_bits: u32, frac_bits: u32) -> Self {
        Self {
            signed: true,
            word_bits,
            frac_bits,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn word_bits(&self) -> u32 {
        self.word_bits
    }

    pub fn frac_bits(&self) -> u32 {
        self.frac_bits
    }

    /// Integer bits, including the sign bit for signed formats.
    pub fn int_bits(&self) -> u32 {
        self.word_bits - self.frac_bits
    }

    pub fn min_raw(&self) -> i64 {
        if !self.signed {
            0
        } else if self.word_bits == 64 {
            i64::MIN
        } else {
            -(1i64 << (self.word_bits - 1))
        }
    }

    pub fn max_raw(&self) -> i64 {
        if !self.signed {
            (1i64 << self.word_bits) - 1
        } else if self.word_bits == 64 {
            i64::MAX
        } else {
            (1i64 << (self.word_bits - 1)) - 1
        }
    }

    /// Whether `raw` is representable in this format.
    pub fn contains(&self, raw: i128) -> bool {
        raw >= self.min_raw() as i128 && raw <= self.max_raw() as i128
    }

    fn mask(&self) -> u64 {
        if self.word_bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.word_bits) - 1
        }
    }
}

impl fmt::Display for QFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.signed { 'S' } else { 'U' };
        write!(f, "{}{}.{}", prefix, self.word_bits, self.frac_bits)
    }
}

impl FromStr for QFormat {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || HarnessError::FixedPointFormat(format!("invalid format: {:?}", s));

        let (signed, rest) = match s.chars().next() {
            Some('S' | 's') => (true, &s[1..]),
            Some('U' | 'u') => (false, &s[1..]),
            _ => return Err(invalid()),
        };
        let (word, frac) = rest.split_once('.').ok_or_else(invalid)?;
        let word = word.parse().map_err(|_| invalid())?;
        let frac = frac.parse().map_err(|_| invalid())?;
        Self::new(signed, word, frac)
    }
}

impl TryFrom<String> for QFormat {
    type Error = HarnessError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// A fixed-point value.
///
/// Equality and ordering compare the represented values, so `0.5` in
/// `S8.1` equals `0.5` in `S16.15`.
#[derive(Clone, Copy, Debug)]
pub struct Fixed {
    raw: i64,
    format: QFormat,
}

/// Moves the binary point of `raw` from `from` to `to` fractional bits,
/// flooring when bits are dropped.
fn rescale(raw: i128, from: u32, to: u32) -> i128 {
    if to >= from {
        raw << (to - from)
    } else {
        raw >> (from - to)
    }
}

impl Fixed {
    pub fn zero(format: QFormat) -> Self {
        Self { raw: 0, format }
    }

    pub fn from_raw(raw: i64, format: QFormat) -> Result<Self> {
        Self::from_wide(raw as i128, format)
    }

    fn from_wide(raw: i128, format: QFormat) -> Result<Self> {
        if !format.contains(raw) {
            return Err(HarnessError::FixedPointRange {
                value: format!("raw {}", raw),
                format,
            });
        }
        Ok(Self {
            raw: raw as i64,
            format,
        })
    }

    /// Interprets the low `word_bits` of `bits` as a two's-complement (or
    /// unsigned) pattern. Higher bits are ignored.
    pub fn from_bits(bits: u64, format: QFormat) -> Self {
        let mask = format.mask();
        let masked = bits & mask;
        let negative =
            format.signed && format.word_bits < 64 && (masked >> (format.word_bits - 1)) & 1 == 1;
        let raw = if negative {
            (masked | !mask) as i64
        } else {
            masked as i64
        };
        Self { raw, format }
    }

    /// Integer value `value` in `format`.
    pub fn from_int(value: i64, format: QFormat) -> Result<Self> {
        Self::from_wide((value as i128) << format.frac_bits, format)
    }

    /// Nearest representable value to `value` (ties away from zero).
    pub fn from_f64(value: f64, format: QFormat) -> Result<Self> {
        let scaled = (value * 2f64.powi(format.frac_bits as i32)).round();
        if !scaled.is_finite()
            || scaled < format.min_raw() as f64
            || scaled > format.max_raw() as f64
        {
            return Err(HarnessError::FixedPointRange {
                value: value.to_string(),
                format,
            });
        }
        Ok(Self {
            raw: scaled as i64,
            format,
        })
    }

    pub fn raw(&self) -> i64 {
        self.raw
    }

    pub fn format(&self) -> QFormat {
        self.format
    }

    /// Two's-complement bit pattern, masked to the word width.
    pub fn to_bits(&self) -> u64 {
        self.raw as u64 & self.format.mask()
    }

    /// Integer part, rounded toward negative infinity.
    pub fn to_int(&self) -> i64 {
        ((self.raw as i128) >> self.format.frac_bits) as i64
    }

    pub fn to_f64(&self) -> f64 {
        self.raw as f64 / 2f64.powi(self.format.frac_bits as i32)
    }

    /// Converts to `format`, flooring dropped fractional bits. Fails when
    /// the value does not fit the target's integer range.
    pub fn resize(&self, format: QFormat) -> Result<Self> {
        let raw = rescale(self.raw as i128, self.format.frac_bits, format.frac_bits);
        Self::from_wide(raw, format)
    }

    /// Rounds toward negative infinity to an integer, keeping the format.
    pub fn floor(&self) -> Result<Self> {
        let frac = self.format.frac_bits;
        let raw = ((self.raw as i128) >> frac) << frac;
        Self::from_wide(raw, self.format)
    }

    /// Floors to `frac_bits` fractional bits, shrinking the word by the
    /// number of bits dropped. No-op if the value already has no more than
    /// `frac_bits` fractional bits.
    pub fn floor_to(&self, frac_bits: u32) -> Result<Self> {
        if frac_bits >= self.format.frac_bits {
            return Ok(*self);
        }
        let dropped = self.format.frac_bits - frac_bits;
        let min_word = frac_bits + u32::from(self.format.signed);
        let word = (self.format.word_bits - dropped).max(min_word).max(1);
        let format = QFormat::new(self.format.signed, word, frac_bits)?;
        self.resize(format)
    }

    /// Clamps to the range of `format` after aligning the binary point
    /// (flooring if `format` has fewer fractional bits).
    pub fn saturate(&self, format: QFormat) -> Self {
        let raw = rescale(self.raw as i128, self.format.frac_bits, format.frac_bits);
        let raw = raw.clamp(format.min_raw() as i128, format.max_raw() as i128);
        Self {
            raw: raw as i64,
            format,
        }
    }

    /// Exact sum, in a format one integer bit wider than the wider operand.
    pub fn add(&self, other: &Fixed) -> Result<Self> {
        let format = sum_format(&self.format, &other.format, false)?;
        let frac = format.frac_bits;
        let raw = rescale(self.raw as i128, self.format.frac_bits, frac)
            + rescale(other.raw as i128, other.format.frac_bits, frac);
        Self::from_wide(raw, format)
    }

    /// Exact difference; the result is always signed.
    pub fn sub(&self, other: &Fixed) -> Result<Self> {
        let format = sum_format(&self.format, &other.format, true)?;
        let frac = format.frac_bits;
        let raw = rescale(self.raw as i128, self.format.frac_bits, frac)
            - rescale(other.raw as i128, other.format.frac_bits, frac);
        Self::from_wide(raw, format)
    }

    /// Exact product. Word and fractional widths add.
    pub fn mul(&self, other: &Fixed) -> Result<Self> {
        let format = QFormat::new(
            self.format.signed || other.format.signed,
            self.format.word_bits + other.format.word_bits,
            self.format.frac_bits + other.format.frac_bits,
        )?;
        Self::from_wide(self.raw as i128 * other.raw as i128, format)
    }

    /// Multiplies by `2^n`, widening the word by `n` bits.
    pub fn shl(&self, n: u32) -> Result<Self> {
        let format = QFormat::new(
            self.format.signed,
            self.format.word_bits + n,
            self.format.frac_bits,
        )?;
        Self::from_wide((self.raw as i128) << n, format)
    }

    /// Divides by `2^n`, flooring, in the same format.
    pub fn shr(&self, n: u32) -> Self {
        let raw = (self.raw as i128) >> n.min(127);
        Self {
            raw: raw as i64,
            format: self.format,
        }
    }
}

fn sum_format(a: &QFormat, b: &QFormat, subtract: bool) -> Result<QFormat> {
    let signed = a.signed || b.signed || subtract;
    let int_a = a.int_bits() + u32::from(signed && !a.signed);
    let int_b = b.int_bits() + u32::from(signed && !b.signed);
    let frac = a.frac_bits.max(b.frac_bits);
    let int = int_a.max(int_b) + 1;
    QFormat::new(signed, int + frac, frac)
}

impl PartialEq for Fixed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Fixed {}

impl PartialOrd for Fixed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fixed {
    fn cmp(&self, other: &Self) -> Ordering {
        let frac = self.format.frac_bits.max(other.format.frac_bits);
        let a = rescale(self.raw as i128, self.format.frac_bits, frac);
        let b = rescale(other.raw as i128, other.format.frac_bits, frac);
        a.cmp(&b)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}
