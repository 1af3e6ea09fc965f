use std::fmt;

use crate::constants::{CLOCK_SELECT_BITS, master_divider};
use crate::error::{HarnessError, Result};
use crate::fixed::{Fixed, QFormat};
use crate::filter::sample::SAMPLE_FORMAT;

/// Clock-divider selection field. The master clock runs at
/// `main / (2 << clock_select)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockSelect(u8);

impl ClockSelect {
    pub const MAX: u8 = (1 << CLOCK_SELECT_BITS) - 1;

    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(HarnessError::ConfigurationEncoding {
                field: "clock_select".to_string(),
                value: value.to_string(),
                bits: CLOCK_SELECT_BITS,
            });
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Main-clock cycles per master-clock period.
    pub fn master_divider(&self) -> u64 {
        master_divider(self.0)
    }
}

impl fmt::Display for ClockSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number formats of the filter datapath. Samples on the bus are always
/// S24.23.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterFormat {
    coefficient: QFormat,
    tap: QFormat,
}

impl FilterFormat {
    pub const DEFAULT_COEFFICIENT: QFormat = QFormat::signed_const(16, 15);
    pub const DEFAULT_TAP: QFormat = QFormat::signed_const(16, 15);

    /// The tap format must be signed with a single integer bit and no more
    /// fractional bits than a bus sample, so every sample fits a tap after
    /// flooring and every tap converts back to a sample exactly.
    pub fn new(coefficient: QFormat, tap: QFormat) -> Result<Self> {
        if !coefficient.is_signed() {
            return Err(HarnessError::FixedPointFormat(format!(
                "coefficient format {} must be signed",
                coefficient
            )));
        }
        if !tap.is_signed() || tap.int_bits() != 1 || tap.frac_bits() > SAMPLE_FORMAT.frac_bits()
        {
            return Err(HarnessError::FixedPointFormat(format!(
                "tap format {} must be S(n).(n-1) with n <= {}",
                tap,
                SAMPLE_FORMAT.word_bits()
            )));
        }
        Ok(Self { coefficient, tap })
    }

    pub fn coefficient(&self) -> QFormat {
        self.coefficient
    }

    pub fn tap(&self) -> QFormat {
        self.tap
    }
}

impl Default for FilterFormat {
    fn default() -> Self {
        Self {
            coefficient: Self::DEFAULT_COEFFICIENT,
            tap: Self::DEFAULT_TAP,
        }
    }
}

/// Everything programmed over the configuration bus.
///
/// Only the first half of the (odd-length) impulse response is stored;
/// the second half mirrors it, negated when `symmetric` is false. The last
/// coefficient is the centre tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfiguration {
    clock_select: ClockSelect,
    symmetric: bool,
    coefficients: Vec<Fixed>,
    format: QFormat,
}

impl FilterConfiguration {
    /// Converts every coefficient into `format`.
    ///
    /// # Errors
    /// `ConfigurationEncoding` if a coefficient is not exactly representable
    /// in `format`; `Config` if there are no coefficients.
    pub fn new(
        clock_select: ClockSelect,
        symmetric: bool,
        coefficients: &[Fixed],
        format: QFormat,
    ) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(HarnessError::Config(
                "filter needs at least one coefficient".to_string(),
            ));
        }
        let coefficients = coefficients
            .iter()
            .enumerate()
            .map(|(index, coefficient)| {
                let rejected = || HarnessError::ConfigurationEncoding {
                    field: format!("coefficient[{}]", index),
                    value: coefficient.to_string(),
                    bits: format.word_bits(),
                };
                let field = coefficient.resize(format).map_err(|_| rejected())?;
                if field != *coefficient {
                    return Err(rejected());
                }
                Ok(field)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            clock_select,
            symmetric,
            coefficients,
            format,
        })
    }

    /// Coefficients given as raw integers in `format`.
    pub fn from_raw(
        clock_select: ClockSelect,
        symmetric: bool,
        raw: &[i64],
        format: QFormat,
    ) -> Result<Self> {
        let coefficients = raw
            .iter()
            .enumerate()
            .map(|(index, &value)| {
                Fixed::from_raw(value, format).map_err(|_| HarnessError::ConfigurationEncoding {
                    field: format!("coefficient[{}]", index),
                    value: value.to_string(),
                    bits: format.word_bits(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(clock_select, symmetric, &coefficients, format)
    }

    pub fn clock_select(&self) -> ClockSelect {
        self.clock_select
    }

    pub fn symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn coefficients(&self) -> &[Fixed] {
        &self.coefficients
    }

    pub fn coefficient_format(&self) -> QFormat {
        self.format
    }

    pub fn n_coeffs(&self) -> usize {
        self.coefficients.len()
    }

    pub fn n_taps(&self) -> usize {
        2 * self.coefficients.len() - 1
    }

    /// Samples between an input and the centre of its response.
    pub fn group_delay(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Same coefficients and clocking with the other symmetry.
    pub fn with_symmetric(&self, symmetric: bool) -> Self {
        Self {
            symmetric,
            ..self.clone()
        }
    }

    pub fn with_clock_select(&self, clock_select: ClockSelect) -> Self {
        Self {
            clock_select,
            ..self.clone()
        }
    }
}

impl fmt::Display for FilterConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clock_select={} {} taps={} coefficients={}",
            self.clock_select,
            if self.symmetric {
                "symmetric"
            } else {
                "antisymmetric"
            },
            self.n_taps(),
            self.format
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q15() -> QFormat {
        QFormat::signed(16, 15).unwrap()
    }

    #[test]
    fn test_clock_select_range() {
        assert_eq!(ClockSelect::new(7).unwrap().value(), 7);
        assert!(matches!(
            ClockSelect::new(8),
            Err(HarnessError::ConfigurationEncoding { bits: 3, .. })
        ));
        assert_eq!(ClockSelect::new(4).unwrap().master_divider(), 32);
    }

    #[test]
    fn test_tap_count_is_odd() {
        let config =
            FilterConfiguration::from_raw(ClockSelect::default(), true, &[1, 2, 3, 4], q15())
                .unwrap();
        assert_eq!(config.n_coeffs(), 4);
        assert_eq!(config.n_taps(), 7);
        assert_eq!(config.group_delay(), 3);
    }

    #[test]
    fn test_out_of_range_coefficient_is_rejected() {
        let err = FilterConfiguration::from_raw(ClockSelect::default(), true, &[0, 40_000], q15())
            .unwrap_err();
        match err {
            HarnessError::ConfigurationEncoding { field, bits, .. } => {
                assert_eq!(field, "coefficient[1]");
                assert_eq!(bits, 16);
            }
            other => panic!("unexpected error {:?}", other),
        }

        let wide = Fixed::from_f64(1.5, QFormat::signed(32, 15).unwrap()).unwrap();
        assert!(FilterConfiguration::new(ClockSelect::default(), true, &[wide], q15()).is_err());
    }

    #[test]
    fn test_inexact_coefficient_is_rejected() {
        let fine = Fixed::from_raw(1, QFormat::signed(24, 23).unwrap()).unwrap();
        assert!(FilterConfiguration::new(ClockSelect::default(), true, &[fine], q15()).is_err());

        let exact = Fixed::from_raw(0x100, QFormat::signed(24, 23).unwrap()).unwrap();
        let config =
            FilterConfiguration::new(ClockSelect::default(), true, &[exact], q15()).unwrap();
        assert_eq!(config.coefficients()[0].raw(), 1);
        assert_eq!(config.coefficients()[0].format(), q15());
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(matches!(
            FilterConfiguration::new(ClockSelect::default(), true, &[], q15()),
            Err(HarnessError::Config(_))
        ));
    }

    #[test]
    fn test_filter_format_validation() {
        assert!(FilterFormat::new(q15(), q15()).is_ok());
        assert!(FilterFormat::new(q15(), QFormat::signed(24, 23).unwrap()).is_ok());
        assert!(FilterFormat::new(q15(), QFormat::signed(25, 24).unwrap()).is_err());
        assert!(FilterFormat::new(q15(), QFormat::signed(16, 14).unwrap()).is_err());
        assert!(FilterFormat::new(QFormat::new(false, 16, 15).unwrap(), q15()).is_err());
    }
}
