//! Harness configuration
//!
//! Every section has defaults, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! [clocks]
//! main_period = "20ns"
//!
//! [filter]
//! clock_select = 4
//! symmetric = true
//!
//! [filter.design]
//! type = "lowpass"
//! cutoff = 0.1
//! transition = 0.05
//! n_coeffs = 16
//!
//! [stimulus]
//! kind = "gaussian"
//! length = 256
//! seed = 7
//! ```

use std::path::Path;

use crate::constants::{MAIN_CLOCK_PERIOD, SPI_CLOCK_PERIOD};
use crate::error::{HarnessError, Result};
use crate::filter::{
    ClockSelect, CoefficientDesign, FilterConfiguration, FilterFormat, design, quantize,
};
use crate::fixed::QFormat;
use crate::sim::SimDuration;

/// Complete harness configuration
///
/// # Example
/// ```
/// use firbench::config::HarnessConfig;
///
/// let mut config = HarnessConfig::default();
/// config.scenario.pipeline_delay = 2;
/// assert_eq!(config.filter.clock_select, 2);
/// ```
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Clocks driven by the harness
    pub clocks: ClockConfig,
    /// Datapath number formats
    pub formats: FormatConfig,
    /// Reset, settle and compare parameters
    pub scenario: ScenarioConfig,
    /// Filter to program into the device
    pub filter: FilterSettings,
    /// Input samples fed to the filter
    pub stimulus: StimulusConfig,
}

impl HarnessConfig {
    /// Loads a TOML file, filling in defaults for anything missing.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HarnessError::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.formats.filter_format()?;
        ClockSelect::new(self.filter.clock_select)?;
        if self.scenario.reset_cycles == 0 {
            return Err(HarnessError::Config(
                "reset_cycles must be at least 1".to_string(),
            ));
        }
        if self.stimulus.amplitude <= 0.0 || self.stimulus.amplitude > 1.0 {
            return Err(HarnessError::Config(format!(
                "stimulus amplitude {} outside (0, 1]",
                self.stimulus.amplitude
            )));
        }
        Ok(())
    }

    /// Filter configuration described by the `[filter]` section.
    pub fn filter_configuration(&self) -> Result<FilterConfiguration> {
        self.filter.configuration(self.formats.coefficient)
    }
}

/// Clocks the harness drives
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Main system clock period
    pub main_period: SimDuration,
    /// Configuration bus serial clock period
    pub spi_period: SimDuration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            main_period: MAIN_CLOCK_PERIOD,
            spi_period: SPI_CLOCK_PERIOD,
        }
    }
}

/// Number formats, written as `S<word>.<frac>`
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatConfig {
    /// Coefficient field format
    pub coefficient: QFormat,
    /// Delay-line (tap) format
    pub tap: QFormat,
}

impl FormatConfig {
    pub fn filter_format(&self) -> Result<FilterFormat> {
        FilterFormat::new(self.coefficient, self.tap)
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            coefficient: FilterFormat::DEFAULT_COEFFICIENT,
            tap: FilterFormat::DEFAULT_TAP,
        }
    }
}

/// Scenario sequencing
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Main-clock cycles `rst_n` is held low
    pub reset_cycles: u32,
    /// Main-clock cycles to wait after reset and after configuring
    pub settle_cycles: u32,
    /// Frames between an input and its output on the bus
    pub pipeline_delay: usize,
    /// Periods of each derived clock measured by the timing check
    pub timing_periods: u32,
    /// Reset and timing-check repetitions for the reset-cycle scenario
    pub reset_repeats: u32,
    /// Simulated time after which a scenario is abandoned
    pub time_limit: SimDuration,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            reset_cycles: 10,
            settle_cycles: 20,
            pipeline_delay: 1,
            timing_periods: 2,
            reset_repeats: 3,
            time_limit: SimDuration::from_ms(2_000),
        }
    }
}

/// Filter to program
///
/// Explicit `coefficients` (first half of the response, centre tap last)
/// take precedence over `design`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSettings {
    /// Clock divider selection, 0..=7
    pub clock_select: u8,
    /// Mirror the coefficients with the same sign (false negates them)
    pub symmetric: bool,
    /// Coefficient values in `[-1, 1)`
    pub coefficients: Option<Vec<f64>>,
    /// Equiripple design used when no coefficients are given
    pub design: CoefficientDesign,
}

impl FilterSettings {
    pub fn configuration(&self, format: QFormat) -> Result<FilterConfiguration> {
        let coefficients = match &self.coefficients {
            Some(values) => quantize(values, format)?,
            None => design(&self.design, format)?,
        };
        FilterConfiguration::new(
            ClockSelect::new(self.clock_select)?,
            self.symmetric,
            &coefficients,
            format,
        )
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            clock_select: 2,
            symmetric: true,
            coefficients: None,
            design: CoefficientDesign::default(),
        }
    }
}

/// Kind of input sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StimulusKind {
    /// One full-amplitude sample followed by zeros
    Impulse,
    /// All zeros
    Zeros,
    /// Constant full amplitude
    Step,
    /// Uniformly distributed noise
    Uniform,
    /// Gaussian noise, clipped to full scale
    Gaussian,
    /// Sine wave
    Sine,
}

/// Input sequence parameters
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StimulusConfig {
    pub kind: StimulusKind,
    /// Number of samples
    pub length: usize,
    /// RNG seed for the noise kinds; random if unset
    pub seed: Option<u64>,
    /// Peak amplitude (noise: standard deviation for gaussian), `(0, 1]`
    pub amplitude: f64,
    /// Sine frequency, normalised to the sample rate
    pub frequency: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            kind: StimulusKind::Uniform,
            length: 64,
            seed: Some(1),
            amplitude: 1.0,
            frequency: 0.05,
        }
    }
}
