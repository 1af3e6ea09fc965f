//! Scenario result rendering
//!
//! A [`ScenarioSummary`] flattens the outcome of a run, pass or fail, into
//! plain values; a [`Formatter`] turns it into text for the terminal or a
//! single JSON object.

mod json;
mod text;

pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

use crate::error::{HarnessError, Result};
use crate::filter::{ConfigurationEncoder, FilterConfiguration};
use crate::scenario::ScenarioReport;
use crate::sim::SimDuration;
use crate::timing::ClockTimingExpectation;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScenarioSummary {
    pub passed: bool,
    /// Error that ended the scenario
    pub error: Option<String>,
    pub clock_select: u8,
    pub symmetric: bool,
    pub n_taps: usize,
    pub coefficient_format: String,
    /// Configuration bitstream, hex, byte 0 first
    pub bitstream: String,
    pub master_period_ps: u64,
    pub bit_clock_period_ps: u64,
    pub frame_period_ps: u64,
    pub sample_rate_hz: u32,
    pub pipeline_delay: Option<usize>,
    pub samples_compared: usize,
    pub peak_output: Option<i32>,
    pub finished_at_ps: Option<u64>,
}

impl ScenarioSummary {
    pub fn new(
        configuration: &FilterConfiguration,
        main_period: SimDuration,
        result: &Result<ScenarioReport>,
    ) -> Self {
        let expectation =
            ClockTimingExpectation::from_clock_select(configuration.clock_select(), main_period);
        let bitstream = ConfigurationEncoder::for_configuration(configuration)
            .encode(configuration)
            .map(|bytes| hex(&bytes))
            .unwrap_or_default();

        let (passed, error, report) = match result {
            Ok(report) => (true, None, Some(report)),
            Err(e) => (false, Some(e.to_string()), None),
        };

        Self {
            passed,
            error,
            clock_select: configuration.clock_select().value(),
            symmetric: configuration.symmetric(),
            n_taps: configuration.n_taps(),
            coefficient_format: configuration.coefficient_format().to_string(),
            bitstream,
            master_period_ps: expectation.master_period.as_ps(),
            bit_clock_period_ps: expectation.bit_clock_period.as_ps(),
            frame_period_ps: expectation.frame_period.as_ps(),
            sample_rate_hz: expectation.sample_rate_hz(),
            pipeline_delay: report.map(|r| r.comparison.pipeline_delay),
            samples_compared: report.map_or(0, |r| r.comparison.expected.len()),
            peak_output: report.and_then(|r| {
                r.comparison
                    .expected
                    .iter()
                    .map(|f| f.value().abs())
                    .max()
            }),
            finished_at_ps: report.map(|r| r.finished_at.as_ps()),
        }
    }

    /// Index of the failing sample, if the run ended on a mismatch.
    pub fn mismatch_index(result: &Result<ScenarioReport>) -> Option<usize> {
        match result {
            Err(HarnessError::ResponseMismatch { index, .. }) => Some(*index),
            _ => None,
        }
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

pub trait Formatter {
    fn format(&self, summary: &ScenarioSummary) -> String;
}

pub fn create_formatter(format: OutputFormat, verbose: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(verbose)),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ClockSelect;
    use crate::fixed::QFormat;

    fn configuration() -> FilterConfiguration {
        FilterConfiguration::from_raw(
            ClockSelect::new(4).unwrap(),
            true,
            &[0x12, -1],
            QFormat::signed(8, 7).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_failure_summary() {
        let result = Err(HarnessError::ResponseMismatch {
            index: 3,
            expected: 10,
            observed: 11,
        });
        let summary = ScenarioSummary::new(&configuration(), SimDuration::from_ns(20), &result);

        assert!(!summary.passed);
        assert_eq!(summary.bitstream, "2CF10F");
        assert_eq!(summary.master_period_ps, 640_000);
        assert_eq!(summary.frame_period_ps, 163_840_000);
        assert_eq!(summary.n_taps, 3);
        assert_eq!(summary.samples_compared, 0);
        assert_eq!(ScenarioSummary::mismatch_index(&result), Some(3));
        assert!(summary.error.unwrap().contains("sample 3"));
    }

    #[test]
    fn test_formatters() {
        let result = Err(HarnessError::Stalled(crate::sim::SimTime::from_ps(5)));
        let summary = ScenarioSummary::new(&configuration(), SimDuration::from_ns(20), &result);

        let json = create_formatter(OutputFormat::Json, false).format(&summary);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["passed"], false);
        assert_eq!(value["clock_select"], 4);

        let text = create_formatter(OutputFormat::Text, true).format(&summary);
        assert!(text.contains("FAIL"));
        assert!(text.contains("2CF10F"));
    }
}
