use super::{Formatter, ScenarioSummary};

pub struct TextFormatter {
    verbose: bool,
}

impl TextFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Formatter for TextFormatter {
    fn format(&self, s: &ScenarioSummary) -> String {
        let verdict = if s.passed { "PASS" } else { "FAIL" };
        let mut out = format!(
            "{}: clock_select={} {} taps={} ({}), {} samples compared",
            verdict,
            s.clock_select,
            if s.symmetric { "symmetric" } else { "antisymmetric" },
            s.n_taps,
            s.coefficient_format,
            s.samples_compared
        );
        if let Some(error) = &s.error {
            out.push_str(&format!("\n  error: {}", error));
        }
        if self.verbose {
            out.push_str(&format!(
                "\n  bitstream: {}\n  mclk: {} ps, bclk: {} ps, lrclk: {} ps ({} Hz)",
                s.bitstream,
                s.master_period_ps,
                s.bit_clock_period_ps,
                s.frame_period_ps,
                s.sample_rate_hz
            ));
            if let Some(delay) = s.pipeline_delay {
                out.push_str(&format!("\n  pipeline delay: {} frames", delay));
            }
            if let Some(peak) = s.peak_output {
                out.push_str(&format!("\n  peak output: {}", peak));
            }
            if let Some(at) = s.finished_at_ps {
                out.push_str(&format!("\n  finished at: {} ps", at));
            }
        }
        out
    }
}
