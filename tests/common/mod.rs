#![allow(dead_code)]

use firbench::HarnessConfig;
use firbench::filter::{FilterConfiguration, SampleFrame};
use firbench::sim::SimDuration;
use firbench::simulation::BehavioralFir;

/// Three-coefficient filter (five taps) on fast clocks, so a scenario
/// simulates in well under a second.
pub fn fast_config(clock_select: u8) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.filter.clock_select = clock_select;
    config.filter.coefficients = Some(vec![0.125, -0.25, 0.5]);
    config.stimulus.length = 32;
    config.scenario.time_limit = SimDuration::from_ms(50);
    config
}

pub fn configuration(config: &HarnessConfig) -> FilterConfiguration {
    config
        .filter_configuration()
        .expect("Failed to build filter configuration")
}

/// Behavioural core sized for `config`'s filter.
pub fn device_for(config: &HarnessConfig) -> BehavioralFir {
    let format = config.formats.filter_format().expect("Invalid formats");
    BehavioralFir::new(format, configuration(config).n_coeffs())
}

/// Raw 24-bit value of `value` full scale.
pub fn full_scale(value: f64) -> i32 {
    (value * f64::from(1u32 << 23)).round() as i32
}

pub fn values(frames: &[SampleFrame]) -> Vec<i32> {
    frames.iter().map(|f| f.value()).collect()
}
