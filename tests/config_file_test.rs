mod common;

use std::path::Path;

use firbench::config::StimulusKind;
use firbench::filter::ConfigurationEncoder;
use firbench::sim::SimDuration;
use firbench::simulation::generate_stimulus;
use firbench::{HarnessConfig, HarnessError, load_wav, save_wav};

#[test]
fn test_example_config_loads() {
    let config = HarnessConfig::load(Path::new("configs/example.toml")).unwrap();
    assert_eq!(config.clocks.main_period, SimDuration::from_ns(20));
    assert_eq!(config.scenario.time_limit, SimDuration::from_ms(2000));
    assert_eq!(config.stimulus.kind, StimulusKind::Uniform);

    let configuration = config.filter_configuration().unwrap();
    assert_eq!(configuration.n_coeffs(), 16);
    assert_eq!(configuration.n_taps(), 31);
    let bitstream = ConfigurationEncoder::for_configuration(&configuration)
        .encode(&configuration)
        .unwrap();
    assert_eq!(bitstream.len(), 33);
}

#[test]
fn test_missing_config_is_io_error() {
    let result = HarnessConfig::load(Path::new("configs/does_not_exist.toml"));
    assert!(matches!(result, Err(HarnessError::Io(_))));
}

#[test]
fn test_stimulus_survives_wav_capture() {
    let mut config = common::fast_config(0);
    config.stimulus.kind = StimulusKind::Sine;
    config.stimulus.length = 100;
    let inputs = generate_stimulus(&config.stimulus).unwrap();

    let path = std::env::temp_dir().join(format!("firbench_stimulus_{}.wav", std::process::id()));
    save_wav(&path, &inputs, 48_000).unwrap();
    let loaded = load_wav(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, inputs);
}
