mod common;

use firbench::config::StimulusKind;
use firbench::filter::SampleFrame;
use firbench::simulation::{Fault, generate_stimulus, impulse};
use firbench::{HarnessError, Scenario, run_scenario};

#[test]
fn test_uniform_noise_steady_state() {
    let config = common::fast_config(0);
    let configuration = common::configuration(&config);
    let inputs = generate_stimulus(&config.stimulus).unwrap();

    let report = run_scenario(&config, common::device_for(&config), &configuration, &inputs)
        .expect("Scenario should pass");

    let comparison = &report.comparison;
    assert_eq!(comparison.inputs, inputs);
    assert_eq!(comparison.expected.len(), inputs.len());
    assert_eq!(comparison.observed.len(), inputs.len() + 1);
    assert_eq!(comparison.aligned_observed(), comparison.expected.as_slice());
    assert!(
        comparison.expected.iter().any(|f| *f != SampleFrame::ZERO),
        "Noise should produce a non-trivial response"
    );
    assert_eq!(report.bitstream.len(), 7);
    assert!(report.finished_at.as_ps() > 0);
}

#[test]
fn test_designed_filter_with_gaussian_noise() {
    let mut config = common::fast_config(1);
    config.filter.coefficients = None;
    config.stimulus.kind = StimulusKind::Gaussian;
    config.stimulus.amplitude = 0.3;
    config.stimulus.length = 40;
    config.stimulus.seed = Some(42);
    let configuration = common::configuration(&config);
    let inputs = generate_stimulus(&config.stimulus).unwrap();

    let report = run_scenario(&config, common::device_for(&config), &configuration, &inputs)
        .expect("Scenario should pass");
    assert_eq!(report.configuration.n_coeffs(), 16);
    assert_eq!(report.comparison.expected.len(), 40);
}

#[test]
fn test_impulse_response_is_mirrored_coefficients() {
    for (symmetric, tail) in [(true, [0.25, -0.125, 0.0625]), (false, [0.25, 0.125, -0.0625])] {
        let mut config = common::fast_config(0);
        config.filter.symmetric = symmetric;
        let configuration = common::configuration(&config);
        let inputs = impulse(10, 0.5);

        let report = run_scenario(&config, common::device_for(&config), &configuration, &inputs)
            .expect("Scenario should pass");

        // one frame of model latency, then 0.5 * h[k]
        let response = [0.0, 0.0625, -0.125, tail[0], tail[1], tail[2], 0.0, 0.0, 0.0, 0.0];
        let expected: Vec<i32> = response.iter().map(|&v| common::full_scale(v)).collect();
        assert_eq!(common::values(&report.comparison.expected), expected);
        assert_eq!(
            common::values(report.comparison.aligned_observed()),
            expected
        );
    }
}

#[test]
fn test_pipeline_delay_must_match_latency() {
    let mut config = common::fast_config(0);
    config.stimulus.length = 16;
    let configuration = common::configuration(&config);
    let inputs = generate_stimulus(&config.stimulus).unwrap();

    config.scenario.pipeline_delay = 2;
    let device = common::device_for(&config).with_latency(2);
    let report = run_scenario(&config, device, &configuration, &inputs)
        .expect("Matching delay should pass");
    assert_eq!(report.comparison.observed.len(), 18);

    config.scenario.pipeline_delay = 1;
    let device = common::device_for(&config).with_latency(2);
    let result = run_scenario(&config, device, &configuration, &inputs);
    assert!(
        matches!(result, Err(HarnessError::ResponseMismatch { .. })),
        "Expected mismatch, got {:?}",
        result.map(|r| r.finished_at)
    );
}

#[test]
fn test_stuck_output_bit_is_caught() {
    let config = common::fast_config(0);
    let configuration = common::configuration(&config);
    let inputs = generate_stimulus(&config.stimulus).unwrap();
    let device = common::device_for(&config).with_fault(Fault::StuckOutputBit);

    let result = run_scenario(&config, device, &configuration, &inputs);
    assert!(matches!(
        result,
        Err(HarnessError::ResponseMismatch {
            index: 0,
            expected: 0,
            observed: 1
        })
    ));
}

#[test]
fn test_accumulator_wrap_is_caught() {
    let mut config = common::fast_config(0);
    config.filter.coefficients = Some(vec![0.75, 0.75]);
    config.stimulus.kind = StimulusKind::Step;
    config.stimulus.length = 8;
    let configuration = common::configuration(&config);
    let inputs = generate_stimulus(&config.stimulus).unwrap();
    let device = common::device_for(&config).with_fault(Fault::WrapOnOverflow);

    // 1.5 of full scale: the model saturates, the faulty core wraps
    let result = run_scenario(&config, device, &configuration, &inputs);
    match result {
        Err(HarnessError::ResponseMismatch {
            index,
            expected,
            observed,
        }) => {
            assert_eq!(index, 2);
            assert_eq!(expected, 0x7F_FF00);
            assert!(observed < 0);
        }
        other => panic!("Expected mismatch, got {:?}", other.map(|r| r.finished_at)),
    }

    // the same stimulus through a healthy core saturates like the model
    let device = common::device_for(&config);
    let report = run_scenario(&config, device, &configuration, &inputs).unwrap();
    assert_eq!(report.comparison.expected[7].value(), 0x7F_FF00);
}

#[test]
fn test_ignored_symmetry_flag_is_caught() {
    let mut config = common::fast_config(0);
    config.filter.symmetric = false;
    let configuration = common::configuration(&config);
    let inputs = impulse(8, 0.5);
    let device = common::device_for(&config).with_fault(Fault::IgnoreSymmetry);

    let result = run_scenario(&config, device, &configuration, &inputs);
    assert!(matches!(
        result,
        Err(HarnessError::ResponseMismatch {
            index: 4,
            expected: 1_048_576,
            observed: -1_048_576
        })
    ));
}

#[test]
fn test_consecutive_runs_share_timeline() {
    let config = common::fast_config(0);
    let configuration = common::configuration(&config);
    let inputs = impulse(6, 0.25);

    let mut scenario = Scenario::new(&config, common::device_for(&config)).unwrap();
    let first = scenario.run(&configuration, &inputs).unwrap();
    let second = scenario
        .run(&configuration.with_symmetric(false), &inputs)
        .unwrap();

    assert!(second.finished_at > first.finished_at);
    assert!(!second.configuration.symmetric());
}

#[test]
fn test_vcd_trace_records_bus_signals() {
    let mut config = common::fast_config(0);
    config.stimulus.length = 4;
    let configuration = common::configuration(&config);
    let inputs = generate_stimulus(&config.stimulus).unwrap();

    let mut scenario = Scenario::new(&config, common::device_for(&config)).unwrap();
    scenario.enable_trace();
    scenario.run(&configuration, &inputs).unwrap();

    let mut vcd = Vec::new();
    scenario.write_vcd(&mut vcd).unwrap();
    let vcd = String::from_utf8(vcd).unwrap();
    assert!(vcd.starts_with("$timescale 1ps $end"));
    for name in ["clk", "spi_mosi", "i2s_lrclk", "i2s_dout"] {
        assert!(vcd.contains(name), "{} missing from trace", name);
    }
}
