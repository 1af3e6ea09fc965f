use anyhow::{Context, Result};
use clap::Parser;
use firbench::config::StimulusKind;
use firbench::filter::SampleFrame;
use firbench::output::{OutputFormat, ScenarioSummary, create_formatter};
use firbench::simulation::{BehavioralFir, Fault, generate_stimulus};
use firbench::timing::ClockTimingExpectation;
use firbench::{HarnessConfig, Scenario, ScenarioReport, load_wav, save_wav};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "firbench")]
#[command(about = "Run a verification scenario against the behavioural FIR filter core")]
struct Args {
    /// TOML harness configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Clock divider selection, 0-7 (overrides config)
    #[arg(long)]
    clock_select: Option<u8>,

    /// Antisymmetric impulse response (overrides config)
    #[arg(long)]
    antisymmetric: bool,

    /// Stimulus kind (overrides config)
    #[arg(short, long, value_enum)]
    stimulus: Option<StimulusKind>,

    /// Number of input samples (overrides config)
    #[arg(short, long)]
    length: Option<usize>,

    /// Stimulus seed (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Read input samples from a WAV file instead of generating them
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Frames of output latency in the behavioural core
    #[arg(long, default_value_t = 1)]
    latency: usize,

    /// Frames the harness allows between input and output (overrides config)
    #[arg(long)]
    pipeline_delay: Option<usize>,

    /// Inject a defect into the behavioural core
    #[arg(long, value_enum)]
    fault: Vec<Fault>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Show bitstream and clock details
    #[arg(short, long)]
    verbose: bool,

    /// Write <prefix>_input.wav, <prefix>_expected.wav and <prefix>_observed.wav
    #[arg(long)]
    wav: Option<String>,

    /// Dump every signal change to a VCD file
    #[arg(long)]
    vcd: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(cs) = args.clock_select {
        config.filter.clock_select = cs;
    }
    if args.antisymmetric {
        config.filter.symmetric = false;
    }
    if let Some(kind) = args.stimulus {
        config.stimulus.kind = kind;
    }
    if let Some(length) = args.length {
        config.stimulus.length = length;
    }
    if args.seed.is_some() {
        config.stimulus.seed = args.seed;
    }
    if let Some(delay) = args.pipeline_delay {
        config.scenario.pipeline_delay = delay;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn save_captures(prefix: &str, report: &ScenarioReport, sample_rate: u32) -> Result<()> {
    let comparison = &report.comparison;
    let files: [(&str, &[SampleFrame]); 3] = [
        ("input", &comparison.inputs),
        ("expected", &comparison.expected),
        ("observed", comparison.aligned_observed()),
    ];
    for (suffix, frames) in files {
        let path = PathBuf::from(format!("{}_{}.wav", prefix, suffix));
        save_wav(&path, frames, sample_rate)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {} samples to {}", frames.len(), path.display());
    }
    Ok(())
}

fn write_vcd(scenario: &Scenario, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    scenario
        .write_vcd(BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote waveforms to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let configuration = config
        .filter_configuration()
        .context("Failed to build filter configuration")?;

    let inputs = match &args.input {
        Some(path) => {
            load_wav(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => generate_stimulus(&config.stimulus).context("Failed to generate stimulus")?,
    };

    let format = config.formats.filter_format()?;
    let mut device =
        BehavioralFir::new(format, configuration.n_coeffs()).with_latency(args.latency);
    for &fault in &args.fault {
        device = device.with_fault(fault);
    }

    let mut scenario = Scenario::new(&config, device).context("Failed to set up scenario")?;
    if args.vcd.is_some() {
        scenario.enable_trace();
    }

    let result = scenario.run(&configuration, &inputs);

    if let Some(path) = &args.vcd {
        write_vcd(&scenario, path)?;
    }

    if let (Some(prefix), Ok(report)) = (&args.wav, &result) {
        let expectation = ClockTimingExpectation::from_clock_select(
            configuration.clock_select(),
            config.clocks.main_period,
        );
        save_captures(prefix, report, expectation.sample_rate_hz())?;
    }

    let summary = ScenarioSummary::new(&configuration, config.clocks.main_period, &result);
    let formatter = create_formatter(args.format, args.verbose);
    println!("{}", formatter.format(&summary));

    if !summary.passed {
        std::process::exit(1);
    }
    Ok(())
}
