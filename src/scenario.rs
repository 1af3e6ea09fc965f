//! Reset, configure, check clocks, compare
//!
//! [`ScenarioOrchestrator`] sequences one verification run from inside the
//! simulation. [`Scenario`] owns the simulator, the pins and the attached
//! device, and runs orchestrated futures to completion from ordinary code.

use std::io::Write;

use log::{debug, info};

use crate::bus::{DutPins, I2sReceiver, I2sSender, SerialAudioBus, SerialConfigBus};
use crate::config::{ClockConfig, HarnessConfig, ScenarioConfig};
use crate::device::{self, Device};
use crate::error::{HarnessError, Result};
use crate::filter::{
    ConfigurationEncoder, FilterConfiguration, FilterFormat, FirReferenceModel, SampleFrame,
};
use crate::sim::{Clock, JoinHandle, Sim, SimDuration, SimTime, Simulator};
use crate::timing::{ClockTimingExpectation, ClockTimingOracle, TimingReport};

/// Inputs and outputs of the compare phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseComparison {
    pub pipeline_delay: usize,
    pub inputs: Vec<SampleFrame>,
    /// Reference model output, one per input
    pub expected: Vec<SampleFrame>,
    /// Every frame read from the device, `inputs.len() + pipeline_delay`
    pub observed: Vec<SampleFrame>,
}

impl ResponseComparison {
    /// Observed frames aligned with `expected`.
    pub fn aligned_observed(&self) -> &[SampleFrame] {
        &self.observed[self.pipeline_delay.min(self.observed.len())..]
    }
}

/// Everything a passing scenario produced.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub configuration: FilterConfiguration,
    pub bitstream: Vec<u8>,
    pub timing: TimingReport,
    pub comparison: ResponseComparison,
    pub finished_at: SimTime,
}

pub struct ScenarioOrchestrator {
    sim: Sim,
    pins: DutPins,
    clocks: ClockConfig,
    scenario: ScenarioConfig,
    format: FilterFormat,
    config_bus: SerialConfigBus,
    active: Option<FilterConfiguration>,
    _main_clock: JoinHandle<()>,
}

impl ScenarioOrchestrator {
    /// Starts the main clock and the configuration bus clock.
    pub fn new(sim: &Sim, pins: DutPins, config: &HarnessConfig) -> Result<Self> {
        let format = config.formats.filter_format()?;
        let main_clock = Clock::new(pins.system.clk, config.clocks.main_period).start(sim);
        let config_bus = SerialConfigBus::new(sim, pins.config, config.clocks.spi_period);
        Ok(Self {
            sim: sim.clone(),
            pins,
            clocks: config.clocks.clone(),
            scenario: config.scenario.clone(),
            format,
            config_bus,
            active: None,
            _main_clock: main_clock,
        })
    }

    /// Configuration sent by the last [`configure`](Self::configure).
    pub fn active_configuration(&self) -> Option<&FilterConfiguration> {
        self.active.as_ref()
    }

    /// Holds `rst_n` low for `reset_cycles`, releases it and waits
    /// `settle_cycles`. The device keeps its configuration.
    pub async fn reset(&self) -> Result<()> {
        let clk = self.pins.system.clk;
        self.sim.set_bit(self.pins.system.rst_n, false);
        self.sim.clock_cycles(clk, self.scenario.reset_cycles).await;
        self.sim.set_bit(self.pins.system.rst_n, true);
        let at = self.sim.clock_cycles(clk, self.scenario.settle_cycles).await;
        debug!("Reset released, settled at {}", at);
        Ok(())
    }

    /// Encodes and sends `configuration`, then waits `settle_cycles`.
    pub async fn configure(&mut self, configuration: &FilterConfiguration) -> Result<Vec<u8>> {
        let bitstream = ConfigurationEncoder::for_configuration(configuration).encode(configuration)?;
        debug!(
            "Configuring {} ({} bytes over SPI)",
            configuration,
            bitstream.len()
        );
        self.config_bus.send(&bitstream).await?;
        self.sim
            .clock_cycles(self.pins.system.clk, self.scenario.settle_cycles)
            .await;
        self.active = Some(configuration.clone());
        Ok(bitstream)
    }

    fn require_active(&self) -> Result<&FilterConfiguration> {
        self.active.as_ref().ok_or_else(|| {
            HarnessError::Config("no configuration has been sent to the device".to_string())
        })
    }

    /// Derived-clock periods implied by the active configuration.
    pub fn expectation(&self) -> Result<ClockTimingExpectation> {
        let active = self.require_active()?;
        Ok(ClockTimingExpectation::from_clock_select(
            active.clock_select(),
            self.clocks.main_period,
        ))
    }

    pub async fn check_clocks(&self) -> Result<TimingReport> {
        let expectation = self.expectation()?;
        let oracle =
            ClockTimingOracle::new(&self.sim, self.pins.audio, self.scenario.timing_periods);
        oracle.check(&expectation).await
    }

    /// Streams `inputs` through the device while reading its output, and
    /// checks every output against the reference model.
    ///
    /// # Errors
    /// `ResponseMismatch` at the first differing output, indexed by the
    /// input that produced it; bus errors from either direction.
    pub async fn compare(&self, inputs: &[SampleFrame]) -> Result<ResponseComparison> {
        let active = self.require_active()?;
        let expectation = self.expectation()?;
        let model = FirReferenceModel::new(active, self.format)?;
        let delay = self.scenario.pipeline_delay;

        let (sender, receiver) =
            SerialAudioBus::new(&self.sim, self.pins.audio, expectation.bit_clock_period).split();
        let send = self.sim.spawn(send_all(sender, inputs.to_vec()));
        let receive = self
            .sim
            .spawn(receive_and_check(receiver, model, inputs.to_vec(), delay));

        let (expected, observed) = receive.await?;
        send.await?;
        debug!("Compared {} samples, delay {}", inputs.len(), delay);

        Ok(ResponseComparison {
            pipeline_delay: delay,
            inputs: inputs.to_vec(),
            expected,
            observed,
        })
    }

    /// Full scenario: reset, configure, timing check, compare.
    pub async fn run(
        &mut self,
        configuration: &FilterConfiguration,
        inputs: &[SampleFrame],
    ) -> Result<ScenarioReport> {
        info!("Scenario: {}, {} samples", configuration, inputs.len());
        self.reset().await?;
        let bitstream = self.configure(configuration).await?;
        let timing = self.check_clocks().await?;
        let comparison = self.compare(inputs).await?;
        let finished_at = self.sim.now();
        info!("Scenario passed at {}", finished_at);

        Ok(ScenarioReport {
            configuration: configuration.clone(),
            bitstream,
            timing,
            comparison,
            finished_at,
        })
    }

    /// Repeats reset followed by a timing check `repeats` times against the
    /// active configuration.
    pub async fn run_reset_cycles(&self, repeats: u32) -> Result<Vec<TimingReport>> {
        let mut reports = Vec::with_capacity(repeats as usize);
        for cycle in 0..repeats {
            self.reset().await?;
            reports.push(self.check_clocks().await?);
            debug!("Reset cycle {} ok", cycle + 1);
        }
        Ok(reports)
    }
}

async fn send_all(sender: I2sSender, inputs: Vec<SampleFrame>) -> Result<()> {
    sender.send_all(&inputs).await
}

async fn receive_and_check(
    receiver: I2sReceiver,
    mut model: FirReferenceModel,
    inputs: Vec<SampleFrame>,
    delay: usize,
) -> Result<(Vec<SampleFrame>, Vec<SampleFrame>)> {
    let mut expected = Vec::with_capacity(inputs.len());
    let mut observed = Vec::with_capacity(inputs.len() + delay);

    for j in 0..inputs.len() + delay {
        let frame = receiver.receive().await?;
        observed.push(frame);
        if j < delay {
            continue;
        }
        let index = j - delay;
        let reference = model.process(inputs[index])?;
        expected.push(reference);
        if frame != reference {
            return Err(HarnessError::ResponseMismatch {
                index,
                expected: reference.value(),
                observed: frame.value(),
            });
        }
    }
    Ok((expected, observed))
}

/// A simulator with the filter core's pins declared, a device attached and
/// an orchestrator driving it. Successive runs continue on the same
/// timeline.
pub struct Scenario {
    simulator: Simulator,
    pins: DutPins,
    time_limit: SimDuration,
    orchestrator: Option<ScenarioOrchestrator>,
}

impl Scenario {
    pub fn new<D: Device + 'static>(config: &HarnessConfig, device: D) -> Result<Self> {
        config.validate()?;
        let simulator = Simulator::new();
        let sim = simulator.handle();
        let pins = DutPins::declare(&sim);
        device::attach(&sim, pins, device);
        let orchestrator = ScenarioOrchestrator::new(&sim, pins, config)?;
        Ok(Self {
            simulator,
            pins,
            time_limit: config.scenario.time_limit,
            orchestrator: Some(orchestrator),
        })
    }

    pub fn sim(&self) -> Sim {
        self.simulator.handle()
    }

    pub fn pins(&self) -> DutPins {
        self.pins
    }

    /// Records every signal change from now on, for [`write_vcd`](Self::write_vcd).
    pub fn enable_trace(&self) {
        self.simulator.handle().enable_trace();
    }

    pub fn write_vcd<W: Write>(&self, writer: W) -> Result<()> {
        self.simulator.handle().write_vcd(writer)
    }

    /// A run that timed out or stalled leaves its orchestrator inside the
    /// abandoned task.
    fn take_orchestrator(&mut self) -> Result<ScenarioOrchestrator> {
        self.orchestrator.take().ok_or_else(|| {
            HarnessError::Config("scenario was abandoned by an earlier run".to_string())
        })
    }

    /// Runs a full scenario within the configured time limit.
    pub fn run(
        &mut self,
        configuration: &FilterConfiguration,
        inputs: &[SampleFrame],
    ) -> Result<ScenarioReport> {
        let mut orchestrator = self.take_orchestrator()?;
        let configuration = configuration.clone();
        let inputs = inputs.to_vec();
        let (orchestrator, result) = self.simulator.run(
            async move {
                let result = orchestrator.run(&configuration, &inputs).await;
                (orchestrator, result)
            },
            self.time_limit,
        )?;
        self.orchestrator = Some(orchestrator);
        result
    }

    /// Resets and configures the device once, then runs `repeats` reset and
    /// timing-check cycles.
    pub fn run_reset_cycles(
        &mut self,
        configuration: &FilterConfiguration,
        repeats: u32,
    ) -> Result<Vec<TimingReport>> {
        let mut orchestrator = self.take_orchestrator()?;
        let configuration = configuration.clone();
        let (orchestrator, result) = self.simulator.run(
            async move {
                let result = async {
                    orchestrator.reset().await?;
                    orchestrator.configure(&configuration).await?;
                    orchestrator.run_reset_cycles(repeats).await
                }
                .await;
                (orchestrator, result)
            },
            self.time_limit,
        )?;
        self.orchestrator = Some(orchestrator);
        result
    }
}

/// Runs one full scenario against `device` in a fresh simulator.
pub fn run_scenario<D: Device + 'static>(
    config: &HarnessConfig,
    device: D,
    configuration: &FilterConfiguration,
    inputs: &[SampleFrame],
) -> Result<ScenarioReport> {
    Scenario::new(config, device)?.run(configuration, inputs)
}
