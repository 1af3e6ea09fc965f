//! Derived-clock timing oracle
//!
//! The device divides the main clock down to a master clock, then by 4 to
//! the bit clock and by 64 again to the frame clock. The oracle measures
//! rising-to-rising intervals of all three concurrently and requires an
//! exact match with the values implied by the programmed `clock_select`.

use std::fmt;

use log::debug;

use crate::bus::AudioBusPins;
use crate::constants::{BIT_CLOCK_RATIO, FRAME_CLOCK_RATIO};
use crate::error::{HarnessError, Result};
use crate::filter::ClockSelect;
use crate::sim::{Sim, SignalId, SimDuration, SimTime};

/// Clocks the device derives from the main clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedClock {
    Master,
    Bit,
    Frame,
}

impl DerivedClock {
    pub const ALL: [DerivedClock; 3] = [DerivedClock::Master, DerivedClock::Bit, DerivedClock::Frame];

    pub fn pin(&self, pins: &AudioBusPins) -> SignalId {
        match self {
            DerivedClock::Master => pins.mclk,
            DerivedClock::Bit => pins.bclk,
            DerivedClock::Frame => pins.lrclk,
        }
    }
}

impl fmt::Display for DerivedClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DerivedClock::Master => "i2s_mclk",
            DerivedClock::Bit => "i2s_bclk",
            DerivedClock::Frame => "i2s_lrclk",
        };
        write!(f, "{}", name)
    }
}

/// Periods the derived clocks must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTimingExpectation {
    pub master_period: SimDuration,
    pub bit_clock_period: SimDuration,
    pub frame_period: SimDuration,
}

impl ClockTimingExpectation {
    pub fn from_clock_select(clock_select: ClockSelect, main_period: SimDuration) -> Self {
        let master_period = main_period * clock_select.master_divider();
        let bit_clock_period = master_period * BIT_CLOCK_RATIO;
        Self {
            master_period,
            bit_clock_period,
            frame_period: bit_clock_period * FRAME_CLOCK_RATIO,
        }
    }

    pub fn period(&self, clock: DerivedClock) -> SimDuration {
        match clock {
            DerivedClock::Master => self.master_period,
            DerivedClock::Bit => self.bit_clock_period,
            DerivedClock::Frame => self.frame_period,
        }
    }

    /// Frame rate of the audio bus in whole hertz.
    pub fn sample_rate_hz(&self) -> u32 {
        self.frame_period.as_hz().round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockMeasurement {
    pub clock: DerivedClock,
    pub period: SimDuration,
    /// First rising edge of the measurement window
    pub first_edge: SimTime,
    pub periods: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    pub expectation: ClockTimingExpectation,
    pub measurements: Vec<ClockMeasurement>,
}

pub struct ClockTimingOracle {
    sim: Sim,
    pins: AudioBusPins,
    periods: u32,
}

impl ClockTimingOracle {
    /// Measures `periods` full periods of each clock (at least one).
    pub fn new(sim: &Sim, pins: AudioBusPins, periods: u32) -> Self {
        Self {
            sim: sim.clone(),
            pins,
            periods: periods.max(1),
        }
    }

    pub fn periods(&self) -> u32 {
        self.periods
    }

    /// Measures all derived clocks concurrently.
    ///
    /// # Errors
    /// `ClockTiming` for the first clock (master, bit, frame order) with
    /// any period differing from `expectation`.
    pub async fn check(&self, expectation: &ClockTimingExpectation) -> Result<TimingReport> {
        let handles: Vec<_> = DerivedClock::ALL
            .iter()
            .map(|&clock| {
                self.sim.spawn(measure(
                    self.sim.clone(),
                    clock.pin(&self.pins),
                    clock,
                    expectation.period(clock),
                    self.periods,
                ))
            })
            .collect();

        let mut measurements = Vec::with_capacity(handles.len());
        for handle in handles {
            measurements.push(handle.await?);
        }
        debug!(
            "Clock timing ok: mclk {}, bclk {}, lrclk {}",
            expectation.master_period, expectation.bit_clock_period, expectation.frame_period
        );
        Ok(TimingReport {
            expectation: *expectation,
            measurements,
        })
    }
}

async fn measure(
    sim: Sim,
    signal: SignalId,
    clock: DerivedClock,
    expected: SimDuration,
    periods: u32,
) -> Result<ClockMeasurement> {
    let first_edge = sim.rising_edge(signal).await;
    let mut last = first_edge;
    for _ in 0..periods {
        let at = sim.rising_edge(signal).await;
        let measured = at - last;
        if measured != expected {
            return Err(HarnessError::ClockTiming {
                clock,
                expected,
                measured,
                at,
            });
        }
        last = at;
    }
    Ok(ClockMeasurement {
        clock,
        period: expected,
        first_edge,
        periods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DutPins;
    use crate::sim::{Clock, Simulator};

    #[test]
    fn test_expectation_for_clock_select_4() {
        let expectation =
            ClockTimingExpectation::from_clock_select(ClockSelect::new(4).unwrap(), SimDuration::from_ns(20));
        assert_eq!(expectation.master_period.as_ps(), 640_000);
        assert_eq!(expectation.bit_clock_period.as_ps(), 2_560_000);
        assert_eq!(expectation.frame_period.as_ps(), 163_840_000);
        assert_eq!(expectation.sample_rate_hz(), 6104);
    }

    #[test]
    fn test_ratios_hold_for_every_select() {
        for cs in 0..=ClockSelect::MAX {
            let e = ClockTimingExpectation::from_clock_select(
                ClockSelect::new(cs).unwrap(),
                SimDuration::from_ns(20),
            );
            assert_eq!(e.master_period.as_ps(), 20_000 * (2 << cs));
            assert_eq!(e.bit_clock_period, e.master_period * 4);
            assert_eq!(e.frame_period, e.bit_clock_period * 64);
        }
    }

    fn run_oracle(frame_period: SimDuration) -> Result<TimingReport> {
        let simulator = Simulator::new();
        let sim = simulator.handle();
        let pins = DutPins::declare(&sim).audio;
        let expectation = ClockTimingExpectation {
            master_period: SimDuration::from_ns(40),
            bit_clock_period: SimDuration::from_ns(160),
            frame_period: SimDuration::from_ns(160 * 64),
        };
        Clock::new(pins.mclk, expectation.master_period).start(&sim);
        Clock::new(pins.bclk, expectation.bit_clock_period).start(&sim);
        Clock::new(pins.lrclk, frame_period).start(&sim);

        let oracle = ClockTimingOracle::new(&sim, pins, 3);
        simulator
            .run(async move { oracle.check(&expectation).await }, SimDuration::from_ms(1))
            .unwrap()
    }

    #[test]
    fn test_matching_clocks_pass() {
        let report = run_oracle(SimDuration::from_ns(160 * 64)).unwrap();
        assert_eq!(report.measurements.len(), 3);
        assert!(report.measurements.iter().all(|m| m.periods == 3));
        assert_eq!(report.measurements[2].period, SimDuration::from_ns(10_240));
    }

    #[test]
    fn test_wrong_frame_period_is_reported() {
        match run_oracle(SimDuration::from_ns(160 * 32)) {
            Err(HarnessError::ClockTiming {
                clock,
                expected,
                measured,
                ..
            }) => {
                assert_eq!(clock, DerivedClock::Frame);
                assert_eq!(expected, SimDuration::from_ns(10_240));
                assert_eq!(measured, SimDuration::from_ns(5_120));
            }
            other => panic!("expected clock timing error, got {:?}", other),
        }
    }
}
