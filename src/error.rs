use thiserror::Error;

use crate::fixed::QFormat;
use crate::sim::{SimDuration, SimTime};
use crate::timing::DerivedClock;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration encoding error: {field} = {value} does not fit {bits} bits")]
    ConfigurationEncoding {
        field: String,
        value: String,
        bits: u32,
    },

    #[error("Bitstream length: expected {expected} bytes, got {actual}")]
    BitstreamLength { expected: usize, actual: usize },

    #[error("Protocol timing error on {bus}: edge expected at {expected}, observed at {observed}")]
    ProtocolTiming {
        bus: &'static str,
        expected: SimTime,
        observed: SimTime,
    },

    #[error("Frame sync lost on {bus}: frame clock low after bit {bit} at {at}")]
    FrameSync {
        bus: &'static str,
        bit: u32,
        at: SimTime,
    },

    #[error("Clock timing error on {clock}: expected period {expected}, measured {measured} (edge at {at})")]
    ClockTiming {
        clock: DerivedClock,
        expected: SimDuration,
        measured: SimDuration,
        at: SimTime,
    },

    #[error("Response mismatch at sample {index}: expected {expected}, observed {observed}")]
    ResponseMismatch {
        index: usize,
        expected: i32,
        observed: i32,
    },

    #[error("Fixed-point value {value} out of range for {format}")]
    FixedPointRange { value: String, format: QFormat },

    #[error("Fixed-point format error: {0}")]
    FixedPointFormat(String),

    #[error("Simulation timed out at {0}")]
    Timeout(SimTime),

    #[error("Simulation stalled at {0}: no pending events")]
    Stalled(SimTime),

    #[error("Filter design failed: {0}")]
    FilterDesign(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
