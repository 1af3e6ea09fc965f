//! Simulated-time kernel the harness runs on
//!
//! Stands in for an HDL simulator's scheduler: signals with edge
//! notification, timers, task spawning and free-running clock drivers.

mod clock;
mod kernel;
mod time;
mod trace;

pub use clock::Clock;
pub use kernel::{Edge, EdgeWait, JoinHandle, SignalId, Sim, Simulator, Timer};
pub use time::{PS_PER_MS, PS_PER_NS, PS_PER_US, SimDuration, SimTime};
