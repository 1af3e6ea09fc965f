pub mod bus;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod filter;
pub mod fixed;
pub mod output;
pub mod scenario;
pub mod sim;
pub mod timing;
pub mod wav;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use scenario::{Scenario, ScenarioOrchestrator, ScenarioReport, run_scenario};
pub use wav::{load_wav, save_wav};
