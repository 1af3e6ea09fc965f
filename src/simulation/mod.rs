//! Stand-ins for the hardware: a behavioural filter core and input
//! sequences to drive it with.

mod device;
mod stimulus;

pub use device::{BehavioralFir, Fault};
pub use stimulus::{
    gaussian_noise, generate_stimulus, impulse, sine, to_frame, uniform_noise,
};
