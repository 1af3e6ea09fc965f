//! Filter configuration and the golden model
//!
//! - [`configuration`]: what gets programmed into the core
//! - [`encoder`]: configuration bitstream
//! - [`reference`]: bit-exact reference model
//! - [`design`]: coefficient design and quantisation
//! - [`sample`]: audio bus sample type

pub mod configuration;
pub mod design;
pub mod encoder;
pub mod reference;
pub mod sample;

pub use configuration::{ClockSelect, FilterConfiguration, FilterFormat};
pub use design::{CoefficientDesign, ResponseShape, design, quantize};
pub use encoder::ConfigurationEncoder;
pub use reference::{FirReferenceModel, TapDelayLine};
pub use sample::{SAMPLE_FORMAT, SampleFrame};
