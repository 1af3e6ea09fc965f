//! Protocol and timing constants
//!
//! Fixed properties of the filter core's pin interface. Anything a test
//! scenario may reasonably vary lives in [`crate::config`] instead.

use crate::sim::SimDuration;

/// Main system clock period (50 MHz).
pub const MAIN_CLOCK_PERIOD: SimDuration = SimDuration::from_ns(20);

/// Configuration bus serial clock period (1 MHz, 50% duty).
pub const SPI_CLOCK_PERIOD: SimDuration = SimDuration::from_us(1);

/// Width of the clock-divider selection field in the configuration bitstream.
pub const CLOCK_SELECT_BITS: u32 = 3;

/// Width of one audio sample on the I2S bus.
pub const FRAME_BITS: u32 = 24;

/// Master-clock-equivalent periods per bit-clock period.
pub const BIT_CLOCK_RATIO: u64 = 4;

/// Bit-clock periods per frame (both channel slots).
pub const FRAME_CLOCK_RATIO: u64 = 64;

/// Main-clock cycles per master-clock period for a divider selection.
pub fn master_divider(clock_select: u8) -> u64 {
    2u64 << clock_select
}
