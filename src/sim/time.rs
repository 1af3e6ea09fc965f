//! Simulated time with picosecond resolution.
//!
//! [`SimTime`] is an instant on the simulation timeline and [`SimDuration`]
//! a span between two instants. All harness timing checks compare these
//! exactly; there is no tolerance.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Picoseconds per nanosecond.
pub const PS_PER_NS: u64 = 1_000;
/// Picoseconds per microsecond.
pub const PS_PER_US: u64 = 1_000_000;
/// Picoseconds per millisecond.
pub const PS_PER_MS: u64 = 1_000_000_000;

/// A point on the simulation timeline, in picoseconds since start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(u64);

/// A span of simulated time, in picoseconds.
///
/// Parses from strings such as `"20ns"`, `"1us"` or `"500ps"`; a bare
/// number is taken as picoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct SimDuration(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub fn from_ps(ps: u64) -> Self {
        Self(ps)
    }

    pub fn as_ps(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, saturating at zero.
    pub fn since(&self, earlier: SimTime) -> SimDuration {
        SimDuration(self.0.saturating_sub(earlier.0))
    }
}

impl SimDuration {
    pub const ZERO: SimDuration = SimDuration(0);

    pub const fn from_ps(ps: u64) -> Self {
        Self(ps)
    }

    pub const fn from_ns(ns: u64) -> Self {
        Self(ns * PS_PER_NS)
    }

    pub const fn from_us(us: u64) -> Self {
        Self(us * PS_PER_US)
    }

    pub const fn from_ms(ms: u64) -> Self {
        Self(ms * PS_PER_MS)
    }

    pub fn as_ps(&self) -> u64 {
        self.0
    }

    /// Rate in hertz of a clock with this period.
    pub fn as_hz(&self) -> f64 {
        1.0e12 / self.0 as f64
    }
}

impl Add<SimDuration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimDuration) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl Sub for SimTime {
    type Output = SimDuration;

    fn sub(self, rhs: SimTime) -> SimDuration {
        debug_assert!(self >= rhs, "negative duration: {} - {}", self, rhs);
        SimDuration(self.0 - rhs.0)
    }
}

impl Add for SimDuration {
    type Output = SimDuration;

    fn add(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0 + rhs.0)
    }
}

impl Sub for SimDuration {
    type Output = SimDuration;

    fn sub(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0.saturating_sub(rhs.0))
    }
}

impl Div<u64> for SimDuration {
    type Output = SimDuration;

    fn div(self, rhs: u64) -> SimDuration {
        SimDuration(self.0 / rhs)
    }
}

impl Mul<u64> for SimDuration {
    type Output = SimDuration;

    fn mul(self, rhs: u64) -> SimDuration {
        SimDuration(self.0 * rhs)
    }
}

fn format_ps(ps: u64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if ps == 0 {
        write!(f, "0 ps")
    } else if ps >= PS_PER_MS && ps.is_multiple_of(PS_PER_MS) {
        write!(f, "{} ms", ps / PS_PER_MS)
    } else if ps >= PS_PER_US && ps.is_multiple_of(PS_PER_US) {
        write!(f, "{} us", ps / PS_PER_US)
    } else if ps >= PS_PER_NS && ps.is_multiple_of(PS_PER_NS) {
        write!(f, "{} ns", ps / PS_PER_NS)
    } else {
        write!(f, "{ps} ps")
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_ps(self.0, f)
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_ps(self.0, f)
    }
}

impl FromStr for SimDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let units: [(&str, u64); 5] = [
            ("ps", 1),
            ("ns", PS_PER_NS),
            ("us", PS_PER_US),
            ("μs", PS_PER_US),
            ("ms", PS_PER_MS),
        ];

        let (num, scale) = units
            .iter()
            .find_map(|(suffix, scale)| s.strip_suffix(suffix).map(|n| (n, *scale)))
            .unwrap_or((s, 1));

        let value: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid duration: {}", s))?;
        if value == 0 {
            return Err("duration must be positive".to_string());
        }
        value
            .checked_mul(scale)
            .map(SimDuration)
            .ok_or_else(|| format!("duration out of range: {}", s))
    }
}

impl TryFrom<String> for SimDuration {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("20ns".parse::<SimDuration>().unwrap(), SimDuration::from_ns(20));
        assert_eq!("1us".parse::<SimDuration>().unwrap(), SimDuration::from_us(1));
        assert_eq!("1μs".parse::<SimDuration>().unwrap(), SimDuration::from_us(1));
        assert_eq!("500 ps".parse::<SimDuration>().unwrap(), SimDuration::from_ps(500));
        assert_eq!("3ms".parse::<SimDuration>().unwrap(), SimDuration::from_ms(3));
        assert_eq!("640000".parse::<SimDuration>().unwrap(), SimDuration::from_ps(640_000));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("abc".parse::<SimDuration>().is_err());
        assert!("0ns".parse::<SimDuration>().is_err());
        assert!("-5us".parse::<SimDuration>().is_err());
    }

    #[test]
    fn test_display_picks_largest_exact_unit() {
        assert_eq!(SimDuration::from_ns(20).to_string(), "20 ns");
        assert_eq!(SimDuration::from_ps(640_000).to_string(), "640 ns");
        assert_eq!(SimDuration::from_ps(163_840_000).to_string(), "163840 ns");
        assert_eq!(SimDuration::from_us(1).to_string(), "1 us");
        assert_eq!(SimTime::from_ps(1500).to_string(), "1500 ps");
    }

    #[test]
    fn test_arithmetic() {
        let t = SimTime::from_ps(1000) + SimDuration::from_ns(2);
        assert_eq!(t.as_ps(), 3000);
        assert_eq!(t - SimTime::from_ps(1000), SimDuration::from_ns(2));
        assert_eq!(SimDuration::from_ns(20) * 4, SimDuration::from_ns(80));
        assert_eq!(SimTime::ZERO.since(t), SimDuration::ZERO);
    }
}
