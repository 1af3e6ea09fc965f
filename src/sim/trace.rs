use std::io::{self, Write};

use super::kernel::{Signal, SignalId};
use super::time::SimTime;

/// Recorded signal changes, in the order they happened.
#[derive(Default)]
pub(super) struct SignalTrace {
    changes: Vec<(SimTime, SignalId, u64)>,
}

impl SignalTrace {
    pub(super) fn record(&mut self, at: SimTime, signal: SignalId, value: u64) {
        self.changes.push((at, signal, value));
    }

    /// Writes a Value Change Dump with a 1 ps timescale.
    pub(super) fn write_vcd<W: Write>(&self, signals: &[Signal], mut w: W) -> io::Result<()> {
        writeln!(w, "$timescale 1ps $end")?;
        writeln!(w, "$scope module harness $end")?;
        for (index, signal) in signals.iter().enumerate() {
            writeln!(
                w,
                "$var wire {} {} {} $end",
                signal.width,
                vcd_identifier(index),
                signal.name
            )?;
        }
        writeln!(w, "$upscope $end")?;
        writeln!(w, "$enddefinitions $end")?;

        let mut current: Option<SimTime> = None;
        for &(at, signal, value) in &self.changes {
            if current != Some(at) {
                writeln!(w, "#{}", at.as_ps())?;
                current = Some(at);
            }
            let id = vcd_identifier(signal.index());
            if signals[signal.index()].width == 1 {
                writeln!(w, "{}{}", value & 1, id)?;
            } else {
                writeln!(w, "b{:b} {}", value, id)?;
            }
        }
        w.flush()
    }
}

/// Short printable identifier code (`!`, `"`, ... `~`, `!!`, ...).
fn vcd_identifier(mut index: usize) -> String {
    const FIRST: u8 = b'!';
    const RADIX: usize = (b'~' - b'!' + 1) as usize;

    let mut id = Vec::new();
    loop {
        id.push(FIRST + (index % RADIX) as u8);
        index /= RADIX;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    String::from_utf8(id).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_unique() {
        let ids: std::collections::HashSet<String> = (0..500).map(vcd_identifier).collect();
        assert_eq!(ids.len(), 500);
        assert_eq!(vcd_identifier(0), "!");
        assert_eq!(vcd_identifier(93), "~");
        assert_eq!(vcd_identifier(94), "!!");
    }
}
