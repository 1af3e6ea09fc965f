use super::kernel::{JoinHandle, SignalId, Sim};
use super::time::SimDuration;

/// Free-running 50% duty clock driver, starting high.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    signal: SignalId,
    period: SimDuration,
}

impl Clock {
    pub fn new(signal: SignalId, period: SimDuration) -> Self {
        debug_assert!(period.as_ps() >= 2, "clock period too short: {}", period);
        Self { signal, period }
    }

    pub fn period(&self) -> SimDuration {
        self.period
    }

    /// Spawns the driver task. It runs until the simulator is dropped.
    pub fn start(self, sim: &Sim) -> JoinHandle<()> {
        sim.spawn(drive(sim.clone(), self))
    }
}

async fn drive(sim: Sim, clock: Clock) {
    let high = clock.period / 2;
    let low = clock.period - high;
    loop {
        sim.set_bit(clock.signal, true);
        sim.timer(high).await;
        sim.set_bit(clock.signal, false);
        sim.timer(low).await;
    }
}
