//! Cooperative executor running futures in simulated time.
//!
//! Tasks are ordinary futures polled on a single thread. They suspend only
//! on [`EdgeWait`], [`Timer`] or [`JoinHandle`]. Simulated time advances by
//! popping the earliest pending timer (ties resolve in scheduling order);
//! every task made ready at that instant runs before the next timer fires.
//!
//! Signal writes take effect immediately and wake edge waiters at the
//! current time. A task woken by an edge therefore observes every value
//! written before the edge and none written after it in the same instant
//! by tasks that have not yet run.

use std::cell::{Cell, RefCell};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::time::{SimDuration, SimTime};
use super::trace::SignalTrace;
use crate::error::{HarnessError, Result};

/// Handle to a signal declared on a [`Sim`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SignalId(usize);

impl SignalId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Transition of bit 0 of a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    /// Any value change.
    Any,
}

type TaskId = usize;
type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

struct EdgeWaiter {
    edge: Edge,
    fired: Rc<Cell<Option<SimTime>>>,
    waker: Waker,
}

pub(super) struct Signal {
    pub(super) name: String,
    pub(super) width: u32,
    value: u64,
    waiters: Vec<EdgeWaiter>,
}

struct TimerEntry {
    at: SimTime,
    seq: u64,
    fired: Rc<Cell<bool>>,
    waker: Waker,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

struct Kernel {
    now: SimTime,
    signals: Vec<Signal>,
    timers: BinaryHeap<Reverse<TimerEntry>>,
    seq: u64,
    trace: Option<SignalTrace>,
}

#[derive(Default)]
struct TaskTable {
    slots: Vec<Option<LocalTask>>,
    free: Vec<TaskId>,
}

impl TaskTable {
    fn insert(&mut self, task: LocalTask) -> TaskId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(task);
                id
            }
            None => {
                self.slots.push(Some(task));
                self.slots.len() - 1
            }
        }
    }

    /// Takes a task out for polling. `None` if it finished or is already
    /// being polled.
    fn take(&mut self, id: TaskId) -> Option<LocalTask> {
        self.slots.get_mut(id).and_then(Option::take)
    }

    fn restore(&mut self, id: TaskId, task: LocalTask) {
        self.slots[id] = Some(task);
    }

    fn release(&mut self, id: TaskId) {
        self.free.push(id);
    }
}

struct Shared {
    kernel: RefCell<Kernel>,
    tasks: RefCell<TaskTable>,
    wake_tx: Sender<TaskId>,
    wake_rx: Receiver<TaskId>,
}

struct TaskWaker {
    id: TaskId,
    queue: Sender<TaskId>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        // The receiver lives as long as the simulator; a send can only fail
        // during teardown, when nothing will be polled again anyway.
        let _ = self.queue.send(self.id);
    }
}

/// Cloneable handle to the simulation kernel, passed into every task.
#[derive(Clone)]
pub struct Sim {
    shared: Rc<Shared>,
}

/// Owner of a simulation. Runs a top-level future to completion and tears
/// down the remaining free-running tasks (clocks, devices) on drop.
pub struct Simulator {
    sim: Sim,
}

impl Simulator {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = unbounded();
        let shared = Shared {
            kernel: RefCell::new(Kernel {
                now: SimTime::ZERO,
                signals: Vec::new(),
                timers: BinaryHeap::new(),
                seq: 0,
                trace: None,
            }),
            tasks: RefCell::new(TaskTable::default()),
            wake_tx,
            wake_rx,
        };
        Self {
            sim: Sim {
                shared: Rc::new(shared),
            },
        }
    }

    pub fn handle(&self) -> Sim {
        self.sim.clone()
    }

    /// Runs `future` until it completes or `limit` of simulated time has
    /// elapsed from now.
    ///
    /// # Errors
    /// `Timeout` when the limit passes first, `Stalled` when no timer is
    /// pending while `future` is still waiting.
    pub fn run<F>(&self, future: F, limit: SimDuration) -> Result<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let sim = &self.sim;
        let deadline = sim.now() + limit;
        let handle = sim.spawn(future);

        loop {
            sim.poll_ready();
            if let Some(output) = handle.try_take() {
                return Ok(output);
            }
            match sim.next_timer_at() {
                None => return Err(HarnessError::Stalled(sim.now())),
                Some(at) if at > deadline => return Err(HarnessError::Timeout(deadline)),
                Some(_) => sim.fire_next_timer(),
            }
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        // Tasks hold `Sim` clones; dropping them outside the borrow breaks
        // the reference cycle back to `Shared`.
        let tasks = std::mem::take(&mut self.sim.shared.tasks.borrow_mut().slots);
        drop(tasks);
        let mut kernel = self.sim.shared.kernel.borrow_mut();
        kernel.timers.clear();
        for signal in kernel.signals.iter_mut() {
            signal.waiters.clear();
        }
    }
}

impl Sim {
    pub fn now(&self) -> SimTime {
        self.shared.kernel.borrow().now
    }

    /// Declares a signal `width` bits wide with an initial value.
    pub fn signal(&self, name: &str, width: u32, initial: u64) -> SignalId {
        let mut kernel = self.shared.kernel.borrow_mut();
        let kernel = &mut *kernel;
        let id = SignalId(kernel.signals.len());
        let value = initial & width_mask(width);
        kernel.signals.push(Signal {
            name: name.to_string(),
            width,
            value,
            waiters: Vec::new(),
        });
        if let Some(trace) = kernel.trace.as_mut() {
            trace.record(kernel.now, id, value);
        }
        id
    }

    pub fn signal_name(&self, id: SignalId) -> String {
        self.shared.kernel.borrow().signals[id.0].name.clone()
    }

    pub fn get(&self, id: SignalId) -> u64 {
        self.shared.kernel.borrow().signals[id.0].value
    }

    pub fn get_bit(&self, id: SignalId) -> bool {
        self.get(id) & 1 == 1
    }

    /// Writes a signal. Unchanged values are ignored; a change wakes every
    /// waiter whose edge matches, stamped with the current time.
    pub fn set(&self, id: SignalId, value: u64) {
        let mut kernel = self.shared.kernel.borrow_mut();
        let kernel = &mut *kernel;
        let now = kernel.now;
        let signal = &mut kernel.signals[id.0];
        let value = value & width_mask(signal.width);
        if signal.value == value {
            return;
        }
        let old = signal.value;
        signal.value = value;

        let rising = old & 1 == 0 && value & 1 == 1;
        let falling = old & 1 == 1 && value & 1 == 0;
        signal.waiters.retain(|waiter| {
            let hit = match waiter.edge {
                Edge::Rising => rising,
                Edge::Falling => falling,
                Edge::Any => true,
            };
            if hit {
                waiter.fired.set(Some(now));
                waiter.waker.wake_by_ref();
            }
            !hit
        });

        if let Some(trace) = kernel.trace.as_mut() {
            trace.record(now, id, value);
        }
    }

    pub fn set_bit(&self, id: SignalId, bit: bool) {
        self.set(id, u64::from(bit));
    }

    /// Future resolving at the next `edge` of `signal`, yielding its time.
    /// Edges that already happened in the current instant do not count.
    pub fn edge(&self, signal: SignalId, edge: Edge) -> EdgeWait {
        EdgeWait {
            sim: self.clone(),
            signal,
            edge,
            fired: None,
        }
    }

    pub fn rising_edge(&self, signal: SignalId) -> EdgeWait {
        self.edge(signal, Edge::Rising)
    }

    pub fn falling_edge(&self, signal: SignalId) -> EdgeWait {
        self.edge(signal, Edge::Falling)
    }

    /// Future resolving `delay` after now.
    pub fn timer(&self, delay: SimDuration) -> Timer {
        Timer {
            sim: self.clone(),
            at: self.now() + delay,
            fired: None,
        }
    }

    /// Waits for `cycles` rising edges of `clock`, returning the time of
    /// the last one (or now, for zero cycles).
    pub async fn clock_cycles(&self, clock: SignalId, cycles: u32) -> SimTime {
        let mut at = self.now();
        for _ in 0..cycles {
            at = self.rising_edge(clock).await;
        }
        at
    }

    /// Schedules `future` as a new task. It first runs at the current
    /// instant, after the spawning task yields.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let state = Rc::new(RefCell::new(JoinState {
            output: None,
            waiter: None,
        }));
        let completion = Rc::clone(&state);
        let task = async move {
            let output = future.await;
            let waiter = {
                let mut state = completion.borrow_mut();
                state.output = Some(output);
                state.waiter.take()
            };
            if let Some(waiter) = waiter {
                waiter.wake();
            }
        };

        let id = self.shared.tasks.borrow_mut().insert(Box::pin(task));
        let _ = self.shared.wake_tx.send(id);
        JoinHandle { state }
    }

    /// Starts recording every signal change for a later VCD dump.
    pub fn enable_trace(&self) {
        let mut kernel = self.shared.kernel.borrow_mut();
        let kernel = &mut *kernel;
        let mut trace = SignalTrace::default();
        for (index, signal) in kernel.signals.iter().enumerate() {
            trace.record(kernel.now, SignalId(index), signal.value);
        }
        kernel.trace = Some(trace);
    }

    /// Writes the recorded trace as a VCD file. Does nothing if tracing was
    /// never enabled.
    pub fn write_vcd<W: Write>(&self, writer: W) -> Result<()> {
        let kernel = self.shared.kernel.borrow();
        if let Some(trace) = kernel.trace.as_ref() {
            trace.write_vcd(&kernel.signals, writer)?;
        }
        Ok(())
    }

    fn register_edge(
        &self,
        signal: SignalId,
        edge: Edge,
        fired: Rc<Cell<Option<SimTime>>>,
        waker: Waker,
    ) {
        self.shared.kernel.borrow_mut().signals[signal.0]
            .waiters
            .push(EdgeWaiter { edge, fired, waker });
    }

    fn register_timer(&self, at: SimTime, fired: Rc<Cell<bool>>, waker: Waker) {
        let mut kernel = self.shared.kernel.borrow_mut();
        let seq = kernel.seq;
        kernel.seq += 1;
        kernel.timers.push(Reverse(TimerEntry {
            at,
            seq,
            fired,
            waker,
        }));
    }

    fn next_timer_at(&self) -> Option<SimTime> {
        self.shared
            .kernel
            .borrow()
            .timers
            .peek()
            .map(|Reverse(entry)| entry.at)
    }

    fn fire_next_timer(&self) {
        let entry = {
            let mut kernel = self.shared.kernel.borrow_mut();
            let Some(Reverse(entry)) = kernel.timers.pop() else {
                return;
            };
            kernel.now = entry.at;
            entry
        };
        entry.fired.set(true);
        entry.waker.wake();
    }

    fn poll_ready(&self) {
        while let Ok(id) = self.shared.wake_rx.try_recv() {
            let Some(mut task) = self.shared.tasks.borrow_mut().take(id) else {
                continue;
            };
            let waker = Waker::from(Arc::new(TaskWaker {
                id,
                queue: self.shared.wake_tx.clone(),
            }));
            let mut cx = Context::from_waker(&waker);
            match task.as_mut().poll(&mut cx) {
                Poll::Ready(()) => self.shared.tasks.borrow_mut().release(id),
                Poll::Pending => self.shared.tasks.borrow_mut().restore(id, task),
            }
        }
    }
}

fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Future returned by [`Sim::edge`].
pub struct EdgeWait {
    sim: Sim,
    signal: SignalId,
    edge: Edge,
    fired: Option<Rc<Cell<Option<SimTime>>>>,
}

impl Future for EdgeWait {
    type Output = SimTime;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<SimTime> {
        if let Some(fired) = &self.fired {
            return match fired.get() {
                Some(at) => Poll::Ready(at),
                None => Poll::Pending,
            };
        }
        let fired = Rc::new(Cell::new(None));
        self.sim
            .register_edge(self.signal, self.edge, Rc::clone(&fired), cx.waker().clone());
        self.fired = Some(fired);
        Poll::Pending
    }
}

/// Future returned by [`Sim::timer`].
pub struct Timer {
    sim: Sim,
    at: SimTime,
    fired: Option<Rc<Cell<bool>>>,
}

impl Future for Timer {
    type Output = SimTime;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<SimTime> {
        if let Some(fired) = &self.fired {
            return if fired.get() {
                Poll::Ready(self.at)
            } else {
                Poll::Pending
            };
        }
        let fired = Rc::new(Cell::new(false));
        self.sim
            .register_timer(self.at, Rc::clone(&fired), cx.waker().clone());
        self.fired = Some(fired);
        Poll::Pending
    }
}

struct JoinState<T> {
    output: Option<T>,
    waiter: Option<Waker>,
}

/// Completion handle of a spawned task; await it for the task's output.
pub struct JoinHandle<T> {
    state: Rc<RefCell<JoinState<T>>>,
}

impl<T> JoinHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.state.borrow().output.is_some()
    }

    fn try_take(&self) -> Option<T> {
        self.state.borrow_mut().output.take()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.state.borrow_mut();
        match state.output.take() {
            Some(output) => Poll::Ready(output),
            None => {
                state.waiter = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
