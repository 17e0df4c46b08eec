//! Host-side collaborators: where time comes from and who calls `tick`.
//!
//! The engine never sleeps or schedules itself. It asks a [`Clock`] how long
//! a tick has been running and tells a [`TickSource`] when to start and stop
//! calling it.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Monotonic time, as an offset from an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Whatever periodically calls [`crate::engine::Engine::tick`].
///
/// `start` is called when work appears on an idle engine, `stop` once a
/// tick drains everything.
pub trait TickSource {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Tick source for hosts that poll [`ManualTicks::is_active`] themselves.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ManualTicks {
    state: Rc<ManualTicksState>,
}

#[derive(Debug, Default)]
struct ManualTicksState {
    active: Cell<bool>,
    starts: Cell<usize>,
    stops: Cell<usize>,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state.active.get()
    }

    /// How many times the engine started this source.
    pub fn starts(&self) -> usize {
        self.state.starts.get()
    }

    /// How many times the engine stopped this source.
    pub fn stops(&self) -> usize {
        self.state.stops.get()
    }
}

impl TickSource for ManualTicks {
    fn start(&mut self) {
        self.state.active.set(true);
        self.state.starts.set(self.state.starts.get() + 1);
    }

    fn stop(&mut self) {
        self.state.active.set(false);
        self.state.stops.set(self.state.stops.get() + 1);
    }
}

/// Tokio-driven tick source.
///
/// The engine side flips a watch channel; the host side awaits
/// [`IntervalTicker::next_tick`], which parks while idle and otherwise
/// yields once per interval.
#[derive(Debug, Clone)]
pub struct IntervalTicker {
    active: watch::Sender<bool>,
}

impl IntervalTicker {
    /// Create the engine-side handle and the host-side driver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(interval: Duration) -> (Self, TickDriver) {
        let (tx, rx) = watch::channel(false);
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        (Self { active: tx }, TickDriver { active: rx, timer })
    }
}

impl TickSource for IntervalTicker {
    fn start(&mut self) {
        self.active.send_replace(true);
    }

    fn stop(&mut self) {
        self.active.send_replace(false);
    }
}

/// Host half of an [`IntervalTicker`].
#[derive(Debug)]
pub struct TickDriver {
    active: watch::Receiver<bool>,
    timer: tokio::time::Interval,
}

impl TickDriver {
    /// Whether the engine currently wants ticks.
    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Wait until the engine wants a tick. Returns `false` once the engine
    /// side has been dropped.
    pub async fn next_tick(&mut self) -> bool {
        if self.active.wait_for(|active| *active).await.is_err() {
            return false;
        }
        self.timer.tick().await;
        true
    }
}
