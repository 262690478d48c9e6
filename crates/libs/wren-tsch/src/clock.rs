use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic tick source driving the TSCH timers.
pub trait Clock {
    fn now(&self) -> u64;

    fn ticks_per_second(&self) -> u64;
}

/// Wall clock counting from its creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
    ticks_per_second: u64,
}

impl SystemClock {
    pub fn new(ticks_per_second: u64) -> Self {
        Self { start: Instant::now(), ticks_per_second: ticks_per_second.max(1) }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        let elapsed = self.start.elapsed();
        let ticks = elapsed.as_micros() * u128::from(self.ticks_per_second) / 1_000_000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }
}

/// Manually advanced clock. Clones share the same time, so several nodes
/// of a simulation can run against one timeline.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Rc<Cell<u64>>,
    ticks_per_second: u64,
}

impl FakeClock {
    pub fn new(ticks_per_second: u64) -> Self {
        Self { now: Rc::new(Cell::new(0)), ticks_per_second: ticks_per_second.max(1) }
    }

    pub fn advance(&self, ticks: u64) {
        self.now.set(self.now.get().saturating_add(ticks));
    }

    pub fn set(&self, now: u64) {
        self.now.set(now);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> u64 {
        self.now.get()
    }

    fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }
}
