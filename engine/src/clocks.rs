use std::time::{Duration, Instant};

/// Snapshot of the frame clock for a single tick.
#[derive(Clone, Copy, Debug)]
pub struct ClockIndex {
    /// Time elapsed since previous tick.
    pub delta: Duration,

    /// Instant of this tick.
    pub now: Instant,

    /// Instant of the first tick.
    pub start: Instant,

    /// Sequence number of this tick.
    pub step: u64,
}

impl ClockIndex {
    pub fn elapsed(&self) -> Duration {
        self.now - self.start
    }
}

/// Host frame clock.
#[derive(Debug)]
pub struct Clocks {
    start: Instant,
    last: Instant,
    step: u64,
}

impl Clocks {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Clocks {
            start,
            last: start,
            step: 0,
        }
    }

    /// Advances clocks to current instant.
    pub fn step(&mut self) -> ClockIndex {
        self.advance(Instant::now())
    }

    /// Advances clocks to specified instant.
    /// Instants earlier than previous one produce zero delta.
    pub fn advance(&mut self, now: Instant) -> ClockIndex {
        let now = now.max(self.last);
        let delta = now - self.last;
        self.last = now;
        self.step += 1;

        ClockIndex {
            delta,
            now,
            start: self.start,
            step: self.step,
        }
    }
}

impl Default for Clocks {
    fn default() -> Self {
        Self::new()
    }
}
