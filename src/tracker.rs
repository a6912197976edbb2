use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Best-effort instrumentation seam. The sorters start and stop named
/// phase timers (`median_select`, `partition`, `exchange`, `merge`,
/// `comm_split`, `local_sort`, `shuffle`, `shape`) and report counters
/// such as `inbalance`; implementations are free to ignore any call.
pub trait Tracker {
    fn start(&mut self, _name: &'static str) {}
    fn stop(&mut self, _name: &'static str) {}
    fn add(&mut self, _value: u64, _name: &'static str) {}
}

/// Tracker that drops everything on the floor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTracker;

impl Tracker for NoTracker {}

/// Wall-clock tracker backed by [`Instant`].
#[derive(Debug, Default)]
pub struct SortTimers {
    running: HashMap<&'static str, Instant>,
    elapsed: HashMap<&'static str, Duration>,
    counters: HashMap<&'static str, u64>,
}

impl SortTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated time of a phase; zero if it never ran.
    pub fn elapsed(&self, name: &str) -> Duration {
        self.elapsed.get(name).copied().unwrap_or_default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

impl Tracker for SortTimers {
    fn start(&mut self, name: &'static str) {
        self.running.insert(name, Instant::now());
    }

    fn stop(&mut self, name: &'static str) {
        if let Some(started) = self.running.remove(name) {
            *self.elapsed.entry(name).or_default() += started.elapsed();
        }
    }

    fn add(&mut self, value: u64, name: &'static str) {
        *self.counters.entry(name).or_insert(0) += value;
    }
}
