//! Configuration for a stress run.

use std::time::Duration;

use crate::prng::DEFAULT_SEED;

/// Bytes managed by the ring under test. Fixed for every run.
pub const RING_CAPACITY: usize = 512;

/// What a worker does when it detects a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Log and abort the process from the detecting thread.
    #[default]
    Abort,
    /// Stop the run and return the violation to the caller.
    Report,
}

/// Configuration for the stress runner.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// How long workers run before the timer raises the stop flag.
    pub duration: Duration,
    /// Worker threads including the consumer. `None` means hardware
    /// parallelism plus one.
    pub workers: Option<usize>,
    /// Base seed for the per-worker generators.
    pub seed: u32,
    pub failure_mode: FailureMode,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            workers: None,
            seed: DEFAULT_SEED,
            failure_mode: FailureMode::Abort,
        }
    }
}

impl StressConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run duration.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the run duration in whole seconds.
    pub fn seconds(self, secs: u64) -> Self {
        self.duration(Duration::from_secs(secs))
    }

    /// Set the worker count, consumer included.
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }

    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Effective worker count: never fewer than one consumer plus one
    /// producer.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_workers).max(2)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        + 1
}
