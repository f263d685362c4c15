//! Per-thread worker state.

use serde::{Deserialize, Serialize};

use crate::prng::FastRng;
use crate::result::WorkerReport;

/// Fixed role of a worker thread. Worker 0 consumes, all others produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Consumer,
    Producer,
}

impl Role {
    pub fn for_worker(id: usize) -> Self {
        if id == 0 {
            Role::Consumer
        } else {
            Role::Producer
        }
    }
}

/// State owned by exactly one worker thread for its whole life.
///
/// Holds the thread's generator and the counters that end up in its
/// [`WorkerReport`].
#[derive(Debug)]
pub struct WorkerContext {
    pub(crate) id: usize,
    pub(crate) role: Role,
    pub(crate) rng: FastRng,
    pub(crate) iterations: u64,
    pub(crate) frames: u64,
    pub(crate) bytes: u64,
    pub(crate) busy: u64,
    pub(crate) empty: u64,
}

impl WorkerContext {
    pub fn new(id: usize, seed: u32) -> Self {
        Self {
            id,
            role: Role::for_worker(id),
            rng: FastRng::for_worker(seed, id),
            iterations: 0,
            frames: 0,
            bytes: 0,
            busy: 0,
            empty: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Frames written (producer) or verified (consumer) so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub(crate) fn record_frames(&mut self, frames: u64, bytes: usize) {
        self.frames += frames;
        self.bytes += bytes as u64;
    }

    pub fn into_report(self) -> WorkerReport {
        WorkerReport {
            id: self.id,
            role: self.role,
            iterations: self.iterations,
            frames: self.frames,
            bytes: self.bytes,
            busy: self.busy,
            empty: self.empty,
        }
    }
}
