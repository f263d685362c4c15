//! Run result types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::context::Role;

/// Counters from one worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub id: usize,
    pub role: Role,
    /// Loop iterations, including busy/empty ones.
    pub iterations: u64,
    /// Frames written (producer) or verified (consumer).
    pub frames: u64,
    pub bytes: u64,
    /// `acquire` calls that found no space.
    pub busy: u64,
    /// `consume` calls that found nothing published.
    pub empty: u64,
}

/// What a run was set up to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    /// Backend name as reported by the ring.
    pub backend: String,
    pub workers: usize,
    pub capacity: usize,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Outcome of a run that finished without a violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub plan: RunPlan,
    /// Wall time from spawning the first worker to the last join.
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
    /// Unix milliseconds at run start.
    pub started_at: String,
    pub frames_produced: u64,
    pub frames_verified: u64,
    pub bytes_produced: u64,
    pub bytes_verified: u64,
    pub busy: u64,
    pub empty: u64,
    pub reports: Vec<WorkerReport>,
}

impl RunSummary {
    pub fn from_reports(
        plan: RunPlan,
        elapsed: Duration,
        started_at: String,
        reports: Vec<WorkerReport>,
    ) -> Self {
        let mut summary = Self {
            plan,
            elapsed,
            started_at,
            frames_produced: 0,
            frames_verified: 0,
            bytes_produced: 0,
            bytes_verified: 0,
            busy: 0,
            empty: 0,
            reports: Vec::new(),
        };
        for w in &reports {
            match w.role {
                Role::Consumer => {
                    summary.frames_verified += w.frames;
                    summary.bytes_verified += w.bytes;
                }
                Role::Producer => {
                    summary.frames_produced += w.frames;
                    summary.bytes_produced += w.bytes;
                }
            }
            summary.busy += w.busy;
            summary.empty += w.empty;
        }
        summary.reports = reports;
        summary
    }

    /// Bytes published but still unread when the run stopped.
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_produced.saturating_sub(self.bytes_verified)
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        u64::try_from(d.as_nanos())
            .unwrap_or(u64::MAX)
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(d)?;
        Ok(Duration::from_nanos(nanos))
    }
}
