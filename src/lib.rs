//! # ringbuf-stress
//!
//! A stress harness for lock-free multi-producer/single-consumer byte ring
//! buffers.
//!
//! One consumer thread and many producer threads hammer a shared ring for
//! a bounded time. Producers publish self-checking frames
//! (`[len][payload][xor]`), the consumer verifies every byte range it
//! claims, and a canary byte past the end of the store catches any write
//! that leaves the ring's capacity. Any violation is fatal: the harness is
//! a pass/fail oracle, not a benchmark.
//!
//! The ring itself is injected through the [`RingBuffer`] trait, so the same
//! harness runs against any candidate backend, including a deliberately
//! faulty one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ringbuf_stress::{LockedRing, StressConfig, StressRunner, RING_CAPACITY};
//!
//! let config = StressConfig::new().seconds(2);
//! let ring = LockedRing::new(RING_CAPACITY, config.worker_count()).unwrap();
//!
//! // Prints "stress test", runs two seconds, prints "ok".
//! StressRunner::with_config(config).run(ring).unwrap();
//! ```

mod config;
mod context;
mod error;
pub mod frame;
pub mod harness;
mod logging;
pub mod prng;
mod report;
mod result;
pub mod ring;
mod runner;
pub mod store;

pub use config::{FailureMode, StressConfig, RING_CAPACITY};
pub use context::{Role, WorkerContext};
pub use error::{FrameError, HarnessError, RingError};
pub use frame::{Frame, FrameCursor, FrameWriter};
pub use logging::init_logging;
pub use prng::FastRng;
pub use report::{ConsoleReporter, JsonReporter, MultiReporter, Reporter};
pub use result::{RunPlan, RunSummary, WorkerReport};
pub use ring::{Fault, FaultyRing, LockedRing, RingBuffer, Span};
pub use runner::StressRunner;
pub use store::BackingStore;
