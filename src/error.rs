//! Error types for framing, ring backends and the harness itself.

use thiserror::Error;

/// A frame that failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame needs {needed} bytes but only {available} remain")]
    Truncated { needed: usize, available: usize },

    #[error("checksum mismatch on {length}-byte payload: expected {expected:#04x}, found {found:#04x}")]
    Checksum { length: usize, expected: u8, found: u8 },

    #[error("slot capacity {0} outside supported range")]
    SlotSize(usize),
}

/// Failures reported by a ring backend outside the routine busy/empty cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("all {capacity} worker registrations are taken")]
    RegistryFull { capacity: usize },

    #[error("invalid ring capacity {0}")]
    InvalidCapacity(usize),
}

/// A violation detected while stressing a ring backend.
///
/// Apart from `Spawn`, every variant points at a defect in the backend
/// under test.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("corrupt frame at offset {offset}: {source}")]
    Corruption {
        offset: usize,
        #[source]
        source: FrameError,
    },

    #[error("overrun canary changed: expected {expected:#04x}, found {found:#04x}")]
    CanaryCorrupted { expected: u8, found: u8 },

    #[error("offset {offset} outside ring of capacity {capacity}")]
    OffsetOutOfRange { offset: usize, capacity: usize },

    #[error("consumed range {offset}+{length} exceeds capacity {capacity}")]
    RangeOutOfBounds {
        offset: usize,
        length: usize,
        capacity: usize,
    },

    #[error("write {offset}+{length} runs past the backing store ({limit} bytes)")]
    WriteOutOfBounds {
        offset: usize,
        length: usize,
        limit: usize,
    },

    #[error("ring too small for frames: {0}")]
    InvalidSlot(#[from] FrameError),

    #[error("worker registration failed: {0}")]
    Registration(#[from] RingError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}
