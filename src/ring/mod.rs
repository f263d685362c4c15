//! The ring buffer under test, seen only through its public contract.
//!
//! A backend coordinates offsets into a byte store it does not own.
//! Writers reserve with [`acquire`](RingBuffer::acquire), fill the region,
//! then publish with [`produce`](RingBuffer::produce). The single reader
//! claims published bytes with [`consume`](RingBuffer::consume) and hands
//! them back with [`release`](RingBuffer::release).
//!
//! None of the calls block. `acquire` returning `None` means "no space
//! right now" and `consume` returning `None` means "nothing published";
//! both are routine under contention.

mod faulty;
mod reference;

pub use faulty::{Fault, FaultyRing};
pub use reference::{LockedRing, LockedWorker};

use crate::error::RingError;

/// A contiguous byte range handed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

/// Contract of a multi-producer/single-consumer byte ring.
///
/// Backends must guarantee:
/// - regions returned by `acquire` never overlap another outstanding
///   reservation or unreleased consumed range, and lie inside
///   `[0, capacity)`;
/// - every range returned by `consume` is made only of whole published
///   reservations;
/// - every call returns promptly.
///
/// Delivery order across producers is unconstrained.
pub trait RingBuffer: Send + Sync {
    /// Per-thread registration token.
    type Worker: Send;

    /// Short backend name used in logs and summaries.
    fn name(&self) -> &'static str;

    fn capacity(&self) -> usize;

    /// Register the calling thread. Must precede any other call it makes.
    fn register(&self) -> Result<Self::Worker, RingError>;

    /// Give a registration back at thread exit.
    fn unregister(&self, worker: Self::Worker);

    /// Reserve `length` contiguous bytes, returning their offset.
    fn acquire(&self, worker: &mut Self::Worker, length: usize) -> Option<usize>;

    /// Publish the reservation made by the last successful `acquire`.
    fn produce(&self, worker: &mut Self::Worker);

    /// Claim the next run of published bytes. Consumer only.
    fn consume(&self) -> Option<Span>;

    /// Return `length` bytes of a consumed range to the free pool.
    fn release(&self, length: usize);
}
