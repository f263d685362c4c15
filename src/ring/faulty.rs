//! Fault-injecting wrapper used to prove the harness detectors fire.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::{RingBuffer, Span};
use crate::error::RingError;

/// Defect to inject once the clean budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Hand out reservations that end one byte past capacity.
    Overrun,
    /// Hand the consumer ranges that start one byte late.
    Misframe,
}

/// Wraps a correct backend and misbehaves after `clean_ops` operations of
/// the faulted kind.
#[derive(Debug)]
pub struct FaultyRing<R> {
    inner: R,
    fault: Fault,
    clean_ops: u64,
    ops: AtomicU64,
    /// Bytes hidden from the consumer's current claim.
    skew: AtomicUsize,
}

impl<R: RingBuffer> FaultyRing<R> {
    pub fn new(inner: R, fault: Fault, clean_ops: u64) -> Self {
        Self {
            inner,
            fault,
            clean_ops,
            ops: AtomicU64::new(0),
            skew: AtomicUsize::new(0),
        }
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    fn tripped(&self) -> bool {
        self.ops.fetch_add(1, Ordering::Relaxed) >= self.clean_ops
    }
}

impl<R: RingBuffer> RingBuffer for FaultyRing<R> {
    type Worker = R::Worker;

    fn name(&self) -> &'static str {
        match self.fault {
            Fault::Overrun => "faulty-overrun",
            Fault::Misframe => "faulty-misframe",
        }
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn register(&self) -> Result<Self::Worker, RingError> {
        self.inner.register()
    }

    fn unregister(&self, worker: Self::Worker) {
        self.inner.unregister(worker)
    }

    fn acquire(&self, worker: &mut Self::Worker, length: usize) -> Option<usize> {
        let offset = self.inner.acquire(worker, length)?;
        if self.fault == Fault::Overrun && length > 1 && self.tripped() {
            return Some(self.capacity() + 1 - length);
        }
        Some(offset)
    }

    fn produce(&self, worker: &mut Self::Worker) {
        self.inner.produce(worker)
    }

    fn consume(&self) -> Option<Span> {
        let span = self.inner.consume()?;
        if self.fault == Fault::Misframe && span.length > 1 && self.tripped() {
            self.skew.store(1, Ordering::Relaxed);
            return Some(Span {
                offset: span.offset + 1,
                length: span.length - 1,
            });
        }
        Some(span)
    }

    fn release(&self, length: usize) {
        let hidden = self.skew.swap(0, Ordering::Relaxed);
        self.inner.release(length + hidden)
    }
}
