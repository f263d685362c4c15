//! Shared byte store behind the ring, with a trailing overrun canary.
//!
//! The ring backend only hands out offsets; the bytes themselves live here.
//! Cells are `AtomicU8` accessed with relaxed ordering: the backend's own
//! produce/consume synchronization orders them, and a faulty backend that
//! hands out overlapping regions cannot turn into undefined behaviour.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::HarnessError;

/// Value of the sentinel byte placed one past the ring's capacity.
pub const CANARY: u8 = 0x5a;

/// `capacity` usable bytes followed by one canary byte.
#[derive(Debug)]
pub struct BackingStore {
    cells: Box<[AtomicU8]>,
    capacity: usize,
}

impl BackingStore {
    /// Allocate a store and fill every byte, canary included, with
    /// [`CANARY`].
    pub fn new(capacity: usize) -> Self {
        let cells = (0..=capacity).map(|_| AtomicU8::new(CANARY)).collect();
        Self { cells, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check the sentinel byte. Any other value proves a write ran past
    /// `capacity`.
    #[inline]
    pub fn check_canary(&self) -> Result<(), HarnessError> {
        let found = self.cells[self.capacity].load(Ordering::Relaxed);
        if found != CANARY {
            return Err(HarnessError::CanaryCorrupted {
                expected: CANARY,
                found,
            });
        }
        Ok(())
    }

    /// Copy `bytes` in at `offset`.
    ///
    /// Only the allocation itself is enforced: a write that spills into the
    /// canary byte is allowed through so [`check_canary`](Self::check_canary)
    /// can catch it.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<(), HarnessError> {
        let cells = offset
            .checked_add(bytes.len())
            .and_then(|end| self.cells.get(offset..end))
            .ok_or(HarnessError::WriteOutOfBounds {
                offset,
                length: bytes.len(),
                limit: self.cells.len(),
            })?;
        for (cell, b) in cells.iter().zip(bytes) {
            cell.store(*b, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy `[offset, offset + length)` into `out`, replacing its contents.
    /// The range must lie inside the usable capacity.
    pub fn read_into(
        &self,
        offset: usize,
        length: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), HarnessError> {
        let cells = offset
            .checked_add(length)
            .filter(|end| *end <= self.capacity)
            .and_then(|end| self.cells.get(offset..end))
            .ok_or(HarnessError::RangeOutOfBounds {
                offset,
                length,
                capacity: self.capacity,
            })?;
        out.clear();
        out.extend(cells.iter().map(|c| c.load(Ordering::Relaxed)));
        Ok(())
    }

    /// Overwrite a single byte, bypassing every check. Fault injection only.
    pub fn poke(&self, index: usize, value: u8) {
        if let Some(cell) = self.cells.get(index) {
            cell.store(value, Ordering::Relaxed);
        }
    }

    pub fn peek(&self, index: usize) -> Option<u8> {
        self.cells.get(index).map(|c| c.load(Ordering::Relaxed))
    }
}
