//! Mutex-guarded reference backend.
//!
//! Positions are kept as ever-growing virtual offsets; the physical offset
//! is `position % capacity`. A reservation that would cross the physical
//! end skips ahead to the next lap and leaves a gap that the consumer steps
//! over. The consumer only ever sees the prefix of bytes that precedes the
//! oldest unpublished reservation.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{RingBuffer, Span};
use crate::error::RingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free,
    Idle,
    Reserved(u64),
}

#[derive(Debug)]
struct State {
    /// Next position to hand out.
    head: u64,
    /// End of the consumer's latest claim.
    consumed: u64,
    /// Everything before this position is free again.
    released: u64,
    /// Skipped `[start, end)` tails, oldest first.
    gaps: VecDeque<(u64, u64)>,
    slots: Vec<Slot>,
}

/// Reference implementation of the ring contract. Correct, not lock-free.
#[derive(Debug)]
pub struct LockedRing {
    capacity: usize,
    state: Mutex<State>,
}

/// Registration token for [`LockedRing`].
#[derive(Debug)]
pub struct LockedWorker {
    slot: usize,
}

impl LockedRing {
    /// Ring of `capacity` bytes accepting up to `max_workers`
    /// registrations.
    pub fn new(capacity: usize, max_workers: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            state: Mutex::new(State {
                head: 0,
                consumed: 0,
                released: 0,
                gaps: VecDeque::new(),
                slots: vec![Slot::Free; max_workers],
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State is only mutated in short non-panicking sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RingBuffer for LockedRing {
    type Worker = LockedWorker;

    fn name(&self) -> &'static str {
        "reference"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn register(&self) -> Result<LockedWorker, RingError> {
        let mut st = self.lock();
        let capacity = st.slots.len();
        let slot = st
            .slots
            .iter()
            .position(|s| *s == Slot::Free)
            .ok_or(RingError::RegistryFull { capacity })?;
        st.slots[slot] = Slot::Idle;
        Ok(LockedWorker { slot })
    }

    fn unregister(&self, worker: LockedWorker) {
        self.lock().slots[worker.slot] = Slot::Free;
    }

    fn acquire(&self, worker: &mut LockedWorker, length: usize) -> Option<usize> {
        if length == 0 || length > self.capacity {
            return None;
        }
        let cap = self.capacity as u64;
        let len = length as u64;

        let mut st = self.lock();
        if st.slots[worker.slot] != Slot::Idle {
            return None;
        }

        let mut start = st.head;
        let phys = start % cap;
        if phys + len > cap {
            start += cap - phys;
        }
        if start + len - st.released > cap {
            return None;
        }

        if start != st.head {
            let gap = (st.head, start);
            st.gaps.push_back(gap);
        }
        st.head = start + len;
        st.slots[worker.slot] = Slot::Reserved(start);
        Some((start % cap) as usize)
    }

    fn produce(&self, worker: &mut LockedWorker) {
        let mut st = self.lock();
        if let Slot::Reserved(_) = st.slots[worker.slot] {
            st.slots[worker.slot] = Slot::Idle;
        }
    }

    fn consume(&self) -> Option<Span> {
        let cap = self.capacity as u64;
        let mut st = self.lock();
        // One claim at a time.
        if st.consumed != st.released {
            return None;
        }

        let mut pos = st.consumed;
        while let Some(&(start, end)) = st.gaps.front() {
            if start != pos {
                break;
            }
            pos = end;
            st.released = end;
            st.gaps.pop_front();
        }
        st.consumed = pos;

        let oldest_pending = st
            .slots
            .iter()
            .filter_map(|s| match s {
                Slot::Reserved(p) => Some(*p),
                _ => None,
            })
            .min();
        let next_gap = st.gaps.front().map(|&(start, _)| start);
        let lap_end = pos - pos % cap + cap;

        let limit = [Some(st.head), oldest_pending, next_gap, Some(lap_end)]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(pos);
        if limit <= pos {
            return None;
        }

        st.consumed = limit;
        Some(Span {
            offset: (pos % cap) as usize,
            length: (limit - pos) as usize,
        })
    }

    fn release(&self, length: usize) {
        let mut st = self.lock();
        st.released = (st.released + length as u64).min(st.consumed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(capacity: usize) -> (LockedRing, LockedWorker, LockedWorker) {
        let ring = LockedRing::new(capacity, 2).unwrap();
        let a = ring.register().unwrap();
        let b = ring.register().unwrap();
        (ring, a, b)
    }

    #[test]
    fn should_reject_registration_when_table_full() {
        let (ring, a, _b) = ring(64);
        assert_eq!(
            ring.register().unwrap_err(),
            RingError::RegistryFull { capacity: 2 }
        );
        ring.unregister(a);
        assert!(ring.register().is_ok());
    }

    #[test]
    fn should_report_empty_when_nothing_published() {
        let (ring, mut a, _b) = ring(64);
        assert_eq!(ring.consume(), None);
        assert_eq!(ring.acquire(&mut a, 10), Some(0));
        assert_eq!(ring.consume(), None);
    }

    #[test]
    fn should_hand_out_published_bytes_when_produced() {
        let (ring, mut a, _b) = ring(64);
        assert_eq!(ring.acquire(&mut a, 10), Some(0));
        ring.produce(&mut a);
        assert_eq!(ring.acquire(&mut a, 6), Some(10));
        ring.produce(&mut a);

        assert_eq!(
            ring.consume(),
            Some(Span {
                offset: 0,
                length: 16
            })
        );
        ring.release(16);
        assert_eq!(ring.consume(), None);
    }

    #[test]
    fn should_hold_back_later_data_when_earlier_reservation_pending() {
        let (ring, mut a, mut b) = ring(64);
        assert_eq!(ring.acquire(&mut a, 8), Some(0));
        assert_eq!(ring.acquire(&mut b, 8), Some(8));
        ring.produce(&mut b);
        assert_eq!(ring.consume(), None);

        ring.produce(&mut a);
        assert_eq!(
            ring.consume(),
            Some(Span {
                offset: 0,
                length: 16
            })
        );
    }

    #[test]
    fn should_report_busy_when_ring_full() {
        let (ring, mut a, _b) = ring(32);
        assert_eq!(ring.acquire(&mut a, 20), Some(0));
        ring.produce(&mut a);
        assert_eq!(ring.acquire(&mut a, 20), None);
        assert_eq!(ring.acquire(&mut a, 33), None);
    }

    #[test]
    fn should_refuse_second_reservation_when_first_unpublished() {
        let (ring, mut a, _b) = ring(64);
        assert_eq!(ring.acquire(&mut a, 4), Some(0));
        assert_eq!(ring.acquire(&mut a, 4), None);
    }

    #[test]
    fn should_wrap_to_start_when_tail_too_short() {
        let (ring, mut a, _b) = ring(32);
        assert_eq!(ring.acquire(&mut a, 24), Some(0));
        ring.produce(&mut a);
        let span = ring.consume().unwrap();
        assert_eq!(span.length, 24);
        ring.release(span.length);

        // 8 bytes left before the end; a 10-byte reservation skips them.
        assert_eq!(ring.acquire(&mut a, 10), Some(0));
        ring.produce(&mut a);
        assert_eq!(
            ring.consume(),
            Some(Span {
                offset: 0,
                length: 10
            })
        );
        ring.release(10);

        assert_eq!(ring.acquire(&mut a, 20), Some(10));
        ring.produce(&mut a);
    }

    #[test]
    fn should_split_claim_at_lap_end_when_data_wraps() {
        let (ring, mut a, _b) = ring(32);
        assert_eq!(ring.acquire(&mut a, 16), Some(0));
        ring.produce(&mut a);
        let span = ring.consume().unwrap();
        ring.release(span.length);

        assert_eq!(ring.acquire(&mut a, 16), Some(16));
        ring.produce(&mut a);
        assert_eq!(ring.acquire(&mut a, 8), Some(0));
        ring.produce(&mut a);

        assert_eq!(
            ring.consume(),
            Some(Span {
                offset: 16,
                length: 16
            })
        );
        ring.release(16);
        assert_eq!(
            ring.consume(),
            Some(Span {
                offset: 0,
                length: 8
            })
        );
    }

    #[test]
    fn should_keep_regions_disjoint_when_many_laps_run() {
        let (ring, mut a, mut b) = ring(100);
        let mut owned = [false; 100];
        for i in 0..10_000usize {
            let len = 2 + i % 37;
            let worker = if i % 2 == 0 { &mut a } else { &mut b };
            if let Some(off) = ring.acquire(worker, len) {
                assert!(off + len <= 100);
                for slot in &mut owned[off..off + len] {
                    assert!(!*slot, "overlapping reservation at {}", off);
                    *slot = true;
                }
                ring.produce(worker);
            }
            if i % 3 == 0 {
                if let Some(span) = ring.consume() {
                    assert!(span.offset + span.length <= 100);
                    for slot in &mut owned[span.offset..span.offset + span.length] {
                        assert!(*slot, "consumed unpublished byte");
                        *slot = false;
                    }
                    ring.release(span.length);
                }
            }
        }
    }
}
