//! Self-checking message frames.
//!
//! Wire layout, fixed:
//!
//! ```text
//! +--------+-------------------+----------+
//! | len u8 | payload (len B)   | xor u8   |
//! +--------+-------------------+----------+
//! ```
//!
//! The trailing byte is the XOR of every payload byte. A frame with an
//! empty payload is valid and two bytes long.

use crate::error::FrameError;
use crate::prng::FastRng;

/// Size of the producer's private frame buffer.
pub const FRAME_BUF: usize = 256;

/// Length byte plus checksum byte.
pub const FRAME_OVERHEAD: usize = 2;

const PRINTABLE_LO: u8 = b'!';
const PRINTABLE_HI: u8 = b'~';

/// XOR of all bytes in `payload`.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Decode the frame at the start of `buf` and return its encoded size.
pub fn verify(buf: &[u8]) -> Result<usize, FrameError> {
    Frame::parse(buf).map(|f| f.encoded_len())
}

/// A borrowed, verified frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Parse and verify the frame at the start of `buf`. Bytes after the
    /// frame are ignored.
    pub fn parse(buf: &'a [u8]) -> Result<Self, FrameError> {
        let Some(&len) = buf.first() else {
            return Err(FrameError::Truncated {
                needed: 1,
                available: 0,
            });
        };
        let length = len as usize;
        let needed = length + FRAME_OVERHEAD;
        if buf.len() < needed {
            return Err(FrameError::Truncated {
                needed,
                available: buf.len(),
            });
        }

        let expected = checksum(&buf[1..=length]);
        let found = buf[length + 1];
        if expected != found {
            return Err(FrameError::Checksum {
                length,
                expected,
                found,
            });
        }

        Ok(Self {
            bytes: &buf[..needed],
        })
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[1..self.bytes.len() - 1]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Total bytes on the wire: payload plus overhead.
    pub fn encoded_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Walks a consumed byte range frame by frame.
///
/// Stops after the first error; [`FrameCursor::offset`] then points at the
/// frame that failed.
#[derive(Debug)]
pub struct FrameCursor<'a> {
    rest: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> FrameCursor<'a> {
    pub fn new(range: &'a [u8]) -> Self {
        Self {
            rest: range,
            offset: 0,
            failed: false,
        }
    }

    /// Offset of the next undecoded byte, relative to the range start.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

impl<'a> Iterator for FrameCursor<'a> {
    type Item = Result<Frame<'a>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        match Frame::parse(self.rest) {
            Ok(frame) => {
                let n = frame.encoded_len();
                self.rest = &self.rest[n..];
                self.offset += n;
                Some(Ok(frame))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Builds frames into a fixed private buffer.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    buf: [u8; FRAME_BUF],
    capacity: usize,
}

impl FrameWriter {
    /// Writer whose frames never exceed `capacity` bytes.
    ///
    /// `capacity` must leave room for the overhead plus at least one random
    /// length choice, and cannot exceed [`FRAME_BUF`].
    pub fn new(capacity: usize) -> Result<Self, FrameError> {
        if !(FRAME_OVERHEAD + 1..=FRAME_BUF).contains(&capacity) {
            return Err(FrameError::SlotSize(capacity));
        }
        Ok(Self {
            buf: [0; FRAME_BUF],
            capacity,
        })
    }

    /// Writer sized for a ring of `ring_capacity` bytes: one byte short of
    /// the smaller of the ring and the private buffer.
    pub fn for_ring(ring_capacity: usize) -> Result<Self, FrameError> {
        let slot = ring_capacity.min(FRAME_BUF).saturating_sub(1);
        Self::new(slot)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill a frame with a random printable payload of length
    /// `[0, capacity - 2)` and return its encoded bytes.
    pub fn generate(&mut self, rng: &mut FastRng) -> &[u8] {
        let length = rng.below((self.capacity - FRAME_OVERHEAD) as u32) as usize;
        let span = (PRINTABLE_HI - PRINTABLE_LO) as u32;

        let mut cksum = 0u8;
        for b in &mut self.buf[1..=length] {
            *b = PRINTABLE_LO + rng.below(span) as u8;
            cksum ^= *b;
        }
        self.seal(length, cksum)
    }

    /// Encode `payload` verbatim.
    pub fn encode(&mut self, payload: &[u8]) -> Result<&[u8], FrameError> {
        let needed = payload.len() + FRAME_OVERHEAD;
        if needed > self.capacity {
            return Err(FrameError::Truncated {
                needed,
                available: self.capacity,
            });
        }
        self.buf[1..=payload.len()].copy_from_slice(payload);
        Ok(self.seal(payload.len(), checksum(payload)))
    }

    fn seal(&mut self, length: usize, cksum: u8) -> &[u8] {
        self.buf[length + 1] = cksum;
        // Length goes in last.
        self.buf[0] = length as u8;
        &self.buf[..length + FRAME_OVERHEAD]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_roundtrip_when_payload_length_spans_slot() {
        let mut writer = FrameWriter::new(255).unwrap();
        for length in 0..253 {
            let payload: Vec<u8> = (0..length).map(|i| b'!' + (i % 90) as u8).collect();
            let encoded = writer.encode(&payload).unwrap().to_vec();
            assert_eq!(verify(&encoded), Ok(length + 2));
            assert_eq!(Frame::parse(&encoded).unwrap().payload(), &payload[..]);
        }
    }

    #[test]
    fn should_verify_generated_frames_when_seeded() {
        let mut writer = FrameWriter::for_ring(512).unwrap();
        let mut rng = FastRng::default();
        for _ in 0..10_000 {
            let frame = writer.generate(&mut rng).to_vec();
            assert!(frame.len() <= writer.capacity());
            assert_eq!(frame[0] as usize + 2, frame.len());
            assert_eq!(verify(&frame), Ok(frame.len()));
            let payload = Frame::parse(&frame).unwrap().payload().to_vec();
            assert!(payload.iter().all(|b| (b'!'..b'~').contains(b)));
        }
    }

    #[test]
    fn should_accept_empty_payload_when_length_zero() {
        assert_eq!(verify(&[0, 0]), Ok(2));
    }

    #[test]
    fn should_detect_corruption_when_any_bit_flips() {
        let mut writer = FrameWriter::for_ring(512).unwrap();
        let mut rng = FastRng::new(11);
        for _ in 0..64 {
            let frame = writer.generate(&mut rng).to_vec();
            // Payload and checksum bytes only; a flipped length byte changes
            // the framing instead.
            for byte in 1..frame.len() {
                for bit in 0..8 {
                    let mut bad = frame.clone();
                    bad[byte] ^= 1 << bit;
                    assert!(
                        matches!(verify(&bad), Err(FrameError::Checksum { .. })),
                        "flip of byte {} bit {} in {}-byte frame went unnoticed",
                        byte,
                        bit,
                        frame.len()
                    );
                }
            }
        }
    }

    #[test]
    fn should_misframe_when_length_byte_flips() {
        let mut writer = FrameWriter::new(64).unwrap();
        let frame = writer.encode(b"hello, ring").unwrap().to_vec();
        for bit in 0..8 {
            let mut bad = frame.clone();
            bad[0] ^= 1 << bit;
            assert_ne!(verify(&bad), Ok(frame.len()));
        }
    }

    #[test]
    fn should_report_truncation_when_range_too_short() {
        assert_eq!(
            verify(&[5, b'a', b'b']),
            Err(FrameError::Truncated {
                needed: 7,
                available: 3
            })
        );
        assert_eq!(
            verify(&[]),
            Err(FrameError::Truncated {
                needed: 1,
                available: 0
            })
        );
    }

    #[test]
    fn should_partition_range_when_frames_concatenated() {
        let mut writer = FrameWriter::new(255).unwrap();
        let mut rng = FastRng::new(7);
        let mut range = Vec::new();
        let mut sizes = Vec::new();
        for _ in 0..20 {
            let frame = writer.generate(&mut rng);
            sizes.push(frame.len());
            range.extend_from_slice(frame);
        }

        let mut cursor = FrameCursor::new(&range);
        let decoded: Vec<usize> = cursor
            .by_ref()
            .map(|f| f.unwrap().encoded_len())
            .collect();
        assert_eq!(decoded, sizes);
        assert_eq!(cursor.offset(), range.len());
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn should_stop_at_failed_frame_when_cursor_hits_corruption() {
        let mut writer = FrameWriter::new(32).unwrap();
        let mut range = writer.encode(b"abc").unwrap().to_vec();
        let second = range.len();
        range.extend_from_slice(writer.encode(b"defg").unwrap());
        let last = range.len() - 1;
        range[last] ^= 0xff;

        let mut cursor = FrameCursor::new(&range);
        assert!(cursor.next().unwrap().is_ok());
        assert!(cursor.next().unwrap().is_err());
        assert!(cursor.next().is_none());
        assert_eq!(cursor.offset(), second);
    }

    #[test]
    fn should_reject_slot_when_capacity_out_of_range() {
        assert_eq!(FrameWriter::new(2).unwrap_err(), FrameError::SlotSize(2));
        assert_eq!(
            FrameWriter::new(FRAME_BUF + 1).unwrap_err(),
            FrameError::SlotSize(FRAME_BUF + 1)
        );
        assert_eq!(FrameWriter::for_ring(512).unwrap().capacity(), 255);
    }
}
