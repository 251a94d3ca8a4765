//! Two-tier connection read buffer.
//!
//! Every connection pairs a persistent inbound ring with a transient scratch
//! buffer holding the bytes of the most recent socket read. The ring always
//! holds the older prefix, the scratch the newer suffix, so the total
//! readable contents are `ring ++ scratch`. When a whole frame sits in the
//! scratch (the common case) peeks are zero-copy; only a frame straddling
//! the ring/scratch boundary or the ring's wrap point pays for a one-shot
//! join copy, and that join buffer is itself pool-recycled.
//!
//! Codecs see only the peek/consume surface. The owning loop additionally
//! calls [`ConnBuffer::fill`] with each fresh read and [`ConnBuffer::spill`]
//! after the decode drain, which is what keeps the ring/scratch split
//! invariant true at every handler entry.

use bytes::{Buf, BytesMut};

use crate::pool::{default_buffer_pool, default_ring_pool};
use crate::ring::RingBuffer;

/// Per-connection read buffer: inbound ring plus latest-read scratch.
#[derive(Debug)]
pub struct ConnBuffer {
    ring: RingBuffer,
    scratch: BytesMut,
    join: Option<BytesMut>,
}

impl ConnBuffer {
    /// Acquire a buffer pair from the default pools.
    pub fn new() -> Self {
        Self {
            ring: default_ring_pool().acquire(),
            scratch: default_buffer_pool().acquire(),
            join: None,
        }
    }

    /// Total logically-readable bytes.
    pub fn len(&self) -> usize {
        self.ring.len() + self.scratch.len()
    }

    /// Whether no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A logically-contiguous view of everything buffered.
    ///
    /// Returns the scratch directly when the ring is empty. Otherwise a join
    /// buffer holding `ring ++ scratch` is materialised once and cached
    /// until the next consuming or mutating call.
    pub fn peek_all(&mut self) -> &[u8] {
        if self.ring.is_empty() {
            return &self.scratch;
        }
        if self.join.is_none() {
            let mut join = default_buffer_pool().acquire();
            let (head, tail) = self.ring.peek_two();
            join.extend_from_slice(head);
            join.extend_from_slice(tail);
            join.extend_from_slice(&self.scratch);
            self.join = Some(join);
        }
        self.join.as_deref().expect("join buffer just cached")
    }

    /// The first `n` buffered bytes without advancing, clamped to `len`.
    ///
    /// `n == 0` returns the whole buffer; callers relying on the historical
    /// "non-positive means everything" behavior get it unchanged.
    pub fn peek_n(&mut self, n: usize) -> (usize, &[u8]) {
        let total = self.len();
        let n = if n == 0 || n > total { total } else { n };
        let view = self.peek_all();
        (n, &view[..n])
    }

    /// Advance the logical head by `n` bytes, returning the count removed.
    ///
    /// `n == 0` or `n > len` resets both buffers and returns the prior
    /// total. Ring bytes are dropped before scratch bytes.
    pub fn consume_n(&mut self, n: usize) -> usize {
        let total = self.len();
        if n == 0 || n > total {
            self.reset();
            return total;
        }
        self.release_join();
        let from_ring = n.min(self.ring.len());
        self.ring.advance(from_ring);
        self.scratch.advance(n - from_ring);
        n
    }

    /// Drop everything buffered.
    pub fn reset(&mut self) {
        self.ring.reset();
        self.scratch.clear();
        self.release_join();
    }

    /// Append freshly-read bytes to the scratch.
    ///
    /// Called by the owning loop only; by the time the next read lands the
    /// previous scratch has been spilled, so the scratch always holds bytes
    /// from the most recent read.
    pub fn fill(&mut self, data: &[u8]) {
        self.release_join();
        self.scratch.extend_from_slice(data);
    }

    /// Move leftover scratch bytes into the ring after a decode drain.
    pub fn spill(&mut self) {
        self.release_join();
        if !self.scratch.is_empty() {
            self.ring.push(&self.scratch);
            self.scratch.clear();
        }
    }

    fn release_join(&mut self) {
        if let Some(join) = self.join.take() {
            default_buffer_pool().release(join);
        }
    }
}

impl Default for ConnBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnBuffer {
    fn drop(&mut self) {
        self.release_join();
        default_buffer_pool().release(std::mem::take(&mut self.scratch));
        default_ring_pool().release(std::mem::take(&mut self.ring));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(chunks: &[&[u8]]) -> ConnBuffer {
        // fill + spill per chunk, leaving the last chunk in the scratch,
        // the way the owning loop would between reads
        let mut buf = ConnBuffer::new();
        for (i, chunk) in chunks.iter().enumerate() {
            buf.fill(chunk);
            if i + 1 < chunks.len() {
                buf.spill();
            }
        }
        buf
    }

    #[test]
    fn test_scratch_only_peek_is_direct() {
        let mut buf = ConnBuffer::new();
        buf.fill(b"hello");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.peek_all(), b"hello");
    }

    #[test]
    fn test_peek_all_joins_ring_and_scratch() {
        let mut buf = filled(&[&b"hel"[..], &b"lo "[..]]);
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.peek_all(), b"hello ");
    }

    #[test]
    fn test_peek_n_clamps() {
        let mut buf = filled(&[&b"abc"[..], &b"def"[..]]);
        let (available, bytes) = buf.peek_n(4);
        assert_eq!(available, 4);
        assert_eq!(bytes, b"abcd");
        // peeks never change len
        assert_eq!(buf.len(), 6);

        let (available, bytes) = buf.peek_n(100);
        assert_eq!(available, 6);
        assert_eq!(bytes, b"abcdef");
    }

    #[test]
    fn test_peek_n_zero_returns_everything() {
        let mut buf = filled(&[&b"abc"[..], &b"def"[..]]);
        let (available, bytes) = buf.peek_n(0);
        assert_eq!(available, 6);
        assert_eq!(bytes, b"abcdef");
    }

    #[test]
    fn test_consume_drains_ring_first() {
        let mut buf = filled(&[&b"abc"[..], &b"def"[..]]);
        assert_eq!(buf.consume_n(4), 4);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.peek_all(), b"ef");
    }

    #[test]
    fn test_consume_within_ring() {
        let mut buf = filled(&[&b"abcd"[..], &b"ef"[..]]);
        assert_eq!(buf.consume_n(2), 2);
        assert_eq!(buf.peek_all(), b"cdef");
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_consume_zero_resets() {
        let mut buf = filled(&[&b"abc"[..], &b"def"[..]]);
        assert_eq!(buf.consume_n(0), 6);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_consume_past_end_resets() {
        let mut buf = filled(&[&b"abc"[..], &b"def"[..]]);
        assert_eq!(buf.consume_n(7), 6);
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_consume_then_len_arithmetic() {
        let mut buf = filled(&[&b"abcdef"[..]]);
        let before = buf.len();
        assert_eq!(buf.consume_n(2), 2);
        assert_eq!(buf.len(), before - 2);
        assert_eq!(buf.consume_n(4), 4);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_fill_after_spill_appends_in_order() {
        let mut buf = ConnBuffer::new();
        buf.fill(b"one");
        buf.spill();
        buf.fill(b"two");
        buf.spill();
        buf.fill(b"three");
        assert_eq!(buf.peek_all(), b"onetwothree");
    }

    #[test]
    fn test_join_cache_reused_within_call() {
        let mut buf = filled(&[&b"abc"[..], &b"def"[..]]);
        let first = buf.peek_all().as_ptr();
        let second = buf.peek_all().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut buf = filled(&[&b"abc"[..], &b"def"[..]]);
        buf.peek_all();
        buf.reset();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.peek_all(), b"");
    }
}
