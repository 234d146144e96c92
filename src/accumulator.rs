//! Byte accumulation across arbitrarily split deliveries
//!
//! A consumer registers interest in exactly `n` bytes with [`ByteAccumulator::expect`].
//! Deliveries are appended with [`ByteAccumulator::push`]. Once `n` bytes are
//! available, [`ByteAccumulator::next_ready`] hands them out together with the
//! label the consumer registered, and the expectation is cleared. Anything
//! beyond `n` stays buffered, in arrival order, and is replayed into whatever
//! expectation is registered next.
//!
//! # Example
//!
//! ```
//! use sockframe::accumulator::ByteAccumulator;
//!
//! let mut acc = ByteAccumulator::new();
//! acc.expect("header", 2);
//! acc.push(&[0x81]);
//! assert!(acc.next_ready().is_none());
//!
//! acc.push(&[0x02, b'h', b'i']);
//! let (label, bytes) = acc.next_ready().unwrap();
//! assert_eq!(label, "header");
//! assert_eq!(&bytes[..], &[0x81, 0x02]);
//!
//! // The payload arrived early and was kept as overflow
//! acc.expect("payload", 2);
//! let (_, bytes) = acc.next_ready().unwrap();
//! assert_eq!(&bytes[..], b"hi");
//! ```

use bytes::BytesMut;

/// A registered request for an exact number of bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation<L> {
    /// What the bytes are for
    pub label: L,
    /// Exact number of bytes to release
    pub target: usize,
}

/// Buffers raw deliveries and releases exact-length slices
#[derive(Debug)]
pub struct ByteAccumulator<L> {
    buffer: BytesMut,
    pending: Option<Expectation<L>>,
}

impl<L: Copy> ByteAccumulator<L> {
    /// Create an empty accumulator with nothing expected
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty accumulator with preallocated buffer space
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            pending: None,
        }
    }

    /// Register interest in exactly `target` bytes
    ///
    /// Only one expectation may be live at a time. Registering while an
    /// unsatisfied one is pending replaces it; callers only do so after
    /// the previous one has been handed out by `next_ready`.
    #[inline]
    pub fn expect(&mut self, label: L, target: usize) {
        debug_assert!(
            self.pending.is_none(),
            "expectation registered while another is pending"
        );
        self.pending = Some(Expectation { label, target });
    }

    /// Append a delivery
    #[inline]
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Release the pending expectation if enough bytes have arrived
    ///
    /// Returns exactly `target` bytes and clears the expectation. Returns
    /// `None` without touching anything when no expectation is pending or
    /// the buffer is still short.
    ///
    /// The slice is handed out owned and mutable so the consumer can unmask
    /// it in place.
    pub fn next_ready(&mut self) -> Option<(L, BytesMut)> {
        let pending = self.pending?;
        if self.buffer.len() < pending.target {
            return None;
        }
        self.pending = None;
        Some((pending.label, self.buffer.split_to(pending.target)))
    }

    /// The expectation currently waiting for bytes
    #[inline]
    pub fn pending(&self) -> Option<&Expectation<L>> {
        self.pending.as_ref()
    }

    /// Number of bytes held and not yet released
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes still missing before the pending expectation is satisfied
    #[inline]
    pub fn missing(&self) -> usize {
        self.pending
            .map(|p| p.target.saturating_sub(self.buffer.len()))
            .unwrap_or(0)
    }

    /// Drop every buffered byte and the pending expectation
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending = None;
    }
}

impl<L: Copy> Default for ByteAccumulator<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_then_complete() {
        let mut acc = ByteAccumulator::new();
        acc.expect(1u8, 4);

        acc.push(&[1, 2]);
        assert!(acc.next_ready().is_none());
        assert_eq!(acc.missing(), 2);

        acc.push(&[3]);
        assert!(acc.next_ready().is_none());

        acc.push(&[4]);
        let (label, bytes) = acc.next_ready().unwrap();
        assert_eq!(label, 1);
        assert_eq!(&bytes[..], &[1, 2, 3, 4]);
        assert!(acc.pending().is_none());
        assert_eq!(acc.buffered(), 0);
    }

    #[test]
    fn test_single_release_per_expectation() {
        let mut acc = ByteAccumulator::new();
        acc.expect((), 2);
        acc.push(&[9, 9, 9, 9]);

        assert!(acc.next_ready().is_some());
        // Nothing registered, surplus is held
        assert!(acc.next_ready().is_none());
        assert_eq!(acc.buffered(), 2);
    }

    #[test]
    fn test_overflow_replayed_in_order() {
        let mut acc = ByteAccumulator::new();
        acc.expect('a', 1);
        acc.push(&[10, 20, 30]);

        let (_, first) = acc.next_ready().unwrap();
        assert_eq!(&first[..], &[10]);

        acc.push(&[40]);
        acc.expect('b', 3);
        let (label, rest) = acc.next_ready().unwrap();
        assert_eq!(label, 'b');
        assert_eq!(&rest[..], &[20, 30, 40]);
    }

    #[test]
    fn test_held_without_expectation() {
        let mut acc: ByteAccumulator<u8> = ByteAccumulator::new();
        acc.push(b"early");
        assert!(acc.next_ready().is_none());
        assert_eq!(acc.missing(), 0);

        acc.expect(0, 5);
        let (_, bytes) = acc.next_ready().unwrap();
        assert_eq!(&bytes[..], b"early");
    }

    #[test]
    fn test_zero_length_expectation() {
        let mut acc = ByteAccumulator::new();
        acc.expect("empty", 0);
        let (label, bytes) = acc.next_ready().unwrap();
        assert_eq!(label, "empty");
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut acc = ByteAccumulator::new();
        acc.expect(0u8, 10);
        acc.push(&[1, 2, 3]);
        acc.clear();
        assert!(acc.pending().is_none());
        assert_eq!(acc.buffered(), 0);
    }
}
