//! Reassembly of fragmented text messages
//!
//! Fragment payloads are collected as raw bytes and decoded once, when the
//! terminal fragment arrives. A multi-byte character split across two
//! fragments therefore survives reassembly.

use bytes::BytesMut;

use crate::Utf8Policy;
use crate::error::{Error, Result};
use crate::utf8::decode_text;

/// Collects fragment payloads of one logical message
#[derive(Debug)]
pub struct MessageAssembler {
    buf: BytesMut,
    max_message_size: usize,
}

impl MessageAssembler {
    /// Create an assembler that refuses messages larger than `max_message_size`
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_message_size,
        }
    }

    /// Append an already unmasked fragment payload
    pub fn push(&mut self, fragment: &[u8]) -> Result<()> {
        let len = self.buf.len() + fragment.len();
        if len > self.max_message_size {
            return Err(Error::MessageTooLarge {
                len,
                max: self.max_message_size,
            });
        }
        self.buf.extend_from_slice(fragment);
        Ok(())
    }

    /// Decode and hand out the assembled message, leaving the assembler empty
    pub fn finish(&mut self, policy: Utf8Policy) -> Result<String> {
        let data = self.buf.split();
        decode_text(&data, policy)
    }

    /// Bytes collected so far
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop any partial message
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Largest message this assembler accepts
    #[inline]
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub(crate) fn set_max_message_size(&mut self, max: usize) {
        self.max_message_size = max;
    }
}
