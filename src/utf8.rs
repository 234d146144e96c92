//! Text decoding for payloads
//!
//! Validation goes through `simdutf8`, which picks the widest SIMD path the
//! CPU offers and falls back to the standard library elsewhere.

use crate::Utf8Policy;
use crate::error::{Error, Result};

/// Decode `data` as text under `policy`
///
/// `Strict` rejects invalid input with [`Error::InvalidUtf8`]. `Lossy`
/// substitutes U+FFFD for every invalid sequence and never fails.
pub fn decode_text(data: &[u8], policy: Utf8Policy) -> Result<String> {
    match simdutf8::basic::from_utf8(data) {
        Ok(text) => Ok(text.to_owned()),
        Err(_) => match policy {
            Utf8Policy::Strict => Err(Error::InvalidUtf8),
            Utf8Policy::Lossy => Ok(String::from_utf8_lossy(data).into_owned()),
        },
    }
}
