//! Payload masking
//!
//! The mask transform XORs each payload byte with `key[i % 4]`. Applying the
//! same key twice restores the input, so one routine serves both directions.

use crate::Utf8Policy;
use crate::error::Result;
use crate::utf8::decode_text;

/// Apply a 4-byte mask to `data` in place
///
/// Works eight bytes at a time and finishes the tail byte by byte. Since 8 is
/// a multiple of 4, the key phase is the same at the start of every word.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    if data.is_empty() {
        return;
    }

    let mask_u64 = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut words = data.chunks_exact_mut(8);
    for word in &mut words {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(word);
        let xored = u64::from_ne_bytes(bytes) ^ mask_u64;
        word.copy_from_slice(&xored.to_ne_bytes());
    }

    for (i, byte) in words.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

/// Unmask `payload` in place when a key is present and decode it as text
///
/// An empty payload decodes to an empty string whether or not a key is given.
pub fn unmask(mask: Option<[u8; 4]>, payload: &mut [u8], policy: Utf8Policy) -> Result<String> {
    if payload.is_empty() {
        return Ok(String::new());
    }
    if let Some(key) = mask {
        apply_mask(payload, key);
    }
    decode_text(payload, policy)
}

/// Generate a fresh mask key for client-to-server frames
///
/// Masking only has to be unpredictable to intermediaries, so a fast
/// non-cryptographic generator is enough.
#[inline]
pub fn generate_mask() -> [u8; 4] {
    fastrand::u32(..).to_ne_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_mask_basic() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask);
        assert_ne!(data, original);

        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_apply_mask_matches_bytewise() {
        let mask = [0x01, 0x80, 0xfe, 0x5a];
        for len in 0..40usize {
            let original: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let mut fast = original.clone();
            apply_mask(&mut fast, mask);

            let slow: Vec<u8> = original
                .iter()
                .enumerate()
                .map(|(i, b)| b ^ mask[i % 4])
                .collect();
            assert_eq!(fast, slow, "length {}", len);
        }
    }

    #[test]
    fn test_apply_mask_rfc_example() {
        // RFC 6455 section 5.7, masked "Hello"
        let mut data = [0x7f, 0x9f, 0x4d, 0x51, 0x58];
        apply_mask(&mut data, [0x37, 0xfa, 0x21, 0x3d]);
        assert_eq!(&data, b"Hello");
    }

    #[test]
    fn test_unmask_involution() {
        let keys = [[0u8; 4], [0xff; 4], [0x12, 0x34, 0x56, 0x78]];
        for key in keys {
            let original = "fragment ünïcödé payload".as_bytes().to_vec();
            let mut data = original.clone();
            apply_mask(&mut data, key);
            let text = unmask(Some(key), &mut data, Utf8Policy::Strict).unwrap();
            assert_eq!(text.as_bytes(), &original[..]);
        }
    }

    #[test]
    fn test_unmask_without_key() {
        let mut data = b"plain".to_vec();
        assert_eq!(unmask(None, &mut data, Utf8Policy::Lossy).unwrap(), "plain");
    }

    #[test]
    fn test_unmask_empty() {
        let mut data: Vec<u8> = Vec::new();
        assert_eq!(
            unmask(Some([1, 2, 3, 4]), &mut data, Utf8Policy::Strict).unwrap(),
            ""
        );
        assert_eq!(unmask(None, &mut data, Utf8Policy::Strict).unwrap(), "");
    }

    #[test]
    fn test_generate_mask_varies() {
        let masks: Vec<[u8; 4]> = (0..8).map(|_| generate_mask()).collect();
        assert!(masks.windows(2).any(|w| w[0] != w[1]));
    }
}
