//! Frame header layout, length ladder and frame encoding
//!
//! ```text
//! byte0: FIN(1) RSV(3) OPCODE(4)
//! byte1: MASK(1) PAYLOAD_LEN(7)
//!   0..=125  payload length
//!   126      next 2 bytes, big-endian
//!   127      next 8 bytes, big-endian, high 32 bits must be 0
//! [MASK] 4-byte key
//! payload
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::mask::apply_mask;
use crate::{MEDIUM_PAYLOAD_MAX, SMALL_PAYLOAD_MAX};

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const OPCODE_BITS: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LEN_BITS: u8 = 0x7F;

/// Inline length value announcing a 16-bit extended length
pub const LEN_EXTENDED_16: u8 = 126;
/// Inline length value announcing a 64-bit extended length
pub const LEN_EXTENDED_64: u8 = 127;

/// Frame opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation frame
    Continuation = 0x0,
    /// Text frame
    Text = 0x1,
    /// Binary frame
    Binary = 0x2,
    /// Connection close
    Close = 0x8,
    /// Ping
    Ping = 0x9,
    /// Pong
    Pong = 0xA,
}

impl OpCode {
    /// Parse opcode from the low nibble of the first header byte
    #[inline]
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(OpCode::Continuation),
            0x1 => Some(OpCode::Text),
            0x2 => Some(OpCode::Binary),
            0x8 => Some(OpCode::Close),
            0x9 => Some(OpCode::Ping),
            0xA => Some(OpCode::Pong),
            _ => None,
        }
    }

    /// Check if this is a control frame
    #[inline]
    pub fn is_control(&self) -> bool {
        (*self as u8) >= 0x8
    }

    /// Check if a message with this opcode may be split across frames
    #[inline]
    pub fn is_fragmentable(&self) -> bool {
        matches!(self, OpCode::Text | OpCode::Binary)
    }
}

/// The fixed two-byte part of a frame header, as read off the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHeader {
    /// Final fragment flag
    pub fin: bool,
    /// RSV1..RSV3, still in bit positions 4..6
    pub rsv: u8,
    /// Raw 4-bit opcode
    pub opcode: u8,
    /// Mask flag
    pub masked: bool,
    /// Seven-bit inline length
    pub inline_len: u8,
}

impl BaseHeader {
    /// Split the two header bytes into their fields
    #[inline]
    pub fn decode(bytes: [u8; 2]) -> Self {
        let [b0, b1] = bytes;
        Self {
            fin: b0 & FIN_BIT != 0,
            rsv: b0 & RSV_BITS,
            opcode: b0 & OPCODE_BITS,
            masked: b1 & MASK_BIT != 0,
            inline_len: b1 & LEN_BITS,
        }
    }

    /// Which rung of the length ladder this header uses
    #[inline]
    pub fn length_class(&self) -> LengthClass {
        LengthClass::from_inline(self.inline_len)
    }
}

/// Length encoding tier selected by the seven-bit inline length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthClass {
    /// The inline value is the length
    Inline(u8),
    /// Two more bytes follow
    Extended16,
    /// Eight more bytes follow
    Extended64,
}

impl LengthClass {
    /// Classify a seven-bit inline length
    #[inline]
    pub fn from_inline(inline_len: u8) -> Self {
        match inline_len & LEN_BITS {
            LEN_EXTENDED_16 => LengthClass::Extended16,
            LEN_EXTENDED_64 => LengthClass::Extended64,
            n => LengthClass::Inline(n),
        }
    }

    /// Number of length bytes that follow the base header
    #[inline]
    pub fn extra_bytes(&self) -> usize {
        match self {
            LengthClass::Inline(_) => 0,
            LengthClass::Extended16 => 2,
            LengthClass::Extended64 => 8,
        }
    }
}

/// Turn the extended length bytes of `class` into a payload length
///
/// `bytes` must hold exactly `class.extra_bytes()` bytes. Only the low 32
/// bits of a 64-bit length are supported.
pub fn resolve_extended_length(class: LengthClass, bytes: &[u8]) -> Result<u64> {
    match class {
        LengthClass::Inline(n) => Ok(n as u64),
        LengthClass::Extended16 => Ok(u16::from_be_bytes([bytes[0], bytes[1]]) as u64),
        LengthClass::Extended64 => {
            let high = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if high != 0 {
                return Err(Error::UnsupportedLength);
            }
            Ok(u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as u64)
        }
    }
}

/// Header size in bytes for a frame carrying `payload_len` bytes
#[inline]
pub fn header_size(payload_len: usize, masked: bool) -> usize {
    let ext = if payload_len > MEDIUM_PAYLOAD_MAX {
        8
    } else if payload_len > SMALL_PAYLOAD_MAX {
        2
    } else {
        0
    };
    2 + ext + if masked { 4 } else { 0 }
}

/// Encode a frame into `buf`
///
/// Picks the shortest length encoding. With a mask, the key is written after
/// the length and the payload is copied in masked.
pub fn encode_frame(
    buf: &mut BytesMut,
    opcode: OpCode,
    payload: &[u8],
    fin: bool,
    mask: Option<[u8; 4]>,
) {
    let payload_len = payload.len();
    buf.reserve(header_size(payload_len, mask.is_some()) + payload_len);

    let mut b0 = opcode as u8;
    if fin {
        b0 |= FIN_BIT;
    }
    buf.put_u8(b0);

    let mask_bit = if mask.is_some() { MASK_BIT } else { 0x00 };
    if payload_len <= SMALL_PAYLOAD_MAX {
        buf.put_u8(mask_bit | payload_len as u8);
    } else if payload_len <= MEDIUM_PAYLOAD_MAX {
        buf.put_u8(mask_bit | LEN_EXTENDED_16);
        buf.put_u16(payload_len as u16);
    } else {
        buf.put_u8(mask_bit | LEN_EXTENDED_64);
        buf.put_u64(payload_len as u64);
    }

    if let Some(m) = mask {
        buf.put_slice(&m);
        let start = buf.len();
        buf.put_slice(payload);
        apply_mask(&mut buf[start..], m);
    } else {
        buf.put_slice(payload);
    }
}
