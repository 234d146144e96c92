//! Error types for the frame decoder

use std::fmt;
use std::io;

/// Result type alias for decoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Decoder and transport errors
///
/// The decode variants are detected synchronously while reading a header or
/// resolving a length. The parser never returns them from `process`; it resets
/// itself and reports them as [`Event::Error`](crate::Event::Error).
#[derive(Debug)]
pub enum Error {
    /// One of RSV1..RSV3 was set; no extension is ever negotiated
    ReservedBitsSet,
    /// Opcode outside of continuation, text, close and ping
    UnknownOpcode(u8),
    /// Continuation frame without a matching fragmented message, or a new
    /// data frame while a fragmented message is still open
    InvalidContinuationOrder,
    /// 64-bit length with any of the high 32 bits set
    UnsupportedLength,
    /// Ping frame without the FIN bit
    FragmentedPingNotSupported,
    /// Resolved payload length exceeds the configured frame limit
    FrameTooLarge { len: u64, max: usize },
    /// Assembled message exceeds the configured message limit
    MessageTooLarge { len: usize, max: usize },
    /// Payload is not UTF-8 and the strict policy is in effect
    InvalidUtf8,
    /// I/O error from the underlying transport
    Io(io::Error),
    /// Transport reached EOF or refused a write
    ConnectionClosed,
}

impl Error {
    /// Close status: protocol error
    pub const CLOSE_PROTOCOL: u16 = 1002;
    /// Close status: invalid frame payload data
    pub const CLOSE_INVALID_PAYLOAD: u16 = 1007;
    /// Close status: message too big
    pub const CLOSE_TOO_BIG: u16 = 1009;
    /// Close status: internal error
    pub const CLOSE_INTERNAL: u16 = 1011;

    /// True for errors raised by the decoder itself, as opposed to the transport
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::ConnectionClosed)
    }

    /// The close status an endpoint would send in response to this error
    pub fn close_code(&self) -> u16 {
        match self {
            Error::ReservedBitsSet
            | Error::UnknownOpcode(_)
            | Error::InvalidContinuationOrder
            | Error::FragmentedPingNotSupported => Self::CLOSE_PROTOCOL,
            Error::InvalidUtf8 => Self::CLOSE_INVALID_PAYLOAD,
            Error::UnsupportedLength
            | Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. } => Self::CLOSE_TOO_BIG,
            Error::Io(_) | Error::ConnectionClosed => Self::CLOSE_INTERNAL,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ReservedBitsSet => write!(f, "RSV1, RSV2, RSV3 must be clear"),
            Error::UnknownOpcode(op) => write!(f, "unsupported opcode: {:#x}", op),
            Error::InvalidContinuationOrder => {
                write!(f, "continuation frame without an open fragmented message")
            }
            Error::UnsupportedLength => {
                write!(f, "payload length does not fit in 32 bits")
            }
            Error::FragmentedPingNotSupported => write!(f, "fragmented ping is not supported"),
            Error::FrameTooLarge { len, max } => {
                write!(f, "frame too large: {} bytes (limit {})", len, max)
            }
            Error::MessageTooLarge { len, max } => {
                write!(f, "message too large: {} bytes (limit {})", len, max)
            }
            Error::InvalidUtf8 => write!(f, "invalid UTF-8 in text payload"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}
