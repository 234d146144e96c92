//! # sockframe: incremental WebSocket frame decoding
//!
//! Turns an unbounded sequence of arbitrarily chunked byte deliveries into
//! discrete events: complete text messages, pings, close requests and
//! protocol errors. A frame may arrive in any number of pieces, down to one
//! byte per delivery; decoding pauses when bytes run out and resumes with
//! the next chunk.
//!
//! ## Layers
//!
//! - [`accumulator`]: exact-length byte requests across deliveries
//! - [`frame`]: header layout, the three-tier length ladder, encoding
//! - [`mask`]: XOR masking
//! - [`parser`]: the frame state machine and per-opcode handling
//! - [`assembler`]: reassembly of fragmented text messages
//! - [`connection`]: a tokio adapter owning a parser and an [`Outbound`] strategy
//!
//! ## Example
//!
//! ```
//! use sockframe::{Event, Parser};
//!
//! let mut parser = Parser::default();
//! let events = parser.process(&[0x81, 0x02, 0x68, 0x69]);
//! assert!(matches!(&events[..], [Event::Data(text)] if text == "hi"));
//! ```
//!
//! Only text, ping, close and continuation frames are understood. The HTTP
//! upgrade handshake, TLS, binary payloads and extensions are left to other
//! layers.

pub mod accumulator;
pub mod assembler;
pub mod connection;
pub mod error;
pub mod frame;
pub mod mask;
pub mod outbound;
pub mod parser;
pub mod utf8;

pub use connection::Connection;
pub use error::{Error, Result};
pub use frame::OpCode;
pub use outbound::{FramedOutbound, Outbound, Role};
pub use parser::{Event, Parser, ParserState, ParserStats, Stage};

/// Maximum frame header size (2 + 8 + 4 = 14 bytes)
pub const MAX_FRAME_HEADER_SIZE: usize = 14;

/// Largest payload that fits the inline seven-bit length
pub const SMALL_PAYLOAD_MAX: usize = 125;

/// Largest payload that fits the 16-bit extended length
pub const MEDIUM_PAYLOAD_MAX: usize = 65535;

/// Default receive buffer size (64KB)
pub const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// What to do with text payloads that are not valid UTF-8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Utf8Policy {
    /// Replace invalid sequences with U+FFFD
    #[default]
    Lossy,
    /// Report [`Error::InvalidUtf8`] and reset
    Strict,
}

/// Decoder and connection configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Largest payload a single frame may announce (default: 16MB)
    pub max_frame_size: usize,
    /// Largest reassembled text message (default: 64MB)
    pub max_message_size: usize,
    /// Handling of invalid UTF-8 (default: lossy)
    pub utf8_policy: Utf8Policy,
    /// Bytes requested from the transport per read (default: 64KB)
    pub read_buffer_size: usize,
    /// Answer pings automatically (default: true)
    pub auto_pong: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            utf8_policy: Utf8Policy::Lossy,
            read_buffer_size: RECV_BUFFER_SIZE,
            auto_pong: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for [`Config`]
///
/// # Example
///
/// ```
/// use sockframe::{Config, Utf8Policy};
///
/// let config = Config::builder()
///     .max_payload_length(1024 * 1024)
///     .utf8_policy(Utf8Policy::Strict)
///     .auto_pong(false)
///     .build();
/// assert_eq!(config.max_frame_size, 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set both the frame and the message limit
    pub fn max_payload_length(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self.config.max_message_size = size;
        self
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    pub fn utf8_policy(mut self, policy: Utf8Policy) -> Self {
        self.config.utf8_policy = policy;
        self
    }

    /// Set the per-read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Enable or disable automatic pong replies
    pub fn auto_pong(mut self, enabled: bool) -> Self {
        self.config.auto_pong = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::frame::OpCode;
    pub use crate::parser::{Event, Parser};
    pub use crate::{Config, Connection, Utf8Policy};
}
