//! Incremental frame decoder
//!
//! [`Parser`] turns byte chunks of any size into [`Event`]s. It never assumes
//! a frame arrives in one delivery: every step of a frame (base header,
//! extended length, mask key, payload) is an exact-length request against a
//! [`ByteAccumulator`], and the request currently outstanding is recorded as
//! a [`Stage`]. When a chunk runs out mid-frame, `process` returns and the
//! next chunk resumes exactly where decoding stopped.
//!
//! Protocol violations never escape as a hard failure. The parser resets
//! itself, discarding whatever was buffered, and reports a single
//! [`Event::Error`]. The owner decides whether to drop the connection.
//!
//! A close frame is read to its end, mask key and payload included, and
//! then latches the parser shut: later input is dropped until the owner
//! calls [`Parser::reset`].
//!
//! # Example
//!
//! ```
//! use sockframe::{Event, Parser};
//!
//! let mut parser = Parser::default();
//! let mut events = parser.process(&[0x81, 0x02, b'h']);
//! assert!(events.is_empty());
//!
//! events = parser.process(&[b'i', 0x89, 0x00]);
//! assert!(matches!(&events[0], Event::Data(text) if text == "hi"));
//! assert!(matches!(&events[1], Event::Ping(payload) if payload.is_empty()));
//! ```

use std::fmt;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::accumulator::ByteAccumulator;
use crate::assembler::MessageAssembler;
use crate::error::{Error, Result};
use crate::frame::{BaseHeader, LengthClass, OpCode, resolve_extended_length};
use crate::mask::{apply_mask, unmask};
use crate::{Config, Utf8Policy};

/// Size of the fixed part of every frame header
const BASE_HEADER_LEN: usize = 2;
/// Size of a mask key
const MASK_KEY_LEN: usize = 4;

/// What the parser is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The two fixed header bytes
    Header,
    /// Extended length bytes of the given class
    Length(LengthClass),
    /// The four-byte mask key
    Mask,
    /// The payload, of the given length
    Payload(usize),
}

impl Stage {
    /// Short diagnostic tag
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Header => "Opcode",
            Stage::Length(_) => "Length",
            Stage::Mask => "Mask",
            Stage::Payload(_) => "Data",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A logical event produced by the decoder
#[derive(Debug)]
pub enum Event {
    /// One complete text message, already reassembled from its fragments
    Data(String),
    /// Ping payload, possibly empty
    Ping(String),
    /// The peer asked to close the connection
    Close,
    /// Protocol violation; the parser has already reset itself
    Error(Error),
}

impl Event {
    /// Check if this is an error event
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Event::Error(_))
    }
}

/// Per-connection fragmentation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserState {
    /// Opcode of the fragmented message in progress, if any
    pub active_fragmented_operation: Option<OpCode>,
    /// FIN bit of the frame being decoded
    pub last_fragment: bool,
    /// MASK bit of the frame being decoded
    pub masked: bool,
    /// Opcode of the frame being decoded, with continuations resolved
    pub opcode: OpCode,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            active_fragmented_operation: None,
            last_fragment: false,
            masked: false,
            opcode: OpCode::Continuation,
        }
    }
}

/// Running totals, kept across resets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames decoded to completion, control frames included
    pub frames: u64,
    /// Text messages emitted
    pub messages: u64,
    /// Pings emitted
    pub pings: u64,
    /// Protocol violations reported
    pub errors: u64,
}

/// Incremental frame decoder, one per connection
#[derive(Debug)]
pub struct Parser {
    acc: ByteAccumulator<Stage>,
    state: ParserState,
    message: MessageAssembler,
    mask: Option<[u8; 4]>,
    payload_len: usize,
    max_frame_size: usize,
    utf8_policy: Utf8Policy,
    stats: ParserStats,
    closed: bool,
}

impl Parser {
    /// Create a parser armed for the first frame header
    pub fn new(config: &Config) -> Self {
        let mut parser = Self {
            acc: ByteAccumulator::new(),
            state: ParserState::default(),
            message: MessageAssembler::new(config.max_message_size),
            mask: None,
            payload_len: 0,
            max_frame_size: config.max_frame_size,
            utf8_policy: config.utf8_policy,
            stats: ParserStats::default(),
            closed: false,
        };
        parser.acc.expect(Stage::Header, BASE_HEADER_LEN);
        parser
    }

    /// Feed a chunk and return the events it completed
    pub fn process(&mut self, chunk: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        self.process_into(chunk, &mut events);
        events
    }

    /// Feed a chunk, appending completed events to `events`
    ///
    /// Consumes as much as the buffered bytes allow and returns; nothing
    /// here blocks or waits.
    pub fn process_into(&mut self, chunk: &[u8], events: &mut Vec<Event>) {
        if self.closed {
            trace!(len = chunk.len(), "input after close dropped");
            return;
        }
        self.acc.push(chunk);

        while let Some((stage, bytes)) = self.acc.next_ready() {
            if let Err(err) = self.step(stage, bytes, events) {
                self.fail(stage, err, events);
                break;
            }
        }
    }

    /// Discard all buffered bytes and partial frame or message state
    ///
    /// The parser is left waiting for a fresh frame header, which also
    /// reopens it after a close frame.
    pub fn reset(&mut self) {
        self.clear_frame_state();
        self.closed = false;
        self.acc.expect(Stage::Header, BASE_HEADER_LEN);
    }

    /// Apply new limits and text policy
    ///
    /// Buffered bytes and a partially assembled message are kept.
    pub fn reconfigure(&mut self, config: &Config) {
        self.max_frame_size = config.max_frame_size;
        self.utf8_policy = config.utf8_policy;
        self.message.set_max_message_size(config.max_message_size);
    }

    /// Fragmentation state
    #[inline]
    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// The step currently waiting for bytes
    #[inline]
    pub fn stage(&self) -> Option<Stage> {
        self.acc.pending().map(|p| p.label)
    }

    /// Bytes received but not yet consumed by a step
    #[inline]
    pub fn buffered(&self) -> usize {
        self.acc.buffered()
    }

    /// Running totals
    #[inline]
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// True once a close frame has been decoded and until the next `reset`
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn clear_frame_state(&mut self) {
        self.acc.clear();
        self.message.clear();
        self.state = ParserState::default();
        self.mask = None;
        self.payload_len = 0;
    }

    fn step(&mut self, stage: Stage, bytes: BytesMut, events: &mut Vec<Event>) -> Result<()> {
        match stage {
            Stage::Header => self.process_header([bytes[0], bytes[1]], events),
            Stage::Length(class) => {
                let len = resolve_extended_length(class, &bytes)?;
                self.length_resolved(len)
            }
            Stage::Mask => {
                self.mask = Some([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let len = self.payload_len;
                self.acc.expect(Stage::Payload(len), len);
                Ok(())
            }
            Stage::Payload(_) => self.process_payload(bytes, events),
        }
    }

    /// Decode the two fixed header bytes and dispatch on the opcode
    fn process_header(&mut self, bytes: [u8; 2], events: &mut Vec<Event>) -> Result<()> {
        let header = BaseHeader::decode(bytes);
        if header.rsv != 0 {
            return Err(Error::ReservedBitsSet);
        }

        self.state.last_fragment = header.fin;
        self.state.masked = header.masked;

        let is_continuation = header.opcode == OpCode::Continuation as u8;
        self.state.opcode = if is_continuation {
            match self.state.active_fragmented_operation {
                Some(op) if op.is_fragmentable() => op,
                _ => return Err(Error::InvalidContinuationOrder),
            }
        } else {
            OpCode::from_u8(header.opcode).ok_or(Error::UnknownOpcode(header.opcode))?
        };

        trace!(
            opcode = header.opcode,
            fin = header.fin,
            masked = header.masked,
            inline_len = header.inline_len,
            "frame header"
        );

        match self.state.opcode {
            OpCode::Text => self.begin_text(header, is_continuation),
            OpCode::Ping => self.begin_ping(header, events),
            OpCode::Close => self.resolve_length(header.length_class()),
            OpCode::Continuation | OpCode::Binary | OpCode::Pong => {
                Err(Error::UnknownOpcode(header.opcode))
            }
        }
    }

    fn begin_text(&mut self, header: BaseHeader, is_continuation: bool) -> Result<()> {
        if !is_continuation {
            if self.state.active_fragmented_operation.is_some() {
                return Err(Error::InvalidContinuationOrder);
            }
            if !header.fin {
                self.state.active_fragmented_operation = Some(OpCode::Text);
            }
        }
        self.resolve_length(header.length_class())
    }

    fn begin_ping(&mut self, header: BaseHeader, events: &mut Vec<Event>) -> Result<()> {
        if !header.fin {
            return Err(Error::FragmentedPingNotSupported);
        }
        // An unmasked empty ping has nothing after the header
        if header.inline_len == 0 && !header.masked {
            self.emit_ping(String::new(), events);
            self.end_packet();
            return Ok(());
        }
        self.resolve_length(header.length_class())
    }

    /// Payload already consumed; drop everything else and latch shut
    fn handle_close(&mut self, events: &mut Vec<Event>) {
        debug!(
            payload_len = self.payload_len,
            dropped = self.acc.buffered(),
            "close frame received"
        );
        self.stats.frames += 1;
        events.push(Event::Close);
        self.clear_frame_state();
        self.closed = true;
    }

    fn resolve_length(&mut self, class: LengthClass) -> Result<()> {
        match class {
            LengthClass::Inline(len) => self.length_resolved(len as u64),
            _ => {
                self.acc.expect(Stage::Length(class), class.extra_bytes());
                Ok(())
            }
        }
    }

    fn length_resolved(&mut self, len: u64) -> Result<()> {
        if len > self.max_frame_size as u64 {
            return Err(Error::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }
        let len = len as usize;

        if self.state.opcode == OpCode::Text {
            // Refuse before buffering a payload that could never be delivered
            let total = self.message.len() + len;
            if total > self.message_limit() {
                return Err(Error::MessageTooLarge {
                    len: total,
                    max: self.message_limit(),
                });
            }
        }

        self.payload_len = len;
        if self.state.masked {
            self.acc.expect(Stage::Mask, MASK_KEY_LEN);
        } else {
            self.acc.expect(Stage::Payload(len), len);
        }
        Ok(())
    }

    fn process_payload(&mut self, mut payload: BytesMut, events: &mut Vec<Event>) -> Result<()> {
        match self.state.opcode {
            OpCode::Text => {
                if let Some(key) = self.mask {
                    apply_mask(&mut payload, key);
                }
                self.message.push(&payload)?;
                if self.state.last_fragment {
                    let text = self.message.finish(self.utf8_policy)?;
                    debug!(len = text.len(), "text message complete");
                    self.stats.messages += 1;
                    events.push(Event::Data(text));
                }
            }
            OpCode::Ping => {
                let text = unmask(self.mask, &mut payload, self.utf8_policy)?;
                self.emit_ping(text, events);
            }
            OpCode::Close => {
                self.handle_close(events);
                return Ok(());
            }
            other => return Err(Error::UnknownOpcode(other as u8)),
        }
        self.end_packet();
        Ok(())
    }

    fn emit_ping(&mut self, payload: String, events: &mut Vec<Event>) {
        debug!(len = payload.len(), "ping");
        self.stats.pings += 1;
        events.push(Event::Ping(payload));
    }

    /// Close out the current frame and wait for the next header
    fn end_packet(&mut self) {
        self.stats.frames += 1;
        self.mask = None;
        self.payload_len = 0;

        let active = self.state.active_fragmented_operation;
        if self.state.last_fragment && active == Some(self.state.opcode) {
            self.state.active_fragmented_operation = None;
        } else if let Some(op) = active {
            self.state.opcode = op;
        }

        trace!(active = ?self.state.active_fragmented_operation, "frame complete");
        self.acc.expect(Stage::Header, BASE_HEADER_LEN);
    }

    fn fail(&mut self, stage: Stage, err: Error, events: &mut Vec<Event>) {
        warn!(error = %err, %stage, "protocol violation");
        self.stats.errors += 1;
        self.reset();
        events.push(Event::Error(err));
    }

    #[inline]
    fn message_limit(&self) -> usize {
        self.message.max_message_size()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
