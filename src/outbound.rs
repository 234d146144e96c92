//! Outbound write strategies
//!
//! A [`Connection`](crate::Connection) decodes with its own [`Parser`](crate::Parser)
//! and hands everything it sends to an [`Outbound`] implementation, so the
//! decoder never needs to know how replies are framed on the wire.

use bytes::{BufMut, BytesMut};

use crate::frame::{OpCode, encode_frame};
use crate::mask::generate_mask;

/// Endpoint role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Client (masks every frame it sends)
    Client,
    /// Server (never masks)
    Server,
}

/// How replies and messages are written to the transport
pub trait Outbound {
    /// Append one complete text message
    fn encode_text(&mut self, text: &str, buf: &mut BytesMut);

    /// Append the answer to a ping carrying `payload`
    fn encode_pong(&mut self, payload: &[u8], buf: &mut BytesMut);

    /// Append a close notice, optionally carrying a status code
    fn encode_close(&mut self, code: Option<u16>, buf: &mut BytesMut);
}

/// Writes standard frames, masked when acting as a client
#[derive(Debug, Clone, Copy)]
pub struct FramedOutbound {
    role: Role,
}

impl FramedOutbound {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    fn mask(&self) -> Option<[u8; 4]> {
        match self.role {
            Role::Client => Some(generate_mask()),
            Role::Server => None,
        }
    }
}

impl Outbound for FramedOutbound {
    fn encode_text(&mut self, text: &str, buf: &mut BytesMut) {
        encode_frame(buf, OpCode::Text, text.as_bytes(), true, self.mask());
    }

    fn encode_pong(&mut self, payload: &[u8], buf: &mut BytesMut) {
        encode_frame(buf, OpCode::Pong, payload, true, self.mask());
    }

    fn encode_close(&mut self, code: Option<u16>, buf: &mut BytesMut) {
        let mut payload = BytesMut::with_capacity(2);
        if let Some(code) = code {
            payload.put_u16(code);
        }
        encode_frame(buf, OpCode::Close, &payload, true, self.mask());
    }
}
