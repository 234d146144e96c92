//! Connection adapter over an async transport
//!
//! [`Connection`] owns a transport, one [`Parser`] and one [`Outbound`]
//! strategy. It reads whatever the transport delivers, feeds it to the
//! parser and hands the resulting events out one at a time.
//!
//! # Example
//!
//! ```ignore
//! use sockframe::{Config, Connection, Event};
//!
//! async fn handle(stream: tokio::net::TcpStream) -> sockframe::Result<()> {
//!     let mut conn = Connection::server(stream, Config::default());
//!     while let Some(event) = conn.recv().await? {
//!         match event {
//!             Event::Data(text) => conn.send_text(&text).await?,
//!             Event::Error(err) => {
//!                 conn.close(Some(err.close_code())).await?;
//!                 break;
//!             }
//!             Event::Close => break,
//!             Event::Ping(_) => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::{Config, MAX_FRAME_HEADER_SIZE, SMALL_PAYLOAD_MAX};
use crate::error::{Error, Result};
use crate::outbound::{FramedOutbound, Outbound, Role};
use crate::parser::{Event, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Open,
    /// We sent a close notice
    CloseSent,
    /// Peer closed, or the transport hit EOF
    Closed,
}

/// A decoding connection over `S`, replying through `O`
pub struct Connection<S, O = FramedOutbound> {
    inner: S,
    parser: Parser,
    outbound: O,
    config: Config,
    read_buf: Vec<u8>,
    write_buf: BytesMut,
    scratch: Vec<Event>,
    pending: VecDeque<Event>,
    /// The reply owed for the front pending event is already in `write_buf`
    reply_queued: bool,
    state: ConnState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Server-side connection: unmasked replies
    pub fn server(inner: S, config: Config) -> Self {
        Self::with_outbound(inner, FramedOutbound::new(Role::Server), config)
    }

    /// Client-side connection: masked replies
    pub fn client(inner: S, config: Config) -> Self {
        Self::with_outbound(inner, FramedOutbound::new(Role::Client), config)
    }
}

impl<S, O> Connection<S, O>
where
    S: AsyncRead + AsyncWrite + Unpin,
    O: Outbound,
{
    /// Create a connection with a custom outbound strategy
    pub fn with_outbound(inner: S, outbound: O, config: Config) -> Self {
        Self {
            inner,
            parser: Parser::new(&config),
            outbound,
            read_buf: vec![0; config.read_buffer_size.max(1)],
            write_buf: BytesMut::with_capacity(MAX_FRAME_HEADER_SIZE + SMALL_PAYLOAD_MAX),
            scratch: Vec::new(),
            pending: VecDeque::new(),
            reply_queued: false,
            state: ConnState::Open,
            config,
        }
    }

    /// Wait for the next event
    ///
    /// Returns `Ok(None)` once the peer's close has been delivered or the
    /// transport reaches EOF. Pings are answered before they are returned
    /// when `auto_pong` is set. A peer close is answered with a close notice
    /// unless one was already sent.
    ///
    /// An event stays queued until its reply has been flushed, so a failed
    /// write can be retried with another `recv` without losing the event or
    /// encoding the reply twice.
    pub async fn recv(&mut self) -> Result<Option<Event>> {
        loop {
            if let Some(event) = self.pending.front() {
                if !self.reply_queued && self.state == ConnState::Open {
                    match event {
                        Event::Ping(payload) if self.config.auto_pong => {
                            self.outbound
                                .encode_pong(payload.as_bytes(), &mut self.write_buf);
                        }
                        Event::Close => self.outbound.encode_close(None, &mut self.write_buf),
                        _ => {}
                    }
                }
                self.reply_queued = true;
                self.flush_write_buf().await?;
                self.reply_queued = false;

                if let Some(event) = self.pending.pop_front() {
                    if matches!(event, Event::Close) {
                        self.state = ConnState::Closed;
                        self.pending.clear();
                    }
                    return Ok(Some(event));
                }
            }

            if self.state == ConnState::Closed {
                return Ok(None);
            }

            let n = self.inner.read(&mut self.read_buf).await?;
            if n == 0 {
                debug!("transport reached EOF");
                self.state = ConnState::Closed;
                return Ok(None);
            }

            self.parser
                .process_into(&self.read_buf[..n], &mut self.scratch);
            self.pending.extend(self.scratch.drain(..));
        }
    }

    /// Send one text message
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        if self.state != ConnState::Open {
            return Err(Error::ConnectionClosed);
        }
        self.outbound.encode_text(text, &mut self.write_buf);
        self.flush_write_buf().await
    }

    /// Send a close notice; later calls are no-ops
    pub async fn close(&mut self, code: Option<u16>) -> Result<()> {
        if self.state != ConnState::Open {
            return Ok(());
        }
        self.outbound.encode_close(code, &mut self.write_buf);
        self.state = ConnState::CloseSent;
        self.flush_write_buf().await
    }

    /// Swap in new limits without dropping buffered or partial state
    pub fn reconfigure(&mut self, config: Config) {
        self.parser.reconfigure(&config);
        let size = config.read_buffer_size.max(1);
        if size != self.read_buf.len() {
            self.read_buf.resize(size, 0);
        }
        self.config = config;
    }

    /// The decoder driving this connection
    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if the connection is fully closed
    pub fn is_closed(&self) -> bool {
        self.state == ConnState::Closed
    }

    /// Get a reference to the underlying transport
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consume the connection and return the underlying transport
    pub fn into_inner(self) -> S {
        self.inner
    }

    async fn flush_write_buf(&mut self) -> Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        self.inner.write_all(&self.write_buf).await?;
        self.write_buf.clear();
        self.inner.flush().await?;
        Ok(())
    }
}
