//! Binary codec for encoding and decoding rdbg commands.
//!
//! Wire format:
//! ```text
//! [frame_len:4][kind:4][version:4][qualifier_len:4][qualifier:N][payload:M]
//! ```
//! `frame_len` counts everything after itself. All multi-byte integers are
//! big-endian on every platform; the envelope fields are written once here
//! and the payload is written by the command variant itself.

use std::io;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::protocol::channel::Channel;
use crate::protocol::kind::CommandKind;
use crate::protocol::wire::{WireReader, WireWriter};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Version stamped on outgoing commands by default.
pub const PROTOCOL_VERSION: i32 = 1;

/// Size of the frame length prefix in bytes.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Default upper bound for a single frame (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Errors that can occur while moving a command across the wire.
///
/// These are *wire* errors: they say nothing about whether the command would
/// have succeeded. Application failures travel inside the command's own reply
/// payload instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// The channel failed mid-operation.
    #[error("channel I/O error: {0}")]
    Io(String),

    /// The peer closed the channel cleanly between frames.
    #[error("channel closed by peer")]
    Closed,

    /// The kind id is not in the closed enumeration (or has no constructor).
    #[error("unknown command kind: {0}")]
    UnknownKind(i32),

    /// The bytes ended before a field could be read.
    #[error("truncated data: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// A field could not be parsed (bad UTF-8, out-of-range value, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The frame length prefix exceeds the configured maximum.
    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { len: u32, max: u32 },

    /// A kind arrived from the side that is not allowed to originate it.
    #[error("{kind} may not be sent in this direction")]
    UnexpectedDirection { kind: CommandKind },

    /// A reply of the wrong kind arrived while another reply was awaited.
    #[error("expected a {expected} reply, received {got}")]
    UnexpectedReply {
        expected: CommandKind,
        got: CommandKind,
    },
}

impl ProtocolError {
    /// Returns `true` if the stream is still in sync and the receiver may
    /// simply skip the offending frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::UnknownKind(_))
    }

    /// The human-readable wire error carried back to the caller.
    pub fn wire_error(&self) -> String {
        self.to_string()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Command`] envelope and payload, without the frame prefix.
///
/// # Examples
///
/// ```rust
/// use rdbg_core::{decode_command, encode_command, Command, CommandKind};
///
/// let cmd = Command::breakpoint("file.php:42");
/// let bytes = encode_command(&cmd);
/// let decoded = decode_command(&bytes).unwrap();
/// assert_eq!(decoded.kind(), CommandKind::Break);
/// assert_eq!(decoded, cmd);
/// ```
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let mut w = WireWriter::new();
    w.write_i32(cmd.kind().id());
    w.write_i32(cmd.version());
    w.write_string(cmd.qualifier());
    cmd.encode_payload(&mut w);
    w.into_bytes()
}

/// Encodes a [`Command`] with its `u32` frame length prefix.
pub fn encode_frame(cmd: &Command) -> Vec<u8> {
    let body = encode_command(cmd);
    let mut frame = Vec::with_capacity(FRAME_PREFIX_SIZE + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// Decodes one [`Command`] from an unframed envelope.
///
/// Trailing bytes after the payload are ignored so that a newer peer may
/// append fields without breaking an older one.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownKind`] for ids outside the enumeration and
/// other [`ProtocolError`] variants for truncated or malformed bytes. No
/// partially decoded command is ever returned.
pub fn decode_command(bytes: &[u8]) -> Result<Command, ProtocolError> {
    let mut r = WireReader::new(bytes);
    let kind_id = r.read_i32()?;
    let version = r.read_i32()?;
    let qualifier = r.read_string()?;

    let mut cmd = Command::from_id(kind_id)?;
    cmd.set_version(version);
    cmd.set_qualifier(qualifier);
    cmd.decode_payload(&mut r)?;

    if r.remaining() > 0 {
        trace!(
            kind = %cmd.kind(),
            version,
            trailing = r.remaining(),
            "ignoring trailing payload bytes"
        );
    }
    Ok(cmd)
}

// ── Channel-bound codec ───────────────────────────────────────────────────────

/// Sends and receives framed commands over an exclusively-owned [`Channel`].
///
/// A codec is held by exactly one connection; commands only borrow it for the
/// duration of a `send` or `recv` call.
#[derive(Debug)]
pub struct WireCodec<C> {
    channel: C,
    max_frame_len: u32,
}

impl<C: Channel> WireCodec<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Overrides the maximum accepted (and emitted) frame size.
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Writes one framed command.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] if the encoded command exceeds
    /// the limit, or [`ProtocolError::Io`] if the channel write fails.
    pub fn send(&mut self, cmd: &Command) -> Result<(), ProtocolError> {
        let frame = encode_frame(cmd);
        let len = (frame.len() - FRAME_PREFIX_SIZE) as u32;
        if len > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        self.channel
            .write_exact(&frame)
            .map_err(|e| ProtocolError::Io(e.to_string()))?;
        trace!(kind = %cmd.kind(), len, "sent command");
        Ok(())
    }

    /// Reads one framed command.
    ///
    /// The whole frame is consumed before decoding, so an
    /// [`ProtocolError::UnknownKind`] leaves the stream positioned at the next
    /// frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Closed`] on a clean end-of-stream before a
    /// frame starts, [`ProtocolError::Io`] on any other channel failure, and
    /// decode errors from [`decode_command`].
    pub fn recv(&mut self) -> Result<Command, ProtocolError> {
        let mut prefix = [0u8; FRAME_PREFIX_SIZE];
        self.channel.read_exact(&mut prefix).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ProtocolError::Closed,
            _ => ProtocolError::Io(e.to_string()),
        })?;

        let len = u32::from_be_bytes(prefix);
        if len > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let mut frame = vec![0u8; len as usize];
        self.channel
            .read_exact(&mut frame)
            .map_err(|e| ProtocolError::Io(format!("frame of {len} bytes cut short: {e}")))?;

        decode_command(&frame)
    }

    /// [`recv`](Self::recv) with the outcome logged on behalf of `caller`.
    pub fn receive(&mut self, caller: &str) -> Result<Command, ProtocolError> {
        match self.recv() {
            Ok(cmd) => {
                debug!(caller, kind = %cmd.kind(), "received command");
                Ok(cmd)
            }
            Err(ProtocolError::Closed) => {
                debug!(caller, "channel closed by peer");
                Err(ProtocolError::Closed)
            }
            Err(e) => {
                warn!(caller, "failed to receive command: {e}");
                Err(e)
            }
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_inner(self) -> C {
        self.channel
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
