//! Byte channel abstraction consumed by the codec.
//!
//! The core only needs two blocking operations: read exactly `n` bytes and
//! write a whole buffer. Anything that is `Read + Write` (a
//! `std::net::TcpStream`, a Unix socket, a pipe pair) is a [`Channel`] through
//! the blanket impl. [`MemoryChannel`] is an in-process channel used by tests
//! and loopback setups: reads drain a scripted inbound queue, writes append to
//! an outbound buffer.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::command::Command;
use crate::protocol::codec::{decode_command, encode_frame, ProtocolError, FRAME_PREFIX_SIZE};

/// A blocking, exclusively-owned byte channel.
pub trait Channel {
    /// Fills `buf` completely or fails.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Writes all of `bytes` and flushes.
    fn write_exact(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: Read + Write> Channel for T {
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Read::read_exact(self, buf)
    }

    fn write_exact(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }
}

/// In-memory channel with a scripted inbound side.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    fail_writes: bool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel whose inbound side yields `commands` in order.
    pub fn with_frames<'a>(commands: impl IntoIterator<Item = &'a Command>) -> Self {
        let mut channel = Self::new();
        for cmd in commands {
            channel.push_frame(cmd);
        }
        channel
    }

    /// Queues one framed command on the inbound side.
    pub fn push_frame(&mut self, cmd: &Command) {
        self.inbound.extend(encode_frame(cmd));
    }

    /// Queues raw bytes on the inbound side (used to script malformed input).
    pub fn push_raw(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Makes every subsequent write fail with `BrokenPipe`, simulating a peer
    /// that has stopped listening.
    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    /// Unread inbound bytes.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Raw bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.outbound
    }

    /// Decodes every frame written so far.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the outbound bytes are not a sequence of
    /// well-formed frames.
    pub fn sent_commands(&self) -> Result<Vec<Command>, ProtocolError> {
        let mut out = Vec::new();
        let mut rest = self.outbound.as_slice();
        while !rest.is_empty() {
            if rest.len() < FRAME_PREFIX_SIZE {
                return Err(ProtocolError::Truncated {
                    needed: FRAME_PREFIX_SIZE,
                    available: rest.len(),
                });
            }
            let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            let end = FRAME_PREFIX_SIZE + len;
            if rest.len() < end {
                return Err(ProtocolError::Truncated {
                    needed: end,
                    available: rest.len(),
                });
            }
            out.push(decode_command(&rest[FRAME_PREFIX_SIZE..end])?);
            rest = &rest[end..];
        }
        Ok(out)
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inbound.read(buf)
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer stopped listening"));
        }
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
