//! # rdbg-core
//!
//! Shared library for the rdbg remote debugger: the binary command protocol
//! spoken between the debugger front-end (the *client*) and the proxy
//! embedded next to the debugged program (the *server*), plus the dispatch
//! machinery that runs a decoded command on either side.
//!
//! This crate is used by both the proxy and the client applications. It has
//! no dependency on sockets, terminals or any particular debugged runtime;
//! those are reached through the [`Channel`], [`ClientContext`] and
//! [`DebugTarget`] traits.
//!
//! # Architecture overview (for beginners)
//!
//! - **`protocol`** – How bytes travel over the wire. Every command is framed
//!   as `[frame_len][kind][version][qualifier][payload]` with big-endian
//!   integers, and the numeric `kind` comes from a closed, append-only
//!   enumeration that both sides must agree on forever.
//!
//! - **`command`** – The command model. A [`Command`] is an envelope
//!   (kind, version, qualifier) around a [`CommandBody`], and every body
//!   variant knows how to serialize itself and what to do on the client and
//!   on the server.
//!
//! - **`dispatch`** – Who runs what. The [`ClientDispatcher`] handles help,
//!   sends commands and waits for replies; the [`ServerDispatcher`] runs a
//!   command against the debugged program; the [`InterruptLoop`] keeps
//!   serving commands while the program is paused.

pub mod client_state;
pub mod command;
pub mod context;
pub mod dispatch;
pub mod protocol;

pub use client_state::{ClientOptions, ClientState, MacroBook, OutputLine};
pub use command::{ClientStep, Command, CommandBody, Header, ServerAction};
pub use context::{ClientContext, CommandOutput, DebugTarget, FlowMode, FrameMotion};
pub use dispatch::client::{parse_user_input, ClientDispatcher, ClientOutcome, InputError};
pub use dispatch::interrupt_loop::{ExitReason, InterruptLoop, LoopReport, LoopState};
pub use dispatch::server::{DispatchOutcome, Preemption, ServerDispatcher};
pub use protocol::channel::{Channel, MemoryChannel};
pub use protocol::codec::{decode_command, encode_command, ProtocolError, WireCodec};
pub use protocol::kind::CommandKind;
