//! Proxy -> client pushes: `Interrupt` and `Signal`.
//!
//! These kinds are only ever originated by the proxy. A client answers a
//! `Signal` poll by sending it back; it never answers an `Interrupt`.

use serde::Serialize;
use serde_json::json;

use super::{ClientStep, CommandHandler, Header, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget};
use crate::protocol::codec::ProtocolError;
use crate::protocol::wire::{WireReader, WireWriter};

// ── Interrupt reasons ─────────────────────────────────────────────────────────

/// Why the program stopped. The numeric ids are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum InterruptReason {
    #[default]
    SessionStarted,
    SessionEnded,
    RequestStarted,
    RequestEnded,
    PspEnded,
    HardBreakpoint,
    BreakpointReached,
    ExceptionThrown,
    /// An id this build does not know, kept so it can be shown and re-sent.
    Other(i32),
}

impl From<i32> for InterruptReason {
    fn from(value: i32) -> Self {
        match value {
            1 => InterruptReason::SessionStarted,
            2 => InterruptReason::SessionEnded,
            3 => InterruptReason::RequestStarted,
            4 => InterruptReason::RequestEnded,
            5 => InterruptReason::PspEnded,
            6 => InterruptReason::HardBreakpoint,
            7 => InterruptReason::BreakpointReached,
            8 => InterruptReason::ExceptionThrown,
            other => InterruptReason::Other(other),
        }
    }
}

impl InterruptReason {
    /// The wire id.
    pub fn id(self) -> i32 {
        match self {
            InterruptReason::SessionStarted => 1,
            InterruptReason::SessionEnded => 2,
            InterruptReason::RequestStarted => 3,
            InterruptReason::RequestEnded => 4,
            InterruptReason::PspEnded => 5,
            InterruptReason::HardBreakpoint => 6,
            InterruptReason::BreakpointReached => 7,
            InterruptReason::ExceptionThrown => 8,
            InterruptReason::Other(id) => id,
        }
    }

    fn describe(self) -> String {
        let text = match self {
            InterruptReason::SessionStarted => "Debugging session started.",
            InterruptReason::SessionEnded => "Debugging session ended.",
            InterruptReason::RequestStarted => "Request started.",
            InterruptReason::RequestEnded => "Request ended.",
            InterruptReason::PspEnded => "Post-send processing ended.",
            InterruptReason::HardBreakpoint => "Hard breakpoint reached.",
            InterruptReason::BreakpointReached => "Breakpoint reached.",
            InterruptReason::ExceptionThrown => "Exception thrown.",
            InterruptReason::Other(id) => return format!("Program stopped (reason {id})."),
        };
        text.to_string()
    }
}

// ── Interrupt ─────────────────────────────────────────────────────────────────

/// The program stopped and is waiting for commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterruptCmd {
    pub reason: InterruptReason,
    /// `file:line` where execution is paused; may be empty.
    pub location: String,
    pub message: String,
}

impl CommandHandler for InterruptCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_i32(self.reason.id());
        w.write_string(&self.location);
        w.write_string(&self.message);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.reason = InterruptReason::from(r.read_i32()?);
        self.location = r.read_string()?;
        self.message = r.read_string()?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        let mut text = self.reason.describe();
        if !self.location.is_empty() {
            text.push_str(&format!(" At {}.", self.location));
            client.note_location(&self.location);
        }
        if !self.message.is_empty() {
            text.push('\n');
            text.push_str(&self.message);
        }
        client.print(&text);
        ClientStep::Done
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({
            "reason": self.reason,
            "location": self.location,
            "message": self.message,
        });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, _header: &Header, _target: &mut dyn DebugTarget) -> ServerAction {
        ServerAction::Ignore
    }
}

// ── Signal ────────────────────────────────────────────────────────────────────

/// Poll from the proxy while the program runs; the client answers with the
/// signal the user raised (0 for none).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalCmd {
    pub signal: i32,
}

impl CommandHandler for SignalCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_i32(self.signal);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.signal = r.read_i32()?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        self.signal = client.take_pending_signal();
        ClientStep::Send
    }

    fn run_on_server(&mut self, _header: &Header, _target: &mut dyn DebugTarget) -> ServerAction {
        ServerAction::Ignore
    }
}
