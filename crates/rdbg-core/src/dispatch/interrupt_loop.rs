//! The proxy's command loop while the debugged program is paused.
//!
//! # State machine (for beginners)
//!
//! ```text
//!             recv ok                  Completed, replied
//!   Idle ───────────────▶ Dispatching ─────────────────────▶ AwaitingReply
//!    ▲                      │  │  │                              │
//!    │  Completed/Incomplete│  │  │ exit-interrupt               │ recv ok
//!    └──────────────────────┘  │  └──────────▶ Exited ◀──────────┤
//!                              │ CommFailure     ▲               │
//!                              └─────────────────┘  wire error / closed
//! ```
//!
//! An unknown kind is logged and skipped without leaving the current state.
//! The loop never retries a command; that decision belongs to whoever called
//! [`InterruptLoop::run`].

use tracing::{debug, info, trace, warn};

use super::server::{DispatchOutcome, ServerDispatcher};
use crate::context::DebugTarget;
use crate::protocol::channel::Channel;
use crate::protocol::codec::ProtocolError;
use crate::protocol::kind::CommandKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the next command.
    Idle,
    /// Running a command against the program.
    Dispatching,
    /// A reply was sent; waiting for the client's next instruction.
    AwaitingReply,
    /// Terminal. Control goes back to the caller.
    Exited,
}

/// Why [`InterruptLoop::run`] returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// A command of this kind asked for the program to run again.
    ExitInterrupt(CommandKind),
    /// A reply could not be delivered.
    CommFailure(String),
    /// Receiving the next command failed.
    WireFailure(ProtocolError),
    /// The client closed the connection between commands.
    Closed,
}

impl ExitReason {
    /// Transport error text; empty for an exit-interrupt or a clean close.
    pub fn wire_error(&self) -> String {
        match self {
            ExitReason::CommFailure(text) => text.clone(),
            ExitReason::WireFailure(e) => e.wire_error(),
            ExitReason::ExitInterrupt(_) | ExitReason::Closed => String::new(),
        }
    }
}

/// One command handled by the loop, with how it ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedCommand {
    pub kind: CommandKind,
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub exit: ExitReason,
    pub processed: Vec<ProcessedCommand>,
    /// Frames dropped because their kind id was unknown.
    pub skipped_unknown: usize,
}

impl LoopReport {
    /// Kinds of the commands that were preempted.
    pub fn incomplete(&self) -> Vec<CommandKind> {
        self.processed
            .iter()
            .filter(|p| p.outcome.is_incomplete())
            .map(|p| p.kind)
            .collect()
    }
}

/// Serves commands until one asks the program to run, or the connection fails.
#[derive(Debug)]
pub struct InterruptLoop {
    state: LoopState,
}

impl Default for InterruptLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn transition(&mut self, next: LoopState) {
        trace!(from = ?self.state, to = ?next, "interrupt loop transition");
        self.state = next;
    }

    /// Runs one invocation of the loop, starting from `Idle`.
    pub fn run<C: Channel>(
        &mut self,
        dispatcher: &mut ServerDispatcher<C>,
        target: &mut dyn DebugTarget,
    ) -> LoopReport {
        self.transition(LoopState::Idle);
        let mut processed = Vec::new();
        let mut skipped_unknown = 0;

        let exit = loop {
            let mut cmd = match dispatcher.recv() {
                Ok(cmd) => cmd,
                Err(e) if e.is_recoverable() => {
                    warn!("skipping command: {e}");
                    skipped_unknown += 1;
                    continue;
                }
                Err(ProtocolError::Closed) => break ExitReason::Closed,
                Err(e) => break ExitReason::WireFailure(e),
            };

            self.transition(LoopState::Dispatching);
            let kind = cmd.kind();
            let outcome = dispatcher.dispatch(&mut cmd, target);
            debug!(%kind, ?outcome, "dispatched");
            processed.push(ProcessedCommand {
                kind,
                outcome: outcome.clone(),
            });

            match outcome {
                DispatchOutcome::Completed {
                    exit_interrupt: true,
                    ..
                } => break ExitReason::ExitInterrupt(kind),
                DispatchOutcome::Completed { replied: true, .. } => {
                    self.transition(LoopState::AwaitingReply)
                }
                DispatchOutcome::Completed { .. } | DispatchOutcome::Incomplete => {
                    self.transition(LoopState::Idle)
                }
                DispatchOutcome::CommFailure { wire_error } => {
                    break ExitReason::CommFailure(wire_error)
                }
            }
        };

        self.transition(LoopState::Exited);
        info!(exit = ?exit, commands = processed.len(), "interrupt loop finished");
        LoopReport {
            exit,
            processed,
            skipped_unknown,
        }
    }
}
