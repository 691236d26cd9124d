//! One debugging session: the life of a single client connection.
//!
//! # Flow (for beginners)
//!
//! ```text
//!  connect ─▶ push Interrupt(SessionStarted)
//!               │
//!               ▼
//!        ┌─▶ InterruptLoop ── client asked to run ──▶ poll Signal
//!        │      │                                         │
//!        │      └─ closed / wire failure ─▶ end           ▼
//!        │                                          advance program
//!        │                                                │
//!        └──────────── push Interrupt(stop) ◀─────────────┘
//! ```
//!
//! The program is paused while the interrupt loop runs, and running while
//! the session advances it. A detached program ends the session without a
//! further push: the client is already gone.

use rdbg_core::command::InterruptReason;
use rdbg_core::{Channel, Command, DebugTarget, ExitReason, InterruptLoop, ServerDispatcher};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where and why the program paused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    pub reason: InterruptReason,
    /// `file:line`, or empty when the program is not running.
    pub location: String,
    pub message: String,
}

impl Stop {
    pub fn new(reason: InterruptReason, location: impl Into<String>) -> Self {
        Self {
            reason,
            location: location.into(),
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// The `Interrupt` push announcing this stop.
    pub fn to_interrupt(&self) -> Command {
        Command::interrupt(self.reason, self.location.clone(), self.message.clone())
    }
}

/// Execution control the session needs beyond [`DebugTarget`].
pub trait ProgramControl {
    /// Where the program is paused right now.
    fn current_stop(&self) -> Stop;

    /// Runs the program as last requested through [`DebugTarget::resume`] or
    /// [`DebugTarget::restart`] until it pauses again.
    ///
    /// A non-zero `signal` means the user interrupted the run; the program
    /// pauses at the next line it reaches.
    fn advance(&mut self, signal: i32) -> Stop;

    /// True once [`DebugTarget::detach`] has been called.
    fn is_detached(&self) -> bool;
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client quit and released the program.
    Detached,
    /// The client closed the connection between commands.
    Closed,
    /// A wire error on the connection.
    Failed(String),
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: Uuid,
    pub end: SessionEnd,
    /// `Interrupt` pushes delivered, including the initial one.
    pub stops: usize,
    /// Commands the interrupt loop dispatched.
    pub commands: usize,
    /// Commands preempted before they finished.
    pub incomplete: usize,
}

/// Drives one connection through alternating pause and run phases.
pub struct DebugSession<C> {
    id: Uuid,
    dispatcher: ServerDispatcher<C>,
    interrupt_loop: InterruptLoop,
}

impl<C: Channel> DebugSession<C> {
    pub fn new(dispatcher: ServerDispatcher<C>) -> Self {
        Self {
            id: Uuid::new_v4(),
            dispatcher,
            interrupt_loop: InterruptLoop::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dispatcher(&self) -> &ServerDispatcher<C> {
        &self.dispatcher
    }

    /// Serves the connection until the client detaches or the channel ends.
    pub fn run<P>(&mut self, program: &mut P) -> SessionSummary
    where
        P: DebugTarget + ProgramControl,
    {
        let mut summary = SessionSummary {
            id: self.id,
            end: SessionEnd::Closed,
            stops: 0,
            commands: 0,
            incomplete: 0,
        };

        let first = Stop::new(InterruptReason::SessionStarted, program.current_stop().location);
        if let Err(e) = self.deliver(&first, &mut summary) {
            summary.end = e;
            return self.finish(summary);
        }

        summary.end = loop {
            let report = self.interrupt_loop.run(&mut self.dispatcher, program);
            summary.commands += report.processed.len();
            summary.incomplete += report.incomplete().len();

            match report.exit {
                ExitReason::ExitInterrupt(kind) => {
                    if program.is_detached() {
                        break SessionEnd::Detached;
                    }
                    debug!(session = %self.id, %kind, "program resumed");
                }
                ExitReason::Closed => break SessionEnd::Closed,
                ExitReason::CommFailure(text) => break SessionEnd::Failed(text),
                ExitReason::WireFailure(e) => break SessionEnd::Failed(e.wire_error()),
            }

            let signal = match self.dispatcher.poll_signal() {
                Ok(signal) => signal,
                Err(e) => break SessionEnd::Failed(e.wire_error()),
            };
            if signal != 0 {
                info!(session = %self.id, signal, "client interrupted the program");
            }

            let stop = program.advance(signal);
            if let Err(end) = self.deliver(&stop, &mut summary) {
                break end;
            }
        };

        self.finish(summary)
    }

    fn deliver(&mut self, stop: &Stop, summary: &mut SessionSummary) -> Result<(), SessionEnd> {
        debug!(session = %self.id, reason = ?stop.reason, location = %stop.location, "pushing interrupt");
        match self.dispatcher.push(&stop.to_interrupt()) {
            Ok(()) => {
                summary.stops += 1;
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, "failed to push interrupt: {e}");
                Err(SessionEnd::Failed(e.wire_error()))
            }
        }
    }

    fn finish(&self, summary: SessionSummary) -> SessionSummary {
        info!(
            session = %summary.id,
            end = ?summary.end,
            stops = summary.stops,
            commands = summary.commands,
            "session finished"
        );
        summary
    }
}
