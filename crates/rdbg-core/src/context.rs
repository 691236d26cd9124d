//! Collaborator interfaces the command variants run against.
//!
//! - [`ClientContext`] is what a command sees on the debugger front-end:
//!   its arguments, somewhere to print, the observer/API sink, and a few
//!   pieces of client-local state (options, macros, pending notifications).
//! - [`DebugTarget`] is what a command sees inside the proxy: the paused
//!   program's introspection surface. The protocol does not define what a
//!   breakpoint or an evaluation *means*; it only routes the request to the
//!   target and carries the answer back.

use serde::Serialize;
use serde_json::Value;

use crate::client_state::{ClientOptions, MacroBook};
use crate::command::{Command, Header};
use crate::protocol::kind::CommandKind;

/// Observer/API record produced after a command has run on the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutput {
    pub kind: CommandKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub qualifier: String,
    pub value: Value,
}

impl CommandOutput {
    pub fn new(header: &Header, value: Value) -> Self {
        Self {
            kind: header.kind(),
            qualifier: header.qualifier.clone(),
            value,
        }
    }
}

/// Client-side execution context.
pub trait ClientContext {
    /// Arguments following the command token, already split on whitespace.
    fn args(&self) -> &[String];

    /// The raw text following the command token, spacing preserved.
    fn argument_text(&self) -> &str;

    /// Prints an informational line.
    fn print(&mut self, text: &str);

    /// Prints an error line.
    fn error(&mut self, text: &str);

    /// Publishes the outcome of a command to the observer/API surface.
    fn set_output(&mut self, output: CommandOutput);

    /// Source files the client has seen, for completion.
    fn source_files(&self) -> Vec<String>;

    /// Remembers a `file:line` location reported by the proxy.
    fn note_location(&mut self, location: &str);

    /// Holds an unsolicited proxy push until the front-end polls for it.
    fn queue_notification(&mut self, cmd: Command);

    /// Returns and clears the signal raised by the user (0 when none).
    fn take_pending_signal(&mut self) -> i32;

    /// Asks the front-end to leave after the current command.
    fn request_quit(&mut self);

    fn options(&mut self) -> &mut ClientOptions;

    fn macros(&mut self) -> &mut MacroBook;
}

/// How a flow command resumes the debugged program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowMode {
    Continue,
    Next,
    Out,
    Step,
}

impl FlowMode {
    /// Maps a flow kind to its mode; `None` for non-flow kinds.
    pub fn from_kind(kind: CommandKind) -> Option<FlowMode> {
        match kind {
            CommandKind::Continue => Some(FlowMode::Continue),
            CommandKind::Next => Some(FlowMode::Next),
            CommandKind::Out => Some(FlowMode::Out),
            CommandKind::Step => Some(FlowMode::Step),
            _ => None,
        }
    }
}

/// Frame selection requested by `up`, `down` or `frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameMotion {
    Up(i32),
    Down(i32),
    To(i32),
}

/// Server-side execution context: the paused program.
///
/// Methods returning `Result<String, String>` report application failures in
/// the `Err` text; those travel back to the client inside the command's reply
/// payload and never count as a wire failure.
#[cfg_attr(test, mockall::automock)]
pub trait DebugTarget {
    /// Lets the program run until its next stop.
    fn resume(&mut self, mode: FlowMode, count: i32);

    /// Restarts the program with new arguments.
    fn restart(&mut self, args: &[String]);

    /// Releases the program; no further interrupts will be delivered.
    fn detach(&mut self);

    fn set_breakpoint(&mut self, location: &str) -> Result<String, String>;

    fn break_on_exception(&mut self, class_name: &str) -> Result<String, String>;

    /// Selects a stack frame and describes it.
    fn select_frame(&mut self, motion: FrameMotion) -> Result<String, String>;

    /// Answers a read-only query (globals, stack, source listing, threads...).
    fn inspect(&mut self, kind: CommandKind, args: &[String]) -> Result<String, String>;

    fn evaluate(&mut self, code: &str) -> Result<String, String>;

    /// Symbols starting with `prefix`.
    fn complete(&mut self, prefix: &str) -> Vec<String>;

    /// Runs an extended or user command registered under `class`.
    fn run_extension(
        &mut self,
        kind: CommandKind,
        class: &str,
        args: &[String],
    ) -> Result<String, String>;

    fn run_shell(&mut self, args: &[String]) -> Result<String, String>;
}
