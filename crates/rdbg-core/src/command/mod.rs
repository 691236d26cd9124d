//! The command model: a shared envelope around a closed set of variants.
//!
//! # How a command is put together (for beginners)
//!
//! Every command has two halves:
//!
//! - a [`Header`] with the fields every command shares on the wire: the
//!   numeric [`CommandKind`], the sender's protocol `version`, and an optional
//!   `qualifier` that extended/user commands use to multiplex many logical
//!   commands under one id;
//! - a [`CommandBody`] holding the variant-specific payload.
//!
//! Each body variant implements [`CommandHandler`], the capability set the
//! dispatchers rely on: serialize/deserialize its own payload, run on the
//! client, run on the server, describe its help, offer completions. Several
//! kinds can share one payload shape (e.g. `continue`, `next`, `out` and
//! `step` are all a [`FlowCmd`]); the header's kind tells them apart.
//!
//! The set of variants is closed. The factory ([`Command::from_id`]) and the
//! dispatch helpers below are exhaustive `match`es, so adding a kind is a
//! compile-time checked exercise rather than an open class hierarchy.

mod breakpoint;
mod eval;
mod extended;
mod flow;
mod frame;
mod inspect;
mod local;
mod meta;
mod push;
mod reply;

pub use breakpoint::{BreakCmd, ExceptionCmd};
pub use eval::{CompleteCmd, EvalCmd};
pub use extended::ExtendedCmd;
pub use flow::{FlowCmd, RunCmd};
pub use frame::FrameCmd;
pub use inspect::InspectCmd;
pub use local::{AbortCmd, HelpCmd, QuitCmd};
pub use meta::{ConfigCmd, MacroCmd, ShellCmd};
pub use push::{InterruptCmd, InterruptReason, SignalCmd};
pub use reply::Reply;

use serde_json::Value;

use crate::context::{ClientContext, CommandOutput, DebugTarget, FlowMode};
use crate::protocol::codec::{ProtocolError, PROTOCOL_VERSION};
use crate::protocol::kind::CommandKind;
use crate::protocol::wire::{WireReader, WireWriter};

// ── Step / action values ──────────────────────────────────────────────────────

/// What the client dispatcher should do after a variant's client logic ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStep {
    /// Fully handled locally; nothing goes on the wire.
    Done,
    /// Send to the proxy and do not wait for an answer.
    Send,
    /// Send to the proxy and wait for a reply of the same kind.
    Exchange,
    /// Send to the proxy, then wait until the program stops again.
    Resume,
}

/// What the server dispatcher should do after a variant's server logic ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    /// Send the (now filled-in) command back to the client.
    Reply,
    /// Stop the interrupt loop and hand control back to the program.
    Exit,
    /// Nothing to send; keep serving commands.
    Ignore,
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Fields shared by every command on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    kind: CommandKind,
    /// Protocol version chosen by the sender.
    pub version: i32,
    /// Sub-command name for extended/user kinds; empty otherwise.
    pub qualifier: String,
}

impl Header {
    fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            version: PROTOCOL_VERSION,
            qualifier: String::new(),
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }
}

// ── Capability set ────────────────────────────────────────────────────────────

/// Behaviour every command variant provides.
pub trait CommandHandler {
    /// Writes the variant payload. Envelope fields are written by the codec.
    fn encode_payload(&self, w: &mut WireWriter);

    /// Reads the variant payload into `self`.
    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError>;

    /// Client-side logic: read the user's arguments, fill in the payload, and
    /// say whether the command needs the proxy.
    fn run_on_client(&mut self, header: &mut Header, client: &mut dyn ClientContext)
        -> ClientStep;

    /// Called after the reply of an [`ClientStep::Exchange`] has been absorbed.
    fn complete_on_client(&mut self, _header: &Header, _client: &mut dyn ClientContext) {}

    /// Publishes the outcome to the observer/API surface.
    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        client.set_output(CommandOutput::new(header, Value::Null));
    }

    /// Server-side logic against the paused program.
    fn run_on_server(&mut self, header: &Header, target: &mut dyn DebugTarget) -> ServerAction;

    /// Strings that may follow this command at the prompt.
    fn list_completions(&self, _header: &Header, _client: &dyn ClientContext) -> Vec<String> {
        Vec::new()
    }

    fn describe_help(&self, header: &Header) -> String {
        default_help(header.kind())
    }
}

/// Optional capability for variants that accept a reply outside the
/// immediate request/response pair (late evaluation results).
pub trait ReplyHandler {
    fn on_reply_received(&mut self, header: &Header, client: &mut dyn ClientContext);
}

/// Help shown for commands without a dedicated text.
pub fn default_help(kind: CommandKind) -> String {
    format!(
        "{}: no additional help is available.\nType \"help\" to list every command.",
        kind.name()
    )
}

// ── Variants ──────────────────────────────────────────────────────────────────

/// The closed set of payload shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandBody {
    Abort(AbortCmd),
    Break(BreakCmd),
    Exception(ExceptionCmd),
    Flow(FlowCmd),
    Run(RunCmd),
    Frame(FrameCmd),
    Inspect(InspectCmd),
    Help(HelpCmd),
    Quit(QuitCmd),
    Extended(ExtendedCmd),
    Complete(CompleteCmd),
    Eval(EvalCmd),
    Shell(ShellCmd),
    Macro(MacroCmd),
    Config(ConfigCmd),
    Interrupt(InterruptCmd),
    Signal(SignalCmd),
}

impl CommandBody {
    /// Static kind -> constructor table. `None` only for reserved ids.
    fn for_kind(kind: CommandKind) -> Option<CommandBody> {
        let body = match kind {
            CommandKind::Abort => CommandBody::Abort(AbortCmd),
            CommandKind::Break => CommandBody::Break(BreakCmd::default()),
            CommandKind::Exception => CommandBody::Exception(ExceptionCmd::default()),
            CommandKind::Continue | CommandKind::Next | CommandKind::Out | CommandKind::Step => {
                CommandBody::Flow(FlowCmd::default())
            }
            CommandKind::Run => CommandBody::Run(RunCmd::default()),
            CommandKind::Up | CommandKind::Down | CommandKind::Frame => {
                CommandBody::Frame(FrameCmd::default())
            }
            CommandKind::Global
            | CommandKind::Info
            | CommandKind::Constant
            | CommandKind::List
            | CommandKind::Machine
            | CommandKind::Thread
            | CommandKind::Variable
            | CommandKind::Where
            | CommandKind::Zend
            | CommandKind::Instrument => CommandBody::Inspect(InspectCmd::default()),
            CommandKind::Help => CommandBody::Help(HelpCmd::default()),
            CommandKind::Quit => CommandBody::Quit(QuitCmd),
            CommandKind::Extended | CommandKind::User => {
                CommandBody::Extended(ExtendedCmd::default())
            }
            CommandKind::Complete => CommandBody::Complete(CompleteCmd::default()),
            CommandKind::Eval | CommandKind::Print => CommandBody::Eval(EvalCmd::default()),
            CommandKind::Shell => CommandBody::Shell(ShellCmd::default()),
            CommandKind::Macro => CommandBody::Macro(MacroCmd::default()),
            CommandKind::Config => CommandBody::Config(ConfigCmd::default()),
            CommandKind::Interrupt => CommandBody::Interrupt(InterruptCmd::default()),
            CommandKind::Signal => CommandBody::Signal(SignalCmd::default()),
            CommandKind::JumpUnused => return None,
        };
        Some(body)
    }

    fn handler(&self) -> &dyn CommandHandler {
        match self {
            CommandBody::Abort(c) => c,
            CommandBody::Break(c) => c,
            CommandBody::Exception(c) => c,
            CommandBody::Flow(c) => c,
            CommandBody::Run(c) => c,
            CommandBody::Frame(c) => c,
            CommandBody::Inspect(c) => c,
            CommandBody::Help(c) => c,
            CommandBody::Quit(c) => c,
            CommandBody::Extended(c) => c,
            CommandBody::Complete(c) => c,
            CommandBody::Eval(c) => c,
            CommandBody::Shell(c) => c,
            CommandBody::Macro(c) => c,
            CommandBody::Config(c) => c,
            CommandBody::Interrupt(c) => c,
            CommandBody::Signal(c) => c,
        }
    }

    fn handler_mut(&mut self) -> &mut dyn CommandHandler {
        match self {
            CommandBody::Abort(c) => c,
            CommandBody::Break(c) => c,
            CommandBody::Exception(c) => c,
            CommandBody::Flow(c) => c,
            CommandBody::Run(c) => c,
            CommandBody::Frame(c) => c,
            CommandBody::Inspect(c) => c,
            CommandBody::Help(c) => c,
            CommandBody::Quit(c) => c,
            CommandBody::Extended(c) => c,
            CommandBody::Complete(c) => c,
            CommandBody::Eval(c) => c,
            CommandBody::Shell(c) => c,
            CommandBody::Macro(c) => c,
            CommandBody::Config(c) => c,
            CommandBody::Interrupt(c) => c,
            CommandBody::Signal(c) => c,
        }
    }

    /// The variants that accept asynchronous replies, listed explicitly.
    fn accepts_replies(&self) -> bool {
        match self {
            CommandBody::Eval(_) => true,
            CommandBody::Abort(_)
            | CommandBody::Break(_)
            | CommandBody::Exception(_)
            | CommandBody::Flow(_)
            | CommandBody::Run(_)
            | CommandBody::Frame(_)
            | CommandBody::Inspect(_)
            | CommandBody::Help(_)
            | CommandBody::Quit(_)
            | CommandBody::Extended(_)
            | CommandBody::Complete(_)
            | CommandBody::Shell(_)
            | CommandBody::Macro(_)
            | CommandBody::Config(_)
            | CommandBody::Interrupt(_)
            | CommandBody::Signal(_) => false,
        }
    }

    fn reply_handler_mut(&mut self) -> Option<&mut dyn ReplyHandler> {
        match self {
            CommandBody::Eval(c) => Some(c as &mut dyn ReplyHandler),
            _ => None,
        }
    }
}

// ── Command ───────────────────────────────────────────────────────────────────

/// A complete command: envelope plus payload.
///
/// The header kind and body shape always agree: commands are only built by
/// the factory or by the typed constructors below.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    header: Header,
    body: CommandBody,
}

impl Command {
    /// Builds an empty command of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownKind`] for the reserved
    /// [`CommandKind::JumpUnused`].
    pub fn create(kind: CommandKind) -> Result<Command, ProtocolError> {
        let body = CommandBody::for_kind(kind).ok_or(ProtocolError::UnknownKind(kind.id()))?;
        Ok(Command {
            header: Header::new(kind),
            body,
        })
    }

    /// The factory: builds an empty command from a wire kind id.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownKind`] if `id` is not a constructible
    /// kind. The caller can skip the frame or drop the connection.
    pub fn from_id(id: i32) -> Result<Command, ProtocolError> {
        let kind = CommandKind::try_from(id).map_err(|_| ProtocolError::UnknownKind(id))?;
        Command::create(kind)
    }

    fn from_parts(kind: CommandKind, body: CommandBody) -> Command {
        Command {
            header: Header::new(kind),
            body,
        }
    }

    /// `break <location>`.
    pub fn breakpoint(location: impl Into<String>) -> Command {
        Command::from_parts(
            CommandKind::Break,
            CommandBody::Break(BreakCmd {
                location: location.into(),
                ..BreakCmd::default()
            }),
        )
    }

    /// `eval <code>`.
    pub fn eval(code: impl Into<String>) -> Command {
        Command::from_parts(CommandKind::Eval, CommandBody::Eval(EvalCmd::new(code)))
    }

    /// `print <expression>`.
    pub fn print(expression: impl Into<String>) -> Command {
        Command::from_parts(CommandKind::Print, CommandBody::Eval(EvalCmd::new(expression)))
    }

    /// `continue`, `next`, `out` or `step`, repeated `count` times.
    pub fn flow(mode: FlowMode, count: i32) -> Command {
        let kind = match mode {
            FlowMode::Continue => CommandKind::Continue,
            FlowMode::Next => CommandKind::Next,
            FlowMode::Out => CommandKind::Out,
            FlowMode::Step => CommandKind::Step,
        };
        Command::from_parts(kind, CommandBody::Flow(FlowCmd { count }))
    }

    /// An extended command multiplexed under `class`.
    pub fn extended(class: impl Into<String>, args: &[String]) -> Command {
        let mut cmd = Command::from_parts(
            CommandKind::Extended,
            CommandBody::Extended(ExtendedCmd {
                args: args.to_vec(),
                ..ExtendedCmd::default()
            }),
        );
        cmd.header.qualifier = class.into();
        cmd
    }

    /// Proxy push announcing that the program stopped.
    pub fn interrupt(
        reason: InterruptReason,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Command {
        Command::from_parts(
            CommandKind::Interrupt,
            CommandBody::Interrupt(InterruptCmd {
                reason,
                location: location.into(),
                message: message.into(),
            }),
        )
    }

    /// Proxy push polling the client for a user signal.
    pub fn signal(signal: i32) -> Command {
        Command::from_parts(CommandKind::Signal, CommandBody::Signal(SignalCmd { signal }))
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn kind(&self) -> CommandKind {
        self.header.kind
    }

    pub fn is(&self, kind: CommandKind) -> bool {
        self.header.kind == kind
    }

    pub fn version(&self) -> i32 {
        self.header.version
    }

    pub fn qualifier(&self) -> &str {
        &self.header.qualifier
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn body(&self) -> &CommandBody {
        &self.body
    }

    pub fn set_version(&mut self, version: i32) {
        self.header.version = version;
    }

    pub fn set_qualifier(&mut self, qualifier: String) {
        self.header.qualifier = qualifier;
    }

    /// The encoded variant payload on its own.
    pub fn payload_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        self.encode_payload(&mut w);
        w.into_bytes()
    }

    // ── Capability dispatch ───────────────────────────────────────────────────

    pub(crate) fn encode_payload(&self, w: &mut WireWriter) {
        self.body.handler().encode_payload(w);
    }

    pub(crate) fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.body.handler_mut().decode_payload(r)
    }

    pub fn run_on_client(&mut self, client: &mut dyn ClientContext) -> ClientStep {
        let Command { header, body } = self;
        body.handler_mut().run_on_client(header, client)
    }

    pub fn complete_on_client(&mut self, client: &mut dyn ClientContext) {
        let Command { header, body } = self;
        body.handler_mut().complete_on_client(header, client);
    }

    pub fn report_to_observer(&self, client: &mut dyn ClientContext) {
        self.body.handler().report_to_observer(&self.header, client);
    }

    pub fn run_on_server(&mut self, target: &mut dyn DebugTarget) -> ServerAction {
        let Command { header, body } = self;
        body.handler_mut().run_on_server(header, target)
    }

    pub fn list_completions(&self, client: &dyn ClientContext) -> Vec<String> {
        self.body.handler().list_completions(&self.header, client)
    }

    pub fn describe_help(&self) -> String {
        self.body.handler().describe_help(&self.header)
    }

    /// Returns `true` if this variant accepts [`on_reply_received`](Self::on_reply_received).
    pub fn supports_async_reply(&self) -> bool {
        self.body.accepts_replies()
    }

    /// Delivers an asynchronous reply to the variant.
    ///
    /// # Panics
    ///
    /// Panics if the variant does not accept asynchronous replies. Check
    /// [`supports_async_reply`](Self::supports_async_reply) first; reaching
    /// this with any other variant means the dispatcher and the variant
    /// disagree about the protocol.
    pub fn on_reply_received(&mut self, client: &mut dyn ClientContext) {
        let Command { header, body } = self;
        match body.reply_handler_mut() {
            Some(handler) => handler.on_reply_received(header, client),
            None => panic!(
                "contract violation: {} does not accept asynchronous replies",
                header.kind
            ),
        }
    }

    /// Replaces this command's payload with the one carried by `reply`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedReply`] if `reply` is of another kind.
    pub fn absorb_reply(&mut self, reply: Command) -> Result<(), ProtocolError> {
        if reply.kind() != self.kind() {
            return Err(ProtocolError::UnexpectedReply {
                expected: self.kind(),
                got: reply.kind(),
            });
        }
        self.header.version = reply.header.version;
        self.body = reply.body;
        Ok(())
    }
}
