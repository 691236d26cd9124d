//! Client-side dispatch: prompt parsing, help interception, request/reply.

use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{ClientStep, Command};
use crate::context::ClientContext;
use crate::protocol::channel::Channel;
use crate::protocol::codec::{ProtocolError, WireCodec};
use crate::protocol::kind::CommandKind;

/// Arguments that turn any command into a help request, e.g. `break ?`.
pub const HELP_TOKENS: [&str; 2] = ["help", "?"];

/// Single-character prefixes that may be glued to their argument (`@$x`).
const SIGILS: [char; 4] = ['@', '=', '!', '&'];

/// Errors produced while turning a prompt line into a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown command \"{0}\"; type \"help\" for a list of commands")]
    UnknownCommand(String),
}

/// Parses one prompt line into a fresh command and the text after its token.
///
/// Returns `Ok(None)` for a blank line. Proxy-only kinds can never be
/// produced here.
///
/// # Errors
///
/// Returns [`InputError::UnknownCommand`] if the first token names no command.
pub fn parse_user_input(line: &str) -> Result<Option<(Command, String)>, InputError> {
    let line = line.trim_start();
    let Some(first) = line.chars().next() else {
        return Ok(None);
    };

    let (token, rest) = if SIGILS.contains(&first) {
        line.split_at(first.len_utf8())
    } else {
        match line.find(char::is_whitespace) {
            Some(at) => line.split_at(at),
            None => (line, ""),
        }
    };

    let kind = CommandKind::from_user_token(&token.to_ascii_lowercase())
        .filter(|k| k.is_user_command())
        .ok_or_else(|| InputError::UnknownCommand(token.to_string()))?;
    let cmd = Command::create(kind).map_err(|_| InputError::UnknownCommand(token.to_string()))?;
    Ok(Some((cmd, rest.to_string())))
}

/// What happened to a command run through [`ClientDispatcher::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOutcome {
    /// A help token was given; the command's help was printed instead.
    HelpShown,
    /// Handled locally, nothing sent.
    Handled,
    /// Sent without waiting for an answer.
    Sent,
    /// Sent and its reply absorbed.
    Replied,
    /// Sent; the program ran and stopped again with this `Interrupt`.
    Resumed { stop: Command },
}

/// Runs commands on the client and talks to the proxy for them.
#[derive(Debug)]
pub struct ClientDispatcher<C> {
    codec: WireCodec<C>,
    version: i32,
}

impl<C: Channel> ClientDispatcher<C> {
    /// `version` is stamped on every outgoing command.
    pub fn new(codec: WireCodec<C>, version: i32) -> Self {
        Self { codec, version }
    }

    /// Runs `cmd` for the arguments currently held by `client`.
    ///
    /// # Errors
    ///
    /// Wire errors only. Application failures are printed through `client`.
    pub fn run(
        &mut self,
        cmd: &mut Command,
        client: &mut dyn ClientContext,
    ) -> Result<ClientOutcome, ProtocolError> {
        if self.displayed_help(cmd, client) {
            return Ok(ClientOutcome::HelpShown);
        }

        let outcome = match cmd.run_on_client(client) {
            ClientStep::Done => ClientOutcome::Handled,
            ClientStep::Send => {
                self.send(cmd)?;
                ClientOutcome::Sent
            }
            ClientStep::Exchange => {
                self.send(cmd)?;
                let reply = self.await_reply(cmd.kind(), client)?;
                cmd.absorb_reply(reply)?;
                cmd.complete_on_client(client);
                ClientOutcome::Replied
            }
            ClientStep::Resume => {
                self.send(cmd)?;
                let mut stop = self.await_interrupt(client)?;
                stop.run_on_client(client);
                ClientOutcome::Resumed { stop }
            }
        };

        cmd.report_to_observer(client);
        Ok(outcome)
    }

    /// Prints the command's help if its first argument is a help token.
    fn displayed_help(&self, cmd: &Command, client: &mut dyn ClientContext) -> bool {
        let wants_help = client
            .args()
            .first()
            .is_some_and(|arg| HELP_TOKENS.contains(&arg.as_str()));
        if wants_help {
            client.print(&cmd.describe_help());
        }
        wants_help
    }

    /// Strings that may follow `cmd` at the prompt.
    pub fn completions(&self, cmd: &Command, client: &dyn ClientContext) -> Vec<String> {
        cmd.list_completions(client)
    }

    fn send(&mut self, cmd: &mut Command) -> Result<(), ProtocolError> {
        cmd.set_version(self.version);
        self.codec.send(cmd)
    }

    fn recv_known(&mut self) -> Result<Command, ProtocolError> {
        loop {
            match self.codec.receive("client") {
                Err(e) if e.is_recoverable() => warn!("skipping command from proxy: {e}"),
                other => return other,
            }
        }
    }

    /// Handles a proxy push that arrived outside a matching request.
    ///
    /// `Signal` polls are answered immediately; `Interrupt`s are queued for
    /// the front-end.
    pub fn handle_push(
        &mut self,
        mut push: Command,
        client: &mut dyn ClientContext,
    ) -> Result<(), ProtocolError> {
        match push.kind() {
            CommandKind::Signal => {
                push.run_on_client(client);
                self.send(&mut push)
            }
            _ => {
                debug!(kind = %push.kind(), "queueing proxy notification");
                client.queue_notification(push);
                Ok(())
            }
        }
    }

    /// Waits for the reply to a command of kind `expected`.
    ///
    /// # Errors
    ///
    /// Wire errors, or [`ProtocolError::UnexpectedReply`] for a reply of some
    /// other kind that cannot be delivered asynchronously.
    pub fn await_reply(
        &mut self,
        expected: CommandKind,
        client: &mut dyn ClientContext,
    ) -> Result<Command, ProtocolError> {
        loop {
            let mut cmd = self.recv_known()?;
            if cmd.kind() == expected {
                return Ok(cmd);
            }
            if cmd.kind().is_server_push() {
                self.handle_push(cmd, client)?;
            } else if cmd.supports_async_reply() {
                cmd.on_reply_received(client);
            } else {
                return Err(ProtocolError::UnexpectedReply {
                    expected,
                    got: cmd.kind(),
                });
            }
        }
    }

    /// Waits until the program stops and returns the `Interrupt` announcing it.
    ///
    /// # Errors
    ///
    /// Same as [`await_reply`](Self::await_reply).
    pub fn await_interrupt(
        &mut self,
        client: &mut dyn ClientContext,
    ) -> Result<Command, ProtocolError> {
        loop {
            let mut cmd = self.recv_known()?;
            match cmd.kind() {
                CommandKind::Interrupt => return Ok(cmd),
                CommandKind::Signal => self.handle_push(cmd, client)?,
                _ if cmd.supports_async_reply() => cmd.on_reply_received(client),
                got => {
                    return Err(ProtocolError::UnexpectedReply {
                        expected: CommandKind::Interrupt,
                        got,
                    })
                }
            }
        }
    }

    pub fn codec(&self) -> &WireCodec<C> {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut WireCodec<C> {
        &mut self.codec
    }
}
