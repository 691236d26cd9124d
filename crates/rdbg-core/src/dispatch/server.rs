//! Proxy-side dispatch of a single command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::command::{Command, CommandBody, ServerAction};
use crate::context::DebugTarget;
use crate::protocol::channel::Channel;
use crate::protocol::codec::{ProtocolError, WireCodec};
use crate::protocol::kind::CommandKind;

// ── Outcome ───────────────────────────────────────────────────────────────────

/// How one server-side dispatch ended.
///
/// The three cases are mutually exclusive. A preempted command is
/// `Incomplete` even if sending its reply would have failed: its reply is
/// never sent, so no send error can be observed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command ran to completion. Application failures are inside the
    /// command's reply payload and still count as completed.
    Completed {
        /// The interrupt loop must stop and let the program run.
        exit_interrupt: bool,
        /// A reply was sent back to the client.
        replied: bool,
    },
    /// A concurrent interrupt preempted the command; it neither succeeded
    /// nor failed and no reply was sent.
    Incomplete,
    /// The command ran but its reply could not be delivered.
    CommFailure { wire_error: String },
}

impl DispatchOutcome {
    pub fn should_exit_interrupt(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::Completed {
                exit_interrupt: true,
                ..
            }
        )
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, DispatchOutcome::Incomplete)
    }

    /// Transport error text; empty unless the outcome is a communication failure.
    pub fn wire_error(&self) -> &str {
        match self {
            DispatchOutcome::CommFailure { wire_error } => wire_error,
            DispatchOutcome::Completed { .. } | DispatchOutcome::Incomplete => "",
        }
    }
}

// ── Preemption ────────────────────────────────────────────────────────────────

/// Cloneable flag raised when a new interrupt arrives while a command is
/// still executing.
///
/// The debugged program (or the transport watching the socket) holds a
/// clone and calls [`raise`](Self::raise) from any thread. The dispatcher
/// clears the flag before running a command and inspects it afterwards.
#[derive(Debug, Clone, Default)]
pub struct Preemption(Arc<AtomicBool>);

impl Preemption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns whether the flag was raised and lowers it.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Runs received commands against a [`DebugTarget`] and sends their replies.
#[derive(Debug)]
pub struct ServerDispatcher<C> {
    codec: WireCodec<C>,
    preemption: Preemption,
}

impl<C: Channel> ServerDispatcher<C> {
    pub fn new(codec: WireCodec<C>) -> Self {
        Self {
            codec,
            preemption: Preemption::new(),
        }
    }

    /// A handle the host can raise to preempt the running command.
    pub fn preemption(&self) -> Preemption {
        self.preemption.clone()
    }

    /// Receives the next client command.
    ///
    /// # Errors
    ///
    /// Any [`ProtocolError`] from the codec, plus
    /// [`ProtocolError::UnexpectedDirection`] if the client sent a kind only
    /// the proxy may originate.
    pub fn recv(&mut self) -> Result<Command, ProtocolError> {
        let cmd = self.codec.receive("proxy")?;
        if cmd.kind().is_server_push() {
            warn!(kind = %cmd.kind(), "client sent a proxy-only command");
            return Err(ProtocolError::UnexpectedDirection { kind: cmd.kind() });
        }
        Ok(cmd)
    }

    /// Runs `cmd` on the server and delivers its reply if it has one.
    pub fn dispatch(&mut self, cmd: &mut Command, target: &mut dyn DebugTarget) -> DispatchOutcome {
        self.preemption.clear();
        let action = cmd.run_on_server(target);

        if self.preemption.take() {
            debug!(kind = %cmd.kind(), "command preempted by a new interrupt");
            return DispatchOutcome::Incomplete;
        }

        match action {
            ServerAction::Reply => match self.codec.send(cmd) {
                Ok(()) => DispatchOutcome::Completed {
                    exit_interrupt: false,
                    replied: true,
                },
                Err(e) => {
                    warn!(kind = %cmd.kind(), "failed to send reply: {e}");
                    DispatchOutcome::CommFailure {
                        wire_error: e.wire_error(),
                    }
                }
            },
            ServerAction::Exit => DispatchOutcome::Completed {
                exit_interrupt: true,
                replied: false,
            },
            ServerAction::Ignore => DispatchOutcome::Completed {
                exit_interrupt: false,
                replied: false,
            },
        }
    }

    /// Sends an unsolicited proxy push (`Interrupt` or `Signal`).
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnexpectedDirection`] for client kinds, or the
    /// codec's send error.
    pub fn push(&mut self, cmd: &Command) -> Result<(), ProtocolError> {
        if !cmd.kind().is_server_push() {
            return Err(ProtocolError::UnexpectedDirection { kind: cmd.kind() });
        }
        self.codec.send(cmd)
    }

    /// Asks the client whether the user raised a signal while the program ran.
    ///
    /// Unknown kinds are skipped.
    ///
    /// # Errors
    ///
    /// The codec's errors, or [`ProtocolError::UnexpectedReply`] if the
    /// client answers with anything but `Signal`.
    pub fn poll_signal(&mut self) -> Result<i32, ProtocolError> {
        self.push(&Command::signal(0))?;
        loop {
            let answer = match self.codec.receive("proxy signal poll") {
                Ok(cmd) => cmd,
                Err(e) if e.is_recoverable() => continue,
                Err(e) => return Err(e),
            };
            return match answer.body() {
                CommandBody::Signal(s) => Ok(s.signal),
                _ => Err(ProtocolError::UnexpectedReply {
                    expected: CommandKind::Signal,
                    got: answer.kind(),
                }),
            };
        }
    }

    pub fn codec(&self) -> &WireCodec<C> {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut WireCodec<C> {
        &mut self.codec
    }

    pub fn into_codec(self) -> WireCodec<C> {
        self.codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MockDebugTarget;
    use crate::protocol::channel::MemoryChannel;

    fn dispatcher_with(inbound: &[Command]) -> ServerDispatcher<MemoryChannel> {
        ServerDispatcher::new(WireCodec::new(MemoryChannel::with_frames(inbound)))
    }

    #[test]
    fn test_break_scenario_replies_and_keeps_loop_running() {
        // Arrange
        let mut dispatcher = dispatcher_with(&[]);
        let mut target = MockDebugTarget::new();
        target
            .expect_set_breakpoint()
            .returning(|loc| Ok(format!("breakpoint 1 set at {loc}")));
        let mut cmd = Command::breakpoint("file.php:42");

        // Act
        let outcome = dispatcher.dispatch(&mut cmd, &mut target);

        // Assert
        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                exit_interrupt: false,
                replied: true
            }
        );
        assert!(!outcome.should_exit_interrupt());
        let sent = dispatcher.codec().channel().sent_commands().unwrap();
        assert_eq!(sent, vec![cmd]);
    }

    #[test]
    fn test_preempted_command_is_incomplete_and_not_replied() {
        // Arrange
        let mut dispatcher = dispatcher_with(&[]);
        let preemption = dispatcher.preemption();
        let mut target = MockDebugTarget::new();
        target.expect_evaluate().returning(move |_| {
            preemption.raise();
            Ok("1".to_string())
        });
        let mut cmd = Command::eval("sleep(10)");

        // Act
        let outcome = dispatcher.dispatch(&mut cmd, &mut target);

        // Assert
        assert!(outcome.is_incomplete());
        assert_eq!(outcome.wire_error(), "");
        assert!(dispatcher.codec().channel().written().is_empty());
        assert!(!dispatcher.preemption().is_raised());
    }

    #[test]
    fn test_incomplete_wins_over_failing_channel() {
        let mut ch = MemoryChannel::new();
        ch.fail_writes();
        let mut dispatcher = ServerDispatcher::new(WireCodec::new(ch));
        let preemption = dispatcher.preemption();
        let mut target = MockDebugTarget::new();
        target.expect_inspect().returning(move |_, _| {
            preemption.raise();
            Ok(String::new())
        });
        let mut cmd = Command::create(CommandKind::Where).unwrap();

        assert_eq!(dispatcher.dispatch(&mut cmd, &mut target), DispatchOutcome::Incomplete);
    }

    #[test]
    fn test_reply_send_failure_is_comm_failure() {
        let mut ch = MemoryChannel::new();
        ch.fail_writes();
        let mut dispatcher = ServerDispatcher::new(WireCodec::new(ch));
        let mut target = MockDebugTarget::new();
        target.expect_set_breakpoint().returning(|_| Ok(String::new()));
        let mut cmd = Command::breakpoint("a.php:1");

        let outcome = dispatcher.dispatch(&mut cmd, &mut target);

        assert!(matches!(outcome, DispatchOutcome::CommFailure { .. }));
        assert!(!outcome.wire_error().is_empty());
    }

    #[test]
    fn test_flow_command_requests_exit_without_reply() {
        let mut dispatcher = dispatcher_with(&[]);
        let mut target = MockDebugTarget::new();
        target.expect_resume().return_const(());
        let mut cmd = Command::create(CommandKind::Continue).unwrap();

        let outcome = dispatcher.dispatch(&mut cmd, &mut target);

        assert!(outcome.should_exit_interrupt());
        assert!(dispatcher.codec().channel().written().is_empty());
    }

    #[test]
    fn test_recv_rejects_push_kinds_from_client() {
        let mut dispatcher = dispatcher_with(&[Command::signal(0)]);

        assert_eq!(
            dispatcher.recv(),
            Err(ProtocolError::UnexpectedDirection {
                kind: CommandKind::Signal
            })
        );
    }

    #[test]
    fn test_push_rejects_client_kinds() {
        let mut dispatcher = dispatcher_with(&[]);
        assert!(dispatcher.push(&Command::eval("1")).is_err());
    }

    #[test]
    fn test_poll_signal_reads_client_answer() {
        let mut dispatcher = dispatcher_with(&[Command::signal(2)]);

        assert_eq!(dispatcher.poll_signal(), Ok(2));
        let sent = dispatcher.codec().channel().sent_commands().unwrap();
        assert_eq!(sent, vec![Command::signal(0)]);
    }
}
