//! `up`, `down` and `frame`: move through the paused call stack.

use serde_json::json;

use super::{ClientStep, CommandHandler, Header, Reply, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget, FrameMotion};
use crate::protocol::codec::ProtocolError;
use crate::protocol::kind::CommandKind;
use crate::protocol::wire::{WireReader, WireWriter};

/// Relative (`up`/`down`) or absolute (`frame`) stack frame selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCmd {
    pub offset: i32,
    pub reply: Reply,
}

impl Default for FrameCmd {
    fn default() -> Self {
        Self {
            offset: 1,
            reply: Reply::default(),
        }
    }
}

impl FrameCmd {
    fn motion(&self, kind: CommandKind) -> Option<FrameMotion> {
        match kind {
            CommandKind::Up => Some(FrameMotion::Up(self.offset)),
            CommandKind::Down => Some(FrameMotion::Down(self.offset)),
            CommandKind::Frame => Some(FrameMotion::To(self.offset)),
            _ => None,
        }
    }
}

impl CommandHandler for FrameCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_i32(self.offset);
        self.reply.encode(w);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.offset = r.read_i32()?;
        self.reply = Reply::decode(r)?;
        Ok(())
    }

    fn run_on_client(&mut self, header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        let absolute = header.kind() == CommandKind::Frame;
        let parsed = match client.args().first() {
            None if absolute => None,
            None => Some(1),
            Some(arg) => arg.parse::<i32>().ok().filter(|n| *n >= 0),
        };
        match parsed {
            Some(offset) => {
                self.offset = offset;
                ClientStep::Exchange
            }
            None if absolute => {
                client.error("frame needs a frame index, e.g. \"frame 2\"");
                ClientStep::Done
            }
            None => {
                client.error(&format!(
                    "{} takes an optional non-negative count",
                    header.kind().name()
                ));
                ClientStep::Done
            }
        }
    }

    fn complete_on_client(&mut self, _header: &Header, client: &mut dyn ClientContext) {
        self.reply.show(client);
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({ "offset": self.offset, "reply": self.reply });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        self.reply = match self.motion(header.kind()) {
            Some(motion) => Reply::from_result(target.select_frame(motion)),
            None => Reply::failure(format!("{} is not a frame command", header.kind())),
        };
        ServerAction::Reply
    }

    fn describe_help(&self, header: &Header) -> String {
        match header.kind() {
            CommandKind::Frame => "frame <index>    select the stack frame with that index".to_string(),
            kind => format!(
                "{} [count]    move {} the call stack by count frames (default 1)",
                kind.name(),
                kind.name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MockDebugTarget;
    use crate::{ClientState, Command};
    use mockall::predicate::eq;

    #[test]
    fn test_up_defaults_to_one_frame() {
        let mut client = ClientState::default();
        client.set_input("");
        let mut cmd = Command::create(CommandKind::Up).unwrap();

        assert_eq!(cmd.run_on_client(&mut client), ClientStep::Exchange);

        let mut target = MockDebugTarget::new();
        target
            .expect_select_frame()
            .with(eq(FrameMotion::Up(1)))
            .returning(|_| Ok("#1 caller() at a.php:3".to_string()));
        assert_eq!(cmd.run_on_server(&mut target), ServerAction::Reply);
    }

    #[test]
    fn test_frame_requires_index() {
        let mut client = ClientState::default();
        client.set_input("");
        let mut cmd = Command::create(CommandKind::Frame).unwrap();

        assert_eq!(cmd.run_on_client(&mut client), ClientStep::Done);
    }

    #[test]
    fn test_frame_index_is_absolute() {
        let mut client = ClientState::default();
        client.set_input("2");
        let mut cmd = Command::create(CommandKind::Frame).unwrap();
        cmd.run_on_client(&mut client);
        let mut target = MockDebugTarget::new();
        target
            .expect_select_frame()
            .with(eq(FrameMotion::To(2)))
            .times(1)
            .returning(|_| Err("no frame #2".to_string()));

        cmd.run_on_server(&mut target);

        let crate::CommandBody::Frame(f) = cmd.body() else {
            panic!("expected frame body");
        };
        assert_eq!(f.reply, Reply::failure("no frame #2"));
    }
}
