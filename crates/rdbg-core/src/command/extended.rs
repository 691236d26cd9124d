//! Extended (`x`) and user (`y`) commands.
//!
//! Both kinds share one id each on the wire and tell their sub-commands apart
//! through the header qualifier: `x tick 5` travels as kind `Extended`,
//! qualifier `"tick"`, args `["5"]`.

use serde_json::json;

use super::{ClientStep, CommandHandler, Header, Reply, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget};
use crate::protocol::codec::ProtocolError;
use crate::protocol::wire::{WireReader, WireWriter};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedCmd {
    pub args: Vec<String>,
    pub reply: Reply,
}

impl CommandHandler for ExtendedCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_strings(&self.args);
        self.reply.encode(w);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.args = r.read_strings()?;
        self.reply = Reply::decode(r)?;
        Ok(())
    }

    fn run_on_client(&mut self, header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        let Some((class, rest)) = client.args().split_first() else {
            client.error(&format!(
                "{} needs a sub-command name, e.g. \"{} <name> [args...]\"",
                header.kind().name(),
                header.kind().name()
            ));
            return ClientStep::Done;
        };
        header.qualifier = class.clone();
        self.args = rest.to_vec();
        ClientStep::Exchange
    }

    fn complete_on_client(&mut self, _header: &Header, client: &mut dyn ClientContext) {
        self.reply.show(client);
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({ "args": self.args, "reply": self.reply });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        self.reply = if header.qualifier.is_empty() {
            Reply::failure(format!("{} without a sub-command", header.kind().name()))
        } else {
            Reply::from_result(target.run_extension(header.kind(), &header.qualifier, &self.args))
        };
        ServerAction::Reply
    }

    fn describe_help(&self, header: &Header) -> String {
        format!(
            "{name} <command> [args...]    run a command registered with the proxy",
            name = header.kind().name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MockDebugTarget;
    use crate::{ClientState, Command, CommandBody, CommandKind};

    #[test]
    fn test_first_argument_becomes_qualifier() {
        // Arrange
        let mut client = ClientState::default();
        client.set_input("tick 5");
        let mut cmd = Command::create(CommandKind::Extended).unwrap();

        // Act
        let step = cmd.run_on_client(&mut client);

        // Assert
        assert_eq!(step, ClientStep::Exchange);
        assert_eq!(cmd.qualifier(), "tick");
        let CommandBody::Extended(x) = cmd.body() else {
            panic!("expected extended body");
        };
        assert_eq!(x.args, vec!["5".to_string()]);
    }

    #[test]
    fn test_server_routes_by_kind_and_qualifier() {
        let mut target = MockDebugTarget::new();
        target
            .expect_run_extension()
            .withf(|kind: &CommandKind, class: &str, args: &[String]| {
                *kind == CommandKind::Extended && class == "tick" && args.is_empty()
            })
            .times(1)
            .returning(|_, _, _| Ok("tick counter = 12".to_string()));
        let mut cmd = Command::extended("tick", &[]);

        assert_eq!(cmd.run_on_server(&mut target), ServerAction::Reply);
    }

    #[test]
    fn test_missing_qualifier_is_reported_without_calling_target() {
        let mut target = MockDebugTarget::new();
        target.expect_run_extension().times(0);
        let mut cmd = Command::create(CommandKind::User).unwrap();

        cmd.run_on_server(&mut target);

        let CommandBody::Extended(x) = cmd.body() else {
            panic!("expected extended body");
        };
        assert!(!x.reply.ok);
    }
}
