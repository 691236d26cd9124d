//! `break` and `exception`: ask the program to stop somewhere.

use serde_json::json;

use super::{ClientStep, CommandHandler, Header, Reply, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget};
use crate::protocol::codec::ProtocolError;
use crate::protocol::wire::{WireReader, WireWriter};

/// `break <file:line>` or `break <function()>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreakCmd {
    pub location: String,
    pub reply: Reply,
}

impl CommandHandler for BreakCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_string(&self.location);
        self.reply.encode(w);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.location = r.read_string()?;
        self.reply = Reply::decode(r)?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        let location = client.argument_text().trim().to_string();
        if location.is_empty() {
            client.error("break needs a location, e.g. \"break file.php:42\" or \"break foo()\"");
            return ClientStep::Done;
        }
        self.location = location;
        ClientStep::Exchange
    }

    fn complete_on_client(&mut self, _header: &Header, client: &mut dyn ClientContext) {
        self.reply.show(client);
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({ "location": self.location, "reply": self.reply });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, _header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        self.reply = Reply::from_result(target.set_breakpoint(&self.location));
        ServerAction::Reply
    }

    fn list_completions(&self, _header: &Header, client: &dyn ClientContext) -> Vec<String> {
        client.source_files()
    }

    fn describe_help(&self, _header: &Header) -> String {
        [
            "break <file>:<line>     stop when execution reaches that line",
            "break <function>()      stop when the function is entered",
            "",
            "The proxy answers with the breakpoint it installed, or with the",
            "reason it could not install it.",
        ]
        .join("\n")
    }
}

/// `exception <ClassName>`: stop when an exception of that class is thrown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionCmd {
    pub class_name: String,
    pub reply: Reply,
}

impl CommandHandler for ExceptionCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_string(&self.class_name);
        self.reply.encode(w);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.class_name = r.read_string()?;
        self.reply = Reply::decode(r)?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        match client.args().first() {
            Some(class_name) => {
                self.class_name = class_name.clone();
                ClientStep::Exchange
            }
            None => {
                client.error("exception needs a class name, e.g. \"exception RuntimeException\"");
                ClientStep::Done
            }
        }
    }

    fn complete_on_client(&mut self, _header: &Header, client: &mut dyn ClientContext) {
        self.reply.show(client);
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({ "class": self.class_name, "reply": self.reply });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, _header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        self.reply = Reply::from_result(target.break_on_exception(&self.class_name));
        ServerAction::Reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MockDebugTarget;
    use crate::{ClientState, Command, CommandBody, CommandKind};

    #[test]
    fn test_break_on_server_fills_reply_and_keeps_loop_running() {
        // Arrange
        let mut target = MockDebugTarget::new();
        target
            .expect_set_breakpoint()
            .withf(|location: &str| location == "file.php:42")
            .times(1)
            .returning(|_| Ok("breakpoint 1 set at file.php:42".to_string()));
        let mut cmd = Command::breakpoint("file.php:42");

        // Act
        let action = cmd.run_on_server(&mut target);

        // Assert
        assert_eq!(action, ServerAction::Reply);
        match cmd.body() {
            CommandBody::Break(b) => {
                assert!(b.reply.ok);
                assert_eq!(b.reply.text, "breakpoint 1 set at file.php:42");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_break_application_failure_travels_in_reply() {
        let mut target = MockDebugTarget::new();
        target
            .expect_set_breakpoint()
            .returning(|_| Err("no such file: nope.php".to_string()));
        let mut cmd = Command::breakpoint("nope.php:1");

        let action = cmd.run_on_server(&mut target);

        assert_eq!(action, ServerAction::Reply);
        let CommandBody::Break(b) = cmd.body() else {
            panic!("expected break body");
        };
        assert!(!b.reply.ok);
    }

    #[test]
    fn test_break_without_location_is_handled_locally() {
        let mut client = ClientState::default();
        client.set_input("");
        let mut cmd = Command::create(CommandKind::Break).unwrap();

        let step = cmd.run_on_client(&mut client);

        assert_eq!(step, ClientStep::Done);
        assert_eq!(client.take_output().len(), 1);
    }

    #[test]
    fn test_exception_takes_first_argument_as_class() {
        let mut client = ClientState::default();
        client.set_input("RuntimeException extra");
        let mut cmd = Command::create(CommandKind::Exception).unwrap();

        let step = cmd.run_on_client(&mut client);

        assert_eq!(step, ClientStep::Exchange);
        let CommandBody::Exception(e) = cmd.body() else {
            panic!("expected exception body");
        };
        assert_eq!(e.class_name, "RuntimeException");
    }
}
