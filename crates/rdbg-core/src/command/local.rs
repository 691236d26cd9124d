//! `abort`, `help` and `quit`.

use serde_json::json;

use super::{ClientStep, Command, CommandHandler, Header, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget};
use crate::protocol::codec::ProtocolError;
use crate::protocol::kind::CommandKind;
use crate::protocol::wire::{WireReader, WireWriter};

/// Cancels the line being typed. Never leaves the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbortCmd;

impl CommandHandler for AbortCmd {
    fn encode_payload(&self, _w: &mut WireWriter) {}

    fn decode_payload(&mut self, _r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        client.print("Command aborted.");
        ClientStep::Done
    }

    fn run_on_server(&mut self, _header: &Header, _target: &mut dyn DebugTarget) -> ServerAction {
        ServerAction::Ignore
    }

    fn describe_help(&self, _header: &Header) -> String {
        "abort    discard the command being typed".to_string()
    }
}

/// `help [command]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelpCmd {
    pub args: Vec<String>,
}

impl HelpCmd {
    fn overview() -> String {
        let mut lines = vec!["Commands:".to_string()];
        lines.extend(
            CommandKind::ALL
                .iter()
                .filter(|k| k.is_user_command())
                .map(|k| format!("  {}", k.name())),
        );
        lines.push(String::new());
        lines.push("Type \"help <command>\" or \"<command> ?\" for details.".to_string());
        lines.join("\n")
    }
}

impl CommandHandler for HelpCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_strings(&self.args);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.args = r.read_strings()?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        self.args = client.args().to_vec();
        let Some(topic) = self.args.first() else {
            client.print(&Self::overview());
            return ClientStep::Done;
        };
        let text = CommandKind::from_user_token(topic)
            .filter(|k| k.is_user_command())
            .and_then(|k| Command::create(k).ok())
            .map(|cmd| cmd.describe_help());
        match text {
            Some(text) => client.print(&text),
            None => client.error(&format!("no such command: \"{topic}\"")),
        }
        ClientStep::Done
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        client.set_output(CommandOutput::new(header, json!({ "topic": self.args.first() })));
    }

    fn run_on_server(&mut self, _header: &Header, _target: &mut dyn DebugTarget) -> ServerAction {
        ServerAction::Ignore
    }

    fn list_completions(&self, _header: &Header, _client: &dyn ClientContext) -> Vec<String> {
        CommandKind::ALL
            .iter()
            .filter(|k| k.is_user_command())
            .map(|k| k.name().to_string())
            .collect()
    }

    fn describe_help(&self, _header: &Header) -> String {
        "help [command]    list commands, or describe one of them".to_string()
    }
}

/// Leaves the session. The proxy detaches from the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuitCmd;

impl CommandHandler for QuitCmd {
    fn encode_payload(&self, _w: &mut WireWriter) {}

    fn decode_payload(&mut self, _r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        client.request_quit();
        ClientStep::Send
    }

    fn run_on_server(&mut self, _header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        target.detach();
        ServerAction::Exit
    }

    fn describe_help(&self, _header: &Header) -> String {
        "quit    detach from the program and leave the debugger".to_string()
    }
}
