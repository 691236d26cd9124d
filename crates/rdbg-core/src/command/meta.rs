//! `shell`, `macro` and `set`.
//!
//! `macro` and `set` only touch client-local state. They have wire ids for
//! compatibility, but the client never sends them and the proxy ignores them.

use serde_json::json;

use super::{ClientStep, CommandHandler, Header, Reply, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget};
use crate::protocol::codec::ProtocolError;
use crate::protocol::wire::{WireReader, WireWriter};

/// `shell <command...>` / `!<command...>`: runs a command on the proxy host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShellCmd {
    pub args: Vec<String>,
    pub reply: Reply,
}

impl CommandHandler for ShellCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_strings(&self.args);
        self.reply.encode(w);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.args = r.read_strings()?;
        self.reply = Reply::decode(r)?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        if client.args().is_empty() {
            client.error("shell needs a command to run");
            return ClientStep::Done;
        }
        self.args = client.args().to_vec();
        ClientStep::Exchange
    }

    fn complete_on_client(&mut self, _header: &Header, client: &mut dyn ClientContext) {
        self.reply.show(client);
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({ "args": self.args, "reply": self.reply });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, _header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        self.reply = Reply::from_result(target.run_shell(&self.args));
        ServerAction::Reply
    }

    fn describe_help(&self, _header: &Header) -> String {
        "shell <command...>    (or \"!<command>\") run a command on the proxy host".to_string()
    }
}

/// `macro start|end [name]|list|replay <n>|clear <n>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroCmd {
    pub args: Vec<String>,
}

impl MacroCmd {
    fn index_arg(&self, client: &mut dyn ClientContext) -> Option<usize> {
        let parsed = self.args.get(1).and_then(|a| a.parse::<usize>().ok());
        if parsed.is_none() {
            client.error("expected a macro number, see \"macro list\"");
        }
        parsed
    }
}

impl CommandHandler for MacroCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_strings(&self.args);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.args = r.read_strings()?;
        Ok(())
    }

    fn run_on_client(&mut self, header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        self.args = client.args().to_vec();
        match self.args.first().map(String::as_str) {
            Some("start") => {
                client.macros().start();
                client.print("Recording macro. Type \"macro end [name]\" to stop.");
            }
            Some("end") => {
                let name = self.args.get(1).cloned();
                match client.macros().end(name) {
                    Ok(index) => client.print(&format!("Saved macro {index}.")),
                    Err(message) => client.error(&message),
                }
            }
            Some("list") => {
                let listing: Vec<String> = client
                    .macros()
                    .iter()
                    .enumerate()
                    .map(|(i, m)| format!("{i}  {}  ({} lines)", m.name, m.lines.len()))
                    .collect();
                if listing.is_empty() {
                    client.print("No macros recorded.");
                } else {
                    client.print(&listing.join("\n"));
                }
            }
            Some("replay") => {
                if let Some(index) = self.index_arg(client) {
                    if let Err(message) = client.macros().replay(index) {
                        client.error(&message);
                    }
                }
            }
            Some("clear") => {
                if let Some(index) = self.index_arg(client) {
                    match client.macros().remove(index) {
                        Some(m) => client.print(&format!("Deleted macro \"{}\".", m.name)),
                        None => client.error(&format!("no macro {index}")),
                    }
                }
            }
            _ => client.error(&self.describe_help(header)),
        }
        ClientStep::Done
    }

    fn run_on_server(&mut self, _header: &Header, _target: &mut dyn DebugTarget) -> ServerAction {
        ServerAction::Ignore
    }

    fn list_completions(&self, _header: &Header, _client: &dyn ClientContext) -> Vec<String> {
        ["start", "end", "list", "replay", "clear"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn describe_help(&self, _header: &Header) -> String {
        [
            "macro start           start recording the lines you type",
            "macro end [name]      stop recording and save the macro",
            "macro list            list saved macros",
            "macro replay <n>      run macro n again",
            "macro clear <n>       delete macro n",
        ]
        .join("\n")
    }
}

/// `set [option [value]]`: shows or changes a client option.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigCmd {
    pub args: Vec<String>,
}

impl CommandHandler for ConfigCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_strings(&self.args);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.args = r.read_strings()?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        self.args = client.args().to_vec();
        match self.args.as_slice() {
            [] => {
                let listing: Vec<String> = client
                    .options()
                    .entries()
                    .into_iter()
                    .map(|(key, value)| format!("{key} = {value}"))
                    .collect();
                client.print(&listing.join("\n"));
            }
            [key] => match client.options().get(key) {
                Some(value) => client.print(&format!("{key} = {value}")),
                None => client.error(&format!("unknown option \"{key}\"")),
            },
            [key, value, ..] => match client.options().set(key, value) {
                Ok(()) => client.print(&format!("{key} set to {value}")),
                Err(message) => client.error(&message),
            },
        }
        ClientStep::Done
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        client.set_output(CommandOutput::new(header, json!({ "args": self.args })));
    }

    fn run_on_server(&mut self, _header: &Header, _target: &mut dyn DebugTarget) -> ServerAction {
        ServerAction::Ignore
    }

    fn list_completions(&self, _header: &Header, _client: &dyn ClientContext) -> Vec<String> {
        crate::client_state::ClientOptions::KEYS
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    fn describe_help(&self, _header: &Header) -> String {
        "set [option [value]]    show all options, show one, or change one".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MockDebugTarget;
    use crate::{ClientState, Command, CommandKind, OutputLine};

    #[test]
    fn test_shell_without_command_stays_local() {
        let mut client = ClientState::default();
        client.set_input("");
        let mut cmd = Command::create(CommandKind::Shell).unwrap();

        assert_eq!(cmd.run_on_client(&mut client), ClientStep::Done);
    }

    #[test]
    fn test_shell_runs_on_target() {
        let mut target = MockDebugTarget::new();
        target
            .expect_run_shell()
            .withf(|args: &[String]| args.len() == 2 && args[0] == "ls")
            .returning(|_| Ok("index.php".to_string()));
        let mut client = ClientState::default();
        client.set_input("ls -l");
        let mut cmd = Command::create(CommandKind::Shell).unwrap();
        cmd.run_on_client(&mut client);

        assert_eq!(cmd.run_on_server(&mut target), ServerAction::Reply);
    }

    #[test]
    fn test_set_changes_option_case_insensitively() {
        // Arrange
        let mut client = ClientState::default();
        client.set_input("maxcodelines 2");
        let mut cmd = Command::create(CommandKind::Config).unwrap();

        // Act
        let step = cmd.run_on_client(&mut client);

        // Assert
        assert_eq!(step, ClientStep::Done);
        assert_eq!(client.options().max_code_lines, 2);
    }

    #[test]
    fn test_set_rejects_unknown_option() {
        let mut client = ClientState::default();
        client.set_input("Colour red");
        let mut cmd = Command::create(CommandKind::Config).unwrap();

        cmd.run_on_client(&mut client);

        assert!(matches!(&client.take_output()[0], OutputLine::Error(_)));
    }

    #[test]
    fn test_macro_start_end_list() {
        let mut client = ClientState::default();
        let run = |client: &mut ClientState, line: &str| {
            client.set_input(line);
            Command::create(CommandKind::Macro)
                .unwrap()
                .run_on_client(client)
        };

        run(&mut client, "start");
        client.macros().record("break a.php:3");
        run(&mut client, "end warmup");
        client.take_output();
        run(&mut client, "list");

        assert_eq!(
            client.take_output(),
            vec![OutputLine::Info("0  warmup  (1 lines)".to_string())]
        );
    }

    #[test]
    fn test_macro_and_set_are_ignored_by_server() {
        let mut target = MockDebugTarget::new();
        for kind in [CommandKind::Macro, CommandKind::Config] {
            let mut cmd = Command::create(kind).unwrap();
            assert_eq!(cmd.run_on_server(&mut target), ServerAction::Ignore);
        }
    }
}
