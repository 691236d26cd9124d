//! Commands that hand control back to the debugged program.
//!
//! On the proxy these end the interrupt loop: the program resumes and the
//! client waits for the next `Interrupt` push.

use serde_json::json;

use super::{ClientStep, CommandHandler, Header, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget, FlowMode};
use crate::protocol::codec::ProtocolError;
use crate::protocol::wire::{WireReader, WireWriter};

/// `continue`, `next`, `out`, `step`, each with an optional repeat count.
///
/// Any count is carried as-is; the proxy runs a count below 1 once.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowCmd {
    pub count: i32,
}

impl Default for FlowCmd {
    fn default() -> Self {
        Self { count: 1 }
    }
}

impl CommandHandler for FlowCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_i32(self.count);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.count = r.read_i32()?;
        Ok(())
    }

    fn run_on_client(&mut self, header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        let Some(arg) = client.args().first().cloned() else {
            self.count = 1;
            return ClientStep::Resume;
        };
        match arg.parse::<i32>() {
            Ok(count) if count >= 1 => {
                self.count = count;
                ClientStep::Resume
            }
            _ => {
                client.error(&format!(
                    "{} takes an optional positive count, got \"{arg}\"",
                    header.kind().name()
                ));
                ClientStep::Done
            }
        }
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        client.set_output(CommandOutput::new(header, json!({ "count": self.count })));
    }

    fn run_on_server(&mut self, header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        match FlowMode::from_kind(header.kind()) {
            Some(mode) => {
                target.resume(mode, self.count.max(1));
                ServerAction::Exit
            }
            None => ServerAction::Ignore,
        }
    }

    fn describe_help(&self, header: &Header) -> String {
        let what = match FlowMode::from_kind(header.kind()) {
            Some(FlowMode::Continue) => "run until the next breakpoint",
            Some(FlowMode::Next) => "run to the next line, stepping over calls",
            Some(FlowMode::Out) => "run until the current function returns",
            Some(FlowMode::Step) => "run to the next line, stepping into calls",
            None => "resume the program",
        };
        format!(
            "{name} [count]    {what}\n\nWith a count, the command is repeated that many times.",
            name = header.kind().name()
        )
    }
}

/// `run [args...]`: restart the program from the beginning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunCmd {
    pub args: Vec<String>,
}

impl CommandHandler for RunCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_strings(&self.args);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.args = r.read_strings()?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        self.args = client.args().to_vec();
        ClientStep::Resume
    }

    fn run_on_server(&mut self, _header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        target.restart(&self.args);
        ServerAction::Exit
    }

    fn describe_help(&self, _header: &Header) -> String {
        "run [args...]    restart the program, optionally with new arguments".to_string()
    }
}
