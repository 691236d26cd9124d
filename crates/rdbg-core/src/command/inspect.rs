//! Read-only queries answered by the proxy as text.
//!
//! `global`, `info`, `konstant`, `list`, `machine`, `thread`, `variable`,
//! `where`, `zend` and `instrument` share one payload: the user's arguments
//! going out, a [`Reply`] coming back.

use serde_json::json;

use super::{ClientStep, CommandHandler, Header, Reply, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget};
use crate::protocol::codec::ProtocolError;
use crate::protocol::kind::CommandKind;
use crate::protocol::wire::{WireReader, WireWriter};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectCmd {
    pub args: Vec<String>,
    pub reply: Reply,
}

impl CommandHandler for InspectCmd {
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
        self.args = client.args().to_vec();
        ClientStep::Exchange
    }

    fn complete_on_client(&mut self, header: &Header, client: &mut dyn ClientContext) {
        let options = client.options().clone();
        match header.kind() {
            CommandKind::List if options.max_code_lines >= 0 => {
                let limit = options.max_code_lines as usize;
                self.reply
                    .with_text(limit_listing(&self.reply.text, limit))
                    .show(client);
            }
            CommandKind::Where if !options.stack_args => {
                self.reply.with_text(hide_stack_args(&self.reply.text)).show(client);
            }
            _ => self.reply.show(client),
        }
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({ "args": self.args, "reply": self.reply });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        self.reply = Reply::from_result(target.inspect(header.kind(), &self.args));
        ServerAction::Reply
    }

    fn list_completions(&self, header: &Header, client: &dyn ClientContext) -> Vec<String> {
        let words: &[&str] = match header.kind() {
            CommandKind::List => return client.source_files(),
            CommandKind::Machine => &["list", "connect", "disconnect", "attach"],
            CommandKind::Thread => &["list", "normal", "sticky", "exclusive"],
            CommandKind::Instrument => &["here", "list", "clear"],
            CommandKind::Info => &["class", "function", "constant"],
            _ => &[],
        };
        words.iter().map(|w| w.to_string()).collect()
    }

    fn describe_help(&self, header: &Header) -> String {
        let line = match header.kind() {
            CommandKind::Global => "global                 list global variables",
            CommandKind::Variable => "variable [name]        list variables of the selected frame",
            CommandKind::Constant => "konstant [prefix]      list defined constants",
            CommandKind::Where => "where                  print the call stack",
            CommandKind::List => "list [file:]line       show source around a line",
            CommandKind::Info => "info [symbol]          describe a class, function or constant",
            CommandKind::Thread => "thread [list|normal|sticky|exclusive]  inspect or switch threads",
            CommandKind::Machine => "machine [list|connect <host>]          inspect debugged machines",
            CommandKind::Instrument => "instrument [here|list|clear]           manage instrumentation points",
            kind => return super::default_help(kind),
        };
        line.to_string()
    }
}

/// Keeps at most `limit` lines of a listing, centred on the `=>` line.
fn limit_listing(text: &str, limit: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= limit {
        return text.to_string();
    }
    let current = lines.iter().position(|l| l.starts_with("=>")).unwrap_or(0);
    let start = current.saturating_sub(limit / 2).min(lines.len() - limit);
    lines[start..start + limit].join("\n")
}

/// Replaces each frame's argument list with `(...)`.
fn hide_stack_args(text: &str) -> String {
    text.lines()
        .map(|line| match (line.find('('), line.rfind(')')) {
            (Some(open), Some(close)) if close > open + 1 => {
                format!("{}(...){}", &line[..open], &line[close + 1..])
            }
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
