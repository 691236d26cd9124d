//! `eval`/`print` and `complete`.

use serde_json::json;

use super::{ClientStep, CommandHandler, Header, Reply, ReplyHandler, ServerAction};
use crate::context::{ClientContext, CommandOutput, DebugTarget};
use crate::protocol::codec::ProtocolError;
use crate::protocol::kind::CommandKind;
use crate::protocol::wire::{WireReader, WireWriter};

/// Evaluates code (`eval`, `@`) or an expression (`print`, `=`) in the
/// selected frame.
///
/// The only variant whose reply may arrive outside its request/response
/// pair, e.g. when an evaluation hits a breakpoint and the proxy finishes it
/// later. Such replies are delivered through [`ReplyHandler`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalCmd {
    pub code: String,
    pub reply: Reply,
}

impl EvalCmd {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reply: Reply::default(),
        }
    }
}

impl EvalCmd {
    /// Shows the result cut to the `ShortPrintCharCount` option.
    fn show_short(&self, client: &mut dyn ClientContext) {
        let limit = usize::try_from(client.options().short_print_char_count).unwrap_or(0);
        match self.reply.text.char_indices().nth(limit) {
            Some((cut, _)) if limit > 0 => {
                let short = format!("{}...", &self.reply.text[..cut]);
                self.reply.with_text(short).show(client);
            }
            _ => self.reply.show(client),
        }
    }
}

impl CommandHandler for EvalCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_string(&self.code);
        self.reply.encode(w);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.code = r.read_string()?;
        self.reply = Reply::decode(r)?;
        Ok(())
    }

    fn run_on_client(&mut self, header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        let code = client.argument_text().trim().to_string();
        if code.is_empty() {
            client.error(&format!("{} needs something to evaluate", header.kind().name()));
            return ClientStep::Done;
        }
        self.code = code;
        ClientStep::Exchange
    }

    fn complete_on_client(&mut self, _header: &Header, client: &mut dyn ClientContext) {
        self.show_short(client);
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({ "code": self.code, "reply": self.reply });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, _header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        self.reply = Reply::from_result(target.evaluate(&self.code));
        ServerAction::Reply
    }

    fn describe_help(&self, header: &Header) -> String {
        match header.kind() {
            CommandKind::Print => "print <expression>    (or \"= <expression>\") print a value".to_string(),
            _ => "eval <code>    (or \"@<code>\") run code in the selected frame".to_string(),
        }
    }
}

impl ReplyHandler for EvalCmd {
    fn on_reply_received(&mut self, _header: &Header, client: &mut dyn ClientContext) {
        self.show_short(client);
    }
}

/// `complete <prefix>`: asks the proxy for matching symbols.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompleteCmd {
    pub prefix: String,
    pub candidates: Vec<String>,
}

impl CommandHandler for CompleteCmd {
    fn encode_payload(&self, w: &mut WireWriter) {
        w.write_string(&self.prefix);
        w.write_strings(&self.candidates);
    }

    fn decode_payload(&mut self, r: &mut WireReader<'_>) -> Result<(), ProtocolError> {
        self.prefix = r.read_string()?;
        self.candidates = r.read_strings()?;
        Ok(())
    }

    fn run_on_client(&mut self, _header: &mut Header, client: &mut dyn ClientContext) -> ClientStep {
        self.prefix = client.argument_text().trim().to_string();
        self.candidates.clear();
        ClientStep::Exchange
    }

    fn complete_on_client(&mut self, _header: &Header, client: &mut dyn ClientContext) {
        if self.candidates.is_empty() {
            client.print("(no matches)");
        } else {
            client.print(&self.candidates.join("\n"));
        }
    }

    fn report_to_observer(&self, header: &Header, client: &mut dyn ClientContext) {
        let value = json!({ "prefix": self.prefix, "candidates": self.candidates });
        client.set_output(CommandOutput::new(header, value));
    }

    fn run_on_server(&mut self, _header: &Header, target: &mut dyn DebugTarget) -> ServerAction {
        self.candidates = target.complete(&self.prefix);
        ServerAction::Reply
    }
}
