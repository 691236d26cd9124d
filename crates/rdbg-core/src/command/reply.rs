//! The proxy's answer carried inside most request/response commands.

use serde::Serialize;

use crate::context::ClientContext;
use crate::protocol::codec::ProtocolError;
use crate::protocol::wire::{WireReader, WireWriter};

/// Text answer filled in by the proxy.
///
/// `ok == false` is an application failure (bad breakpoint target, undefined
/// variable...). It is ordinary command output, never a connection fault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub ok: bool,
    pub text: String,
}

impl Reply {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            ok: true,
            text: text.into(),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: text.into(),
        }
    }

    pub fn from_result(result: Result<String, String>) -> Self {
        match result {
            Ok(text) => Self::success(text),
            Err(text) => Self::failure(text),
        }
    }

    pub(crate) fn encode(&self, w: &mut WireWriter) {
        w.write_bool(self.ok);
        w.write_string(&self.text);
    }

    pub(crate) fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let ok = r.read_bool()?;
        let text = r.read_string()?;
        Ok(Self { ok, text })
    }

    /// The same outcome with different display text.
    pub(crate) fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            ok: self.ok,
            text: text.into(),
        }
    }

    /// Prints the reply on the client, as an error line when `ok` is false.
    pub(crate) fn show(&self, client: &mut dyn ClientContext) {
        if self.text.is_empty() {
            return;
        }
        if self.ok {
            client.print(&self.text);
        } else {
            client.error(&self.text);
        }
    }
}
