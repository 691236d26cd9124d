//! Client-local state: printed output, options, macros, pending pushes.
//!
//! [`ClientState`] is the stock [`ClientContext`] implementation. The console
//! front-end owns one, feeds it each typed line via [`ClientState::set_input`]
//! and drains [`ClientState::take_output`] after every dispatch. Tests use it
//! the same way.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::context::{ClientContext, CommandOutput};
use crate::protocol::kind::CommandKind;

// ── Output ────────────────────────────────────────────────────────────────────

/// One line (or block) printed by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Info(String),
    Error(String),
}

// ── Options ───────────────────────────────────────────────────────────────────

fn default_max_code_lines() -> i32 {
    -1
}

fn default_short_print_char_count() -> i32 {
    200
}

fn default_stack_args() -> bool {
    true
}

/// User-tunable client options, changed at the prompt with `set`.
///
/// Also the `[options]` section of the client configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Print command results as JSON records instead of text.
    #[serde(default)]
    pub api_mode: bool,
    /// Most lines `list` shows, kept around the current line; -1 for all.
    #[serde(default = "default_max_code_lines")]
    pub max_code_lines: i32,
    /// `eval` and `print` results longer than this many characters are cut.
    #[serde(default = "default_short_print_char_count")]
    pub short_print_char_count: i32,
    /// When off, `where` prints `name(...)` instead of argument values.
    #[serde(default = "default_stack_args")]
    pub stack_args: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_mode: false,
            max_code_lines: default_max_code_lines(),
            short_print_char_count: default_short_print_char_count(),
            stack_args: default_stack_args(),
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn show_switch(value: bool) -> String {
    let text = if value { "on" } else { "off" };
    text.to_string()
}

impl ClientOptions {
    /// Option names as shown by `set`.
    pub const KEYS: [&'static str; 4] = [
        "ApiMode",
        "MaxCodeLines",
        "ShortPrintCharCount",
        "StackArgs",
    ];

    fn canonical(key: &str) -> Option<&'static str> {
        Self::KEYS.iter().copied().find(|k| k.eq_ignore_ascii_case(key))
    }

    /// Current value of `key` (case-insensitive), formatted for display.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match Self::canonical(key)? {
            "ApiMode" => show_switch(self.api_mode),
            "MaxCodeLines" => self.max_code_lines.to_string(),
            "ShortPrintCharCount" => self.short_print_char_count.to_string(),
            "StackArgs" => show_switch(self.stack_args),
            _ => return None,
        };
        Some(value)
    }

    /// Sets `key` (case-insensitive) from user text.
    ///
    /// # Errors
    ///
    /// Returns a printable message for unknown keys or unparsable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let key = Self::canonical(key).ok_or_else(|| format!("unknown option \"{key}\""))?;
        let bad_value = || format!("{key} does not accept \"{value}\"");
        match key {
            "ApiMode" => self.api_mode = parse_switch(value).ok_or_else(bad_value)?,
            "StackArgs" => self.stack_args = parse_switch(value).ok_or_else(bad_value)?,
            "MaxCodeLines" => {
                self.max_code_lines = value
                    .parse::<i32>()
                    .ok()
                    .filter(|n| *n >= -1)
                    .ok_or_else(bad_value)?
            }
            "ShortPrintCharCount" => {
                self.short_print_char_count = value
                    .parse::<i32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(bad_value)?
            }
            _ => return Err(bad_value()),
        }
        Ok(())
    }

    /// Every option with its display value, in [`KEYS`](Self::KEYS) order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        Self::KEYS
            .iter()
            .filter_map(|k| self.get(k).map(|v| (*k, v)))
            .collect()
    }
}

// ── Macros ────────────────────────────────────────────────────────────────────

/// A recorded sequence of prompt lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub lines: Vec<String>,
}

/// Saved macros plus the one being recorded and the lines queued for replay.
#[derive(Debug, Clone, Default)]
pub struct MacroBook {
    saved: Vec<Macro>,
    recording: Option<Vec<String>>,
    replay: VecDeque<String>,
}

impl MacroBook {
    /// Starts recording, discarding any unfinished recording.
    pub fn start(&mut self) {
        self.recording = Some(Vec::new());
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Appends a typed line to the recording. `macro` lines themselves are
    /// never recorded.
    pub fn record(&mut self, line: &str) {
        let Some(lines) = self.recording.as_mut() else {
            return;
        };
        let trimmed = line.trim();
        let first = trimmed.split_whitespace().next().unwrap_or("");
        if trimmed.is_empty()
            || trimmed.starts_with('&')
            || CommandKind::from_user_token(first) == Some(CommandKind::Macro)
        {
            return;
        }
        lines.push(trimmed.to_string());
    }

    /// Stops recording and saves the macro, returning its number.
    ///
    /// # Errors
    ///
    /// Returns a printable message if no recording is in progress.
    pub fn end(&mut self, name: Option<String>) -> Result<usize, String> {
        let lines = self
            .recording
            .take()
            .ok_or_else(|| "not recording a macro; use \"macro start\" first".to_string())?;
        self.saved.push(Macro {
            name: name.unwrap_or_else(|| "default".to_string()),
            lines,
        });
        Ok(self.saved.len() - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.saved.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Macro> {
        self.saved.get(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<Macro> {
        (index < self.saved.len()).then(|| self.saved.remove(index))
    }

    /// Queues the lines of macro `index` to be run as if typed.
    ///
    /// # Errors
    ///
    /// Returns a printable message if there is no such macro.
    pub fn replay(&mut self, index: usize) -> Result<(), String> {
        let lines = self
            .saved
            .get(index)
            .map(|m| m.lines.clone())
            .ok_or_else(|| format!("no macro {index}"))?;
        self.replay.extend(lines);
        Ok(())
    }

    /// Next queued replay line, if any.
    pub fn next_replay_line(&mut self) -> Option<String> {
        self.replay.pop_front()
    }
}

// ── ClientState ───────────────────────────────────────────────────────────────

/// The console's [`ClientContext`].
#[derive(Debug, Default)]
pub struct ClientState {
    argument_text: String,
    args: Vec<String>,
    output: Vec<OutputLine>,
    last_output: Option<CommandOutput>,
    notifications: VecDeque<Command>,
    source_files: BTreeSet<String>,
    pending_signal: Arc<AtomicI32>,
    quit: bool,
    options: ClientOptions,
    macros: MacroBook,
}

impl ClientState {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Sets the text that followed the command token on the current line.
    pub fn set_input(&mut self, argument_text: &str) {
        self.argument_text = argument_text.to_string();
        self.args = argument_text.split_whitespace().map(str::to_string).collect();
    }

    /// Drains everything printed since the last call.
    pub fn take_output(&mut self) -> Vec<OutputLine> {
        std::mem::take(&mut self.output)
    }

    /// The observer record of the most recent command.
    pub fn last_output(&self) -> Option<&CommandOutput> {
        self.last_output.as_ref()
    }

    /// Drains proxy pushes received while waiting for something else.
    pub fn take_notifications(&mut self) -> Vec<Command> {
        self.notifications.drain(..).collect()
    }

    /// Shared slot a Ctrl-C handler stores a signal into; the next `Signal`
    /// poll from the proxy picks it up.
    pub fn signal_handle(&self) -> Arc<AtomicI32> {
        Arc::clone(&self.pending_signal)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn add_source_file(&mut self, file: impl Into<String>) {
        self.source_files.insert(file.into());
    }
}

impl ClientContext for ClientState {
    fn args(&self) -> &[String] {
        &self.args
    }

    fn argument_text(&self) -> &str {
        &self.argument_text
    }

    fn print(&mut self, text: &str) {
        self.output.push(OutputLine::Info(text.to_string()));
    }

    fn error(&mut self, text: &str) {
        self.output.push(OutputLine::Error(text.to_string()));
    }

    fn set_output(&mut self, output: CommandOutput) {
        self.last_output = Some(output);
    }

    fn source_files(&self) -> Vec<String> {
        self.source_files.iter().cloned().collect()
    }

    fn note_location(&mut self, location: &str) {
        let file = match location.rsplit_once(':') {
            Some((file, line)) if line.chars().all(|c| c.is_ascii_digit()) => file,
            _ => location,
        };
        if !file.is_empty() {
            self.source_files.insert(file.to_string());
        }
    }

    fn queue_notification(&mut self, cmd: Command) {
        self.notifications.push_back(cmd);
    }

    fn take_pending_signal(&mut self) -> i32 {
        self.pending_signal.swap(0, Ordering::SeqCst)
    }

    fn request_quit(&mut self) {
        self.quit = true;
    }

    fn options(&mut self) -> &mut ClientOptions {
        &mut self.options
    }

    fn macros(&mut self) -> &mut MacroBook {
        &mut self.macros
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.get("shortprintcharcount").as_deref(), Some("200"));
        assert_eq!(options.get("MaxCodeLines").as_deref(), Some("-1"));
        assert_eq!(options.get("stackargs").as_deref(), Some("on"));
        assert_eq!(options.get("nope"), None);
    }

    #[test]
    fn test_option_set_validates_values() {
        let mut options = ClientOptions::default();

        assert!(options.set("ApiMode", "on").is_ok());
        assert!(options.api_mode);
        assert!(options.set("MaxCodeLines", "-3").is_err());
        assert!(options.set("StackArgs", "maybe").is_err());
        assert!(options.set("PrintLevel", "2").is_err());
        assert_eq!(options.max_code_lines, -1);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ClientOptions = serde_json::from_str(r#"{"max_code_lines": 2}"#).unwrap();
        assert_eq!(options.max_code_lines, 2);
        assert_eq!(options.short_print_char_count, 200);
        assert!(options.stack_args);
    }

    #[test]
    fn test_macro_recording_skips_macro_lines() {
        // Arrange
        let mut book = MacroBook::default();
        book.record("break a.php:1");

        // Act
        book.start();
        book.record("break a.php:2");
        book.record("macro end");
        book.record("   ");
        book.record("continue");
        let index = book.end(None).unwrap();

        // Assert
        assert_eq!(index, 0);
        let saved = book.get(0).unwrap();
        assert_eq!(saved.name, "default");
        assert_eq!(saved.lines, vec!["break a.php:2", "continue"]);
    }

    #[test]
    fn test_macro_replay_queues_lines_in_order() {
        let mut book = MacroBook::default();
        book.start();
        book.record("where");
        book.record("up");
        book.end(Some("look".to_string())).unwrap();

        book.replay(0).unwrap();

        assert_eq!(book.next_replay_line().as_deref(), Some("where"));
        assert_eq!(book.next_replay_line().as_deref(), Some("up"));
        assert_eq!(book.next_replay_line(), None);
        assert!(book.replay(5).is_err());
    }

    #[test]
    fn test_end_without_start_is_an_error() {
        let mut book = MacroBook::default();
        assert!(book.end(None).is_err());
    }

    #[test]
    fn test_note_location_strips_line_number() {
        let mut state = ClientState::default();

        state.note_location("src/app.php:40");
        state.note_location("main()");

        assert_eq!(
            state.source_files(),
            vec!["main()".to_string(), "src/app.php".to_string()]
        );
    }

    #[test]
    fn test_set_input_splits_args_but_keeps_text() {
        let mut state = ClientState::default();
        state.set_input(" $a  + 1");
        assert_eq!(state.args(), &["$a".to_string(), "+".to_string(), "1".to_string()]);
        assert_eq!(state.argument_text(), " $a  + 1");
    }
}
