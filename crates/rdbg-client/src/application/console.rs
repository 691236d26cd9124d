//! The interactive console.
//!
//! Each typed line goes through the same steps:
//!
//! 1. Recorded into the macro being captured, if any.
//! 2. Parsed into a fresh command plus the text after its token.
//! 3. Run through [`ClientDispatcher::run`], which may talk to the proxy.
//! 4. Whatever the command printed is written out; in API mode the
//!    command's observer record follows as one JSON line.
//! 5. Proxy pushes that arrived meanwhile are shown.
//!
//! Lines queued by `macro replay` are executed before the next line is read
//! from the input, and echoed after the prompt as if typed.

use std::io::{BufRead, Write};

use rdbg_core::{
    parse_user_input, Channel, ClientContext, ClientDispatcher, ClientOutcome, ClientState,
    Command, CommandKind, OutputLine, ProtocolError,
};
use thiserror::Error;
use tracing::debug;

pub const PROMPT: &str = "rdbg> ";

/// Errors that end the console.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The connection to the proxy failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Reading input or writing output failed.
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An observer record could not be rendered as JSON.
    #[error("failed to render API output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whether the console keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Quit,
}

/// Prompt loop over a connection to the proxy.
pub struct Console<C> {
    dispatcher: ClientDispatcher<C>,
    state: ClientState,
}

impl<C: Channel> Console<C> {
    pub fn new(dispatcher: ClientDispatcher<C>, state: ClientState) -> Self {
        Self { dispatcher, state }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ClientState {
        &mut self.state
    }

    pub fn dispatcher(&self) -> &ClientDispatcher<C> {
        &self.dispatcher
    }

    fn api_mode(&mut self) -> bool {
        self.state.options().api_mode
    }

    /// Waits for the proxy's first `Interrupt` and shows it.
    ///
    /// # Errors
    ///
    /// [`ConsoleError::Protocol`] if the proxy sends anything else or the
    /// connection fails.
    pub fn attach<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError> {
        let mut stop = self.dispatcher.await_interrupt(&mut self.state)?;
        stop.run_on_client(&mut self.state);
        self.write_output(out)?;
        if self.api_mode() {
            stop.report_to_observer(&mut self.state);
            self.write_observer_record(out)?;
        }
        Ok(())
    }

    /// Runs one typed line.
    ///
    /// Unknown commands are reported on `out` and are not errors.
    ///
    /// # Errors
    ///
    /// Wire errors from the dispatcher and I/O errors on `out`.
    pub fn execute_line<W: Write>(
        &mut self,
        line: &str,
        out: &mut W,
    ) -> Result<LineOutcome, ConsoleError> {
        self.state.macros().record(line);

        let (mut cmd, rest) = match parse_user_input(line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(LineOutcome::Continue),
            Err(e) => {
                writeln!(out, "{e}")?;
                return Ok(LineOutcome::Continue);
            }
        };

        self.state.set_input(&rest);
        let outcome = self.dispatcher.run(&mut cmd, &mut self.state)?;
        debug!(kind = %cmd.kind(), ?outcome, "command finished");

        self.write_output(out)?;
        if outcome != ClientOutcome::HelpShown && self.api_mode() {
            self.write_observer_record(out)?;
        }
        self.show_notifications(out)?;

        if self.state.quit_requested() {
            Ok(LineOutcome::Quit)
        } else {
            Ok(LineOutcome::Continue)
        }
    }

    /// Reads lines from `input` until end of input or `quit`.
    ///
    /// Returns the number of lines executed, replayed macro lines included.
    ///
    /// # Errors
    ///
    /// Same as [`execute_line`](Self::execute_line), plus read errors.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        out: &mut W,
    ) -> Result<usize, ConsoleError> {
        let mut lines = input.lines();
        let mut executed = 0;

        loop {
            let show_prompt = !self.api_mode();
            let line = match self.state.macros().next_replay_line() {
                Some(replayed) => {
                    if show_prompt {
                        writeln!(out, "{PROMPT}{replayed}")?;
                    }
                    replayed
                }
                None => {
                    if show_prompt {
                        write!(out, "{PROMPT}")?;
                        out.flush()?;
                    }
                    match lines.next() {
                        Some(line) => line?,
                        None => break,
                    }
                }
            };

            executed += 1;
            if self.execute_line(&line, out)? == LineOutcome::Quit {
                break;
            }
        }

        out.flush()?;
        Ok(executed)
    }

    /// Candidates for the word being typed at the end of `line`.
    ///
    /// The first word completes to command names; later words use the
    /// command's own completion list.
    pub fn completions(&self, line: &str) -> Vec<String> {
        let line = line.trim_start();
        let completing_first_word = !line.contains(char::is_whitespace);
        let (cmd, word) = if completing_first_word {
            match Command::create(CommandKind::Help) {
                Ok(help) => (help, line),
                Err(_) => return Vec::new(),
            }
        } else {
            match parse_user_input(line) {
                Ok(Some((cmd, _))) => {
                    let word = if line.ends_with(char::is_whitespace) {
                        ""
                    } else {
                        line.rsplit(char::is_whitespace).next().unwrap_or("")
                    };
                    (cmd, word)
                }
                _ => return Vec::new(),
            }
        };

        self.dispatcher
            .completions(&cmd, &self.state)
            .into_iter()
            .filter(|candidate| candidate.starts_with(word))
            .collect()
    }

    fn write_output<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError> {
        for line in self.state.take_output() {
            match line {
                OutputLine::Info(text) => writeln!(out, "{text}")?,
                OutputLine::Error(text) => writeln!(out, "error: {text}")?,
            }
        }
        Ok(())
    }

    fn write_observer_record<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError> {
        if let Some(record) = self.state.last_output() {
            writeln!(out, "{}", serde_json::to_string(record)?)?;
        }
        Ok(())
    }

    fn show_notifications<W: Write>(&mut self, out: &mut W) -> Result<(), ConsoleError> {
        for mut push in self.state.take_notifications() {
            push.run_on_client(&mut self.state);
            self.write_output(out)?;
        }
        Ok(())
    }
}
