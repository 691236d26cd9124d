//! A simulated program for the proxy to debug.
//!
//! The program is a straight run of numbered lines in one source file. It
//! has a fixed call stack, a set of global variables, and lines that throw
//! exceptions. That is enough to exercise every command: breakpoints stop
//! it, flow commands move the current line, and inspection commands read
//! its state.

use std::collections::{BTreeMap, BTreeSet};
use std::process;

use rdbg_core::command::InterruptReason;
use rdbg_core::{CommandKind, DebugTarget, FlowMode, FrameMotion};
use tracing::{debug, info};

use crate::application::session::{ProgramControl, Stop};
use crate::infrastructure::config::{ProgramConfig, ThrowSite};

/// Functions `complete` and `info` know about besides the globals.
const BUILTIN_FUNCTIONS: [&str; 10] = [
    "array_keys",
    "array_map",
    "count",
    "explode",
    "implode",
    "json_encode",
    "print_r",
    "strlen",
    "strtolower",
    "var_dump",
];

const BUILTIN_CONSTANTS: [(&str, &str); 4] = [
    ("E_ALL", "32767"),
    ("PHP_EOL", "\"\\n\""),
    ("PHP_INT_MAX", "9223372036854775807"),
    ("PHP_VERSION", "\"8.3.0\""),
];

/// What the program does the next time it is advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Resume { mode: FlowMode, count: i32 },
    Restart,
}

#[derive(Debug)]
pub struct SimulatedProgram {
    config: ProgramConfig,
    source: Vec<String>,
    /// `None` once execution has run past `last_line`.
    line: Option<u32>,
    /// Index into the call stack, 0 being the innermost frame.
    selected_frame: usize,
    breakpoints: BTreeSet<u32>,
    exception_breaks: BTreeSet<String>,
    instrument_points: BTreeSet<u32>,
    globals: BTreeMap<String, String>,
    allow_shell: bool,
    pending: Option<Pending>,
    /// Exception the program is paused on; it propagates on the next run.
    thrown: Option<String>,
    detached: bool,
}

impl SimulatedProgram {
    /// Creates a program paused at its entry line.
    pub fn new(config: ProgramConfig, allow_shell: bool) -> Self {
        Self {
            line: Some(config.entry_line),
            globals: config.globals.clone(),
            config,
            source: Vec::new(),
            selected_frame: 0,
            breakpoints: BTreeSet::new(),
            exception_breaks: BTreeSet::new(),
            instrument_points: BTreeSet::new(),
            allow_shell,
            pending: None,
            thrown: None,
            detached: false,
        }
    }

    /// Source text shown by `list`; line `n` is `source[n - 1]`.
    pub fn with_source(mut self, source: Vec<String>) -> Self {
        self.source = source;
        self
    }

    pub fn current_line(&self) -> Option<u32> {
        self.line
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.breakpoints.iter().copied()
    }

    fn location_of(&self, line: u32) -> String {
        format!("{}:{line}", self.config.file)
    }

    fn not_running() -> String {
        "the program is not running; use `run` to start it again".to_string()
    }

    /// Parses `file:line` or `line` against the program's file.
    fn parse_line(&self, location: &str) -> Result<u32, String> {
        let (file, line) = match location.rsplit_once(':') {
            Some((file, line)) => (file, line),
            None => (self.config.file.as_str(), location),
        };
        if file != self.config.file {
            return Err(format!("no such file \"{file}\" in this program"));
        }
        let line: u32 = line
            .trim()
            .parse()
            .map_err(|_| format!("\"{location}\" is not a file:line location"))?;
        if !(self.config.entry_line..=self.config.last_line).contains(&line) {
            return Err(format!(
                "line {line} is outside {}:{}-{}",
                self.config.file, self.config.entry_line, self.config.last_line
            ));
        }
        Ok(line)
    }

    fn throw_at(&self, line: u32) -> Option<&ThrowSite> {
        self.config.throws.iter().find(|t| t.line == line)
    }

    /// Frame `index` counted from the innermost call.
    fn describe_frame(&self, index: usize) -> Option<String> {
        let stack = &self.config.call_stack;
        let name = stack.get(stack.len().checked_sub(index + 1)?)?;
        let line = self.line.map_or_else(|| "?".to_string(), |l| l.to_string());
        Some(format!("#{index}  {name} at {}:{line}", self.config.file))
    }

    /// Runs line by line from the line after the current one, stopping where
    /// `stops_at` says so or at an exception being watched.
    fn run_until(&mut self, mut stops_at: impl FnMut(u32) -> bool, signal: i32) -> Stop {
        let Some(mut line) = self.line else {
            return Stop::new(InterruptReason::RequestEnded, "").with_message(Self::not_running());
        };
        if let Some(class) = self.thrown.take() {
            self.line = None;
            return Stop::new(InterruptReason::RequestEnded, "")
                .with_message(format!("Fatal error: Uncaught {class}"));
        }
        loop {
            if let Some(site) = self.throw_at(line) {
                let class = site.class.clone();
                if self.exception_breaks.contains(&class) || self.exception_breaks.contains("*") {
                    self.line = Some(line);
                    let stop = Stop::new(InterruptReason::ExceptionThrown, self.location_of(line))
                        .with_message(format!("Uncaught {class}"));
                    self.thrown = Some(class);
                    return stop;
                }
                // Unwatched exceptions are caught by the program itself.
            }
            line += 1;
            if line > self.config.last_line {
                self.line = None;
                return Stop::new(InterruptReason::RequestEnded, "")
                    .with_message("Program exited normally.");
            }
            if signal != 0 {
                self.line = Some(line);
                return Stop::new(InterruptReason::HardBreakpoint, self.location_of(line))
                    .with_message(format!("Interrupted by signal {signal}."));
            }
            if self.breakpoints.contains(&line) {
                self.line = Some(line);
                return Stop::new(InterruptReason::BreakpointReached, self.location_of(line));
            }
            if stops_at(line) {
                self.line = Some(line);
                return Stop::new(InterruptReason::BreakpointReached, self.location_of(line));
            }
        }
    }

    fn list_source(&self, args: &[String]) -> Result<String, String> {
        let center = match args.first() {
            Some(location) => self.parse_line(location)?,
            None => self.line.unwrap_or(self.config.entry_line),
        };
        let first = center.saturating_sub(2).max(self.config.entry_line);
        let last = (center + 2).min(self.config.last_line);
        let lines: Vec<String> = (first..=last)
            .map(|n| {
                let marker = if Some(n) == self.line { "=>" } else { "  " };
                let text = self.source.get(n as usize - 1).map_or("", String::as_str);
                format!("{marker}{n:>5}  {text}")
            })
            .collect();
        Ok(lines.join("\n"))
    }

    fn list_globals(&self, names: &[String]) -> Result<String, String> {
        if let Some(name) = names.first() {
            return self
                .globals
                .get(name)
                .map(|value| format!("{name} = {value}"))
                .ok_or_else(|| format!("{name} is not defined"));
        }
        if self.globals.is_empty() {
            return Ok("(no variables)".to_string());
        }
        let lines: Vec<String> = self
            .globals
            .iter()
            .map(|(name, value)| format!("{name} = {value}"))
            .collect();
        Ok(lines.join("\n"))
    }

    fn list_constants(&self, prefix: Option<&String>) -> String {
        BUILTIN_CONSTANTS
            .iter()
            .filter(|(name, _)| prefix.map_or(true, |p| name.starts_with(p.as_str())))
            .map(|(name, value)| format!("{name} = {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn stack_trace(&self) -> String {
        (0..self.config.call_stack.len())
            .filter_map(|i| {
                let marker = if i == self.selected_frame { "*" } else { " " };
                self.describe_frame(i).map(|frame| format!("{marker}{frame}"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn describe_symbol(&self, args: &[String]) -> Result<String, String> {
        let symbol = args
            .iter()
            .find(|a| !matches!(a.as_str(), "class" | "function" | "constant"))
            .ok_or_else(|| "info needs a symbol name".to_string())?;
        if BUILTIN_FUNCTIONS.contains(&symbol.as_str()) {
            return Ok(format!("function {symbol}(...)  [builtin]"));
        }
        if let Some((name, value)) = BUILTIN_CONSTANTS.iter().find(|(name, _)| *name == symbol.as_str()) {
            return Ok(format!("constant {name} = {value}"));
        }
        if self.config.call_stack.iter().any(|f| f.trim_end_matches("()") == symbol.as_str()) {
            return Ok(format!("function {symbol}()  [{}]", self.config.file));
        }
        Err(format!("no class, function or constant named \"{symbol}\""))
    }

    fn instrument(&mut self, args: &[String]) -> Result<String, String> {
        match args.first().map(String::as_str) {
            Some("here") => {
                let line = self.line.ok_or_else(Self::not_running)?;
                self.instrument_points.insert(line);
                Ok(format!("instrumentation point added at {}", self.location_of(line)))
            }
            Some("clear") => {
                let removed = self.instrument_points.len();
                self.instrument_points.clear();
                Ok(format!("{removed} instrumentation point(s) cleared"))
            }
            None | Some("list") => {
                if self.instrument_points.is_empty() {
                    return Ok("(no instrumentation points)".to_string());
                }
                Ok(self
                    .instrument_points
                    .iter()
                    .map(|&l| self.location_of(l))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            Some(other) => Err(format!("unknown instrument action \"{other}\"")),
        }
    }

    fn evaluate_literal(&self, code: &str) -> Option<String> {
        let quoted = code.len() >= 2
            && ((code.starts_with('\'') && code.ends_with('\''))
                || (code.starts_with('"') && code.ends_with('"')));
        if quoted || code.parse::<f64>().is_ok() || matches!(code, "true" | "false" | "null") {
            return Some(code.to_string());
        }
        None
    }
}

impl DebugTarget for SimulatedProgram {
    fn resume(&mut self, mode: FlowMode, count: i32) {
        debug!(?mode, count, "resume requested");
        self.pending = Some(Pending::Resume { mode, count });
    }

    fn restart(&mut self, _args: &[String]) {
        self.pending = Some(Pending::Restart);
    }

    fn detach(&mut self) {
        info!("program detached");
        self.detached = true;
        self.pending = None;
    }

    fn set_breakpoint(&mut self, location: &str) -> Result<String, String> {
        let line = self.parse_line(location)?;
        if !self.breakpoints.insert(line) {
            return Err(format!("breakpoint already set at {}", self.location_of(line)));
        }
        Ok(format!(
            "Breakpoint {} set at {}",
            self.breakpoints.len(),
            self.location_of(line)
        ))
    }

    fn break_on_exception(&mut self, class_name: &str) -> Result<String, String> {
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return Err("exception needs a class name, or * for any".to_string());
        }
        self.exception_breaks.insert(class_name.to_string());
        Ok(format!("Breakpoint set on exception {class_name}"))
    }

    fn select_frame(&mut self, motion: FrameMotion) -> Result<String, String> {
        let depth = self.config.call_stack.len() as i64;
        let current = self.selected_frame as i64;
        let target = match motion {
            FrameMotion::Up(n) => current + i64::from(n),
            FrameMotion::Down(n) => current - i64::from(n),
            FrameMotion::To(n) => i64::from(n),
        };
        if !(0..depth).contains(&target) {
            return Err(format!("frame {target} is outside the stack (0..{})", depth - 1));
        }
        self.selected_frame = target as usize;
        self.describe_frame(self.selected_frame)
            .ok_or_else(|| format!("frame {target} is outside the stack"))
    }

    fn inspect(&mut self, kind: CommandKind, args: &[String]) -> Result<String, String> {
        match kind {
            CommandKind::Global | CommandKind::Variable => self.list_globals(args),
            CommandKind::Constant => Ok(self.list_constants(args.first())),
            CommandKind::Where => Ok(self.stack_trace()),
            CommandKind::List => self.list_source(args),
            CommandKind::Info => self.describe_symbol(args),
            CommandKind::Instrument => self.instrument(args),
            CommandKind::Thread => match args.first().map(String::as_str) {
                None | Some("list") => Ok("*1  main thread".to_string()),
                Some(mode @ ("normal" | "sticky" | "exclusive")) => {
                    Ok(format!("thread mode set to {mode}"))
                }
                Some(other) => Err(format!("unknown thread action \"{other}\"")),
            },
            CommandKind::Machine => match args.first().map(String::as_str) {
                None | Some("list") => Ok("*localhost  (attached)".to_string()),
                Some(_) => Err("this proxy debugs a single machine".to_string()),
            },
            other => Err(format!("{other} is not supported by this proxy")),
        }
    }

    fn evaluate(&mut self, code: &str) -> Result<String, String> {
        let code = code.trim().trim_end_matches(';').trim();
        if let Some((name, value)) = code.split_once('=') {
            let (name, value) = (name.trim(), value.trim());
            if name.starts_with('$') && !value.starts_with('=') {
                let value = self
                    .globals
                    .get(value)
                    .cloned()
                    .or_else(|| self.evaluate_literal(value))
                    .ok_or_else(|| format!("cannot evaluate \"{value}\""))?;
                self.globals.insert(name.to_string(), value.clone());
                return Ok(value);
            }
        }
        if let Some(value) = self.globals.get(code) {
            return Ok(value.clone());
        }
        if code.starts_with('$') {
            return Err(format!("Undefined variable: {code}"));
        }
        self.evaluate_literal(code)
            .ok_or_else(|| format!("cannot evaluate \"{code}\""))
    }

    fn complete(&mut self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .globals
            .keys()
            .map(String::as_str)
            .chain(BUILTIN_FUNCTIONS)
            .filter(|name| name.starts_with(prefix))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    fn run_extension(
        &mut self,
        kind: CommandKind,
        class: &str,
        args: &[String],
    ) -> Result<String, String> {
        match class {
            "echo" => Ok(args.join(" ")),
            "breakpoints" => Ok(self
                .breakpoints
                .iter()
                .map(|&l| self.location_of(l))
                .collect::<Vec<_>>()
                .join("\n")),
            _ => Err(format!("no {} command named \"{class}\"", kind.name())),
        }
    }

    fn run_shell(&mut self, args: &[String]) -> Result<String, String> {
        if !self.allow_shell {
            return Err("shell access is disabled on this proxy".to_string());
        }
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| "shell needs a command to run".to_string())?;
        let output = process::Command::new(program)
            .args(rest)
            .output()
            .map_err(|e| format!("failed to run {program}: {e}"))?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if output.status.success() {
            Ok(text)
        } else {
            Err(format!("{program} exited with {}\n{text}", output.status))
        }
    }
}

impl ProgramControl for SimulatedProgram {
    fn current_stop(&self) -> Stop {
        match self.line {
            Some(line) => Stop::new(InterruptReason::BreakpointReached, self.location_of(line)),
            None => Stop::new(InterruptReason::RequestEnded, ""),
        }
    }

    fn advance(&mut self, signal: i32) -> Stop {
        self.selected_frame = 0;
        match self.pending.take() {
            Some(Pending::Restart) => {
                self.line = Some(self.config.entry_line);
                self.thrown = None;
                self.globals = self.config.globals.clone();
                Stop::new(
                    InterruptReason::RequestStarted,
                    self.location_of(self.config.entry_line),
                )
            }
            Some(Pending::Resume { mode, count }) => {
                let mut steps = count.max(1);
                match mode {
                    FlowMode::Continue | FlowMode::Out => self.run_until(|_| false, signal),
                    FlowMode::Next | FlowMode::Step => self.run_until(
                        |_| {
                            steps -= 1;
                            steps == 0
                        },
                        signal,
                    ),
                }
            }
            None => self.current_stop(),
        }
    }

    fn is_detached(&self) -> bool {
        self.detached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> SimulatedProgram {
        let mut config = ProgramConfig {
            file: "app.php".to_string(),
            entry_line: 1,
            last_line: 10,
            call_stack: vec!["main()".to_string(), "handle()".to_string()],
            ..ProgramConfig::default()
        };
        config.globals.insert("$user".to_string(), "'alice'".to_string());
        config.throws.push(ThrowSite {
            line: 6,
            class: "RuntimeException".to_string(),
        });
        SimulatedProgram::new(config, false)
    }

    #[test]
    fn test_continue_stops_at_breakpoint() {
        // Arrange
        let mut p = program();
        p.set_breakpoint("app.php:4").expect("valid location");

        // Act
        p.resume(FlowMode::Continue, 1);
        let stop = p.advance(0);

        // Assert
        assert_eq!(stop.reason, InterruptReason::BreakpointReached);
        assert_eq!(stop.location, "app.php:4");
        assert_eq!(p.current_line(), Some(4));
    }

    #[test]
    fn test_next_with_count_moves_that_many_lines() {
        let mut p = program();

        p.resume(FlowMode::Next, 3);
        let stop = p.advance(0);

        assert_eq!(stop.location, "app.php:4");
    }

    #[test]
    fn test_watched_exception_stops_at_throwing_line() {
        // Arrange
        let mut p = program();
        p.break_on_exception("RuntimeException").expect("class name");
        p.resume(FlowMode::Continue, 1);

        // Act
        let stop = p.advance(0);

        // Assert
        assert_eq!(stop.reason, InterruptReason::ExceptionThrown);
        assert_eq!(stop.location, "app.php:6");
        assert_eq!(stop.message, "Uncaught RuntimeException");
        p.resume(FlowMode::Continue, 1);
        let next = p.advance(0);
        assert_eq!(next.reason, InterruptReason::RequestEnded);
        assert_eq!(next.message, "Fatal error: Uncaught RuntimeException");
    }

    #[test]
    fn test_continue_past_last_line_ends_request() {
        let mut p = program();

        p.resume(FlowMode::Continue, 1);
        let stop = p.advance(0);

        assert_eq!(stop.reason, InterruptReason::RequestEnded);
        assert_eq!(p.current_line(), None);
        assert!(p.evaluate("$user").is_ok(), "globals stay readable");
    }

    #[test]
    fn test_signal_interrupts_at_next_line() {
        let mut p = program();
        p.resume(FlowMode::Continue, 1);

        let stop = p.advance(2);

        assert_eq!(stop.reason, InterruptReason::HardBreakpoint);
        assert_eq!(stop.location, "app.php:2");
    }

    #[test]
    fn test_restart_returns_to_entry_line() {
        let mut p = program();
        p.resume(FlowMode::Continue, 1);
        p.advance(0);

        p.restart(&[]);
        let stop = p.advance(0);

        assert_eq!(stop.reason, InterruptReason::RequestStarted);
        assert_eq!(p.current_line(), Some(1));
    }

    #[test]
    fn test_breakpoint_outside_program_is_rejected() {
        let mut p = program();

        assert!(p.set_breakpoint("app.php:99").is_err());
        assert!(p.set_breakpoint("other.php:2").is_err());
        assert!(p.set_breakpoint("app.php:x").is_err());
        assert_eq!(p.breakpoints().count(), 0);
    }

    #[test]
    fn test_evaluate_reads_and_assigns_globals() {
        let mut p = program();

        assert_eq!(p.evaluate("$user;"), Ok("'alice'".to_string()));
        assert_eq!(p.evaluate("$n = 3"), Ok("3".to_string()));
        assert_eq!(p.evaluate("$n"), Ok("3".to_string()));
        assert!(p.evaluate("$missing").is_err());
        assert!(p.evaluate("launch_rockets()").is_err());
    }

    #[test]
    fn test_frames_move_within_stack() {
        let mut p = program();

        let up = p.select_frame(FrameMotion::Up(1));
        let too_far = p.select_frame(FrameMotion::Up(1));
        let down = p.select_frame(FrameMotion::Down(1));

        assert_eq!(up, Ok("#1  main() at app.php:1".to_string()));
        assert!(too_far.is_err());
        assert_eq!(down, Ok("#0  handle() at app.php:1".to_string()));
    }

    #[test]
    fn test_complete_merges_globals_and_builtins() {
        let mut p = program();

        assert_eq!(p.complete("str"), vec!["strlen", "strtolower"]);
        assert_eq!(p.complete("$u"), vec!["$user"]);
    }

    #[test]
    fn test_shell_is_refused_when_disabled() {
        let mut p = program();

        let result = p.run_shell(&["echo".to_string(), "hi".to_string()]);

        assert!(result.is_err());
    }

    #[test]
    fn test_list_marks_current_line() {
        let mut p = program().with_source((1..=10).map(|n| format!("line {n};")).collect());

        let listing = p.inspect(CommandKind::List, &[]).expect("listing");

        assert!(listing.starts_with("=>    1  line 1;"));
        assert_eq!(listing.lines().count(), 3);
    }
}
