//! The closed numeric namespace of command kinds.
//!
//! Every command on the wire starts with one of these ids. Do NOT modify
//! existing values: debuggers and proxies are upgraded independently, and the
//! id is the only thing an old peer and a new peer are guaranteed to share.
//! New kinds are appended; retired kinds keep their id reserved.
//!
//! ```text
//! 1–27        interactive commands issued by the client
//! 1000–1004   meta/session commands
//! 10000+      unsolicited proxy -> client pushes
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// First id of the proxy -> client push range.
pub const SERVER_PUSH_BASE: i32 = 10_000;

/// Which side originates a command kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Issued by the debugger front-end, executed by the proxy.
    ClientToServer,
    /// Pushed by the proxy without being asked.
    ServerToClient,
}

// ── Kind codes ────────────────────────────────────────────────────────────────

/// All command kinds defined by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum CommandKind {
    // Interactive (1–27)
    Abort = 1,
    Break = 2,
    Continue = 3,
    Down = 4,
    Exception = 5,
    Frame = 6,
    Global = 7,
    Help = 8,
    Info = 9,
    /// Retired. The id stays reserved and has no constructor.
    JumpUnused = 10,
    Constant = 11,
    List = 12,
    Machine = 13,
    Next = 14,
    Out = 15,
    Print = 16,
    Quit = 17,
    Run = 18,
    Step = 19,
    Thread = 20,
    Up = 21,
    Variable = 22,
    Where = 23,
    Extended = 24,
    User = 25,
    Zend = 26,
    Complete = 27,
    // Meta/session (1000–1004)
    Eval = 1000,
    Shell = 1001,
    Macro = 1002,
    Config = 1003,
    Instrument = 1004,
    // Proxy -> client (10000+)
    Interrupt = 10000,
    Signal = 10001,
}

impl TryFrom<i32> for CommandKind {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, ()> {
        match value {
            1 => Ok(CommandKind::Abort),
            2 => Ok(CommandKind::Break),
            3 => Ok(CommandKind::Continue),
            4 => Ok(CommandKind::Down),
            5 => Ok(CommandKind::Exception),
            6 => Ok(CommandKind::Frame),
            7 => Ok(CommandKind::Global),
            8 => Ok(CommandKind::Help),
            9 => Ok(CommandKind::Info),
            10 => Ok(CommandKind::JumpUnused),
            11 => Ok(CommandKind::Constant),
            12 => Ok(CommandKind::List),
            13 => Ok(CommandKind::Machine),
            14 => Ok(CommandKind::Next),
            15 => Ok(CommandKind::Out),
            16 => Ok(CommandKind::Print),
            17 => Ok(CommandKind::Quit),
            18 => Ok(CommandKind::Run),
            19 => Ok(CommandKind::Step),
            20 => Ok(CommandKind::Thread),
            21 => Ok(CommandKind::Up),
            22 => Ok(CommandKind::Variable),
            23 => Ok(CommandKind::Where),
            24 => Ok(CommandKind::Extended),
            25 => Ok(CommandKind::User),
            26 => Ok(CommandKind::Zend),
            27 => Ok(CommandKind::Complete),
            1000 => Ok(CommandKind::Eval),
            1001 => Ok(CommandKind::Shell),
            1002 => Ok(CommandKind::Macro),
            1003 => Ok(CommandKind::Config),
            1004 => Ok(CommandKind::Instrument),
            10000 => Ok(CommandKind::Interrupt),
            10001 => Ok(CommandKind::Signal),
            _ => Err(()),
        }
    }
}

impl CommandKind {
    /// Every kind, in id order. Includes the reserved [`CommandKind::JumpUnused`].
    pub const ALL: [CommandKind; 34] = [
        CommandKind::Abort,
        CommandKind::Break,
        CommandKind::Continue,
        CommandKind::Down,
        CommandKind::Exception,
        CommandKind::Frame,
        CommandKind::Global,
        CommandKind::Help,
        CommandKind::Info,
        CommandKind::JumpUnused,
        CommandKind::Constant,
        CommandKind::List,
        CommandKind::Machine,
        CommandKind::Next,
        CommandKind::Out,
        CommandKind::Print,
        CommandKind::Quit,
        CommandKind::Run,
        CommandKind::Step,
        CommandKind::Thread,
        CommandKind::Up,
        CommandKind::Variable,
        CommandKind::Where,
        CommandKind::Extended,
        CommandKind::User,
        CommandKind::Zend,
        CommandKind::Complete,
        CommandKind::Eval,
        CommandKind::Shell,
        CommandKind::Macro,
        CommandKind::Config,
        CommandKind::Instrument,
        CommandKind::Interrupt,
        CommandKind::Signal,
    ];

    /// The numeric id written on the wire.
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Which side is allowed to originate this kind.
    pub fn direction(self) -> Direction {
        if self.id() >= SERVER_PUSH_BASE {
            Direction::ServerToClient
        } else {
            Direction::ClientToServer
        }
    }

    /// Returns `true` for proxy -> client pushes.
    pub fn is_server_push(self) -> bool {
        self.direction() == Direction::ServerToClient
    }

    /// Returns `true` if a user may type this command at the client prompt.
    pub fn is_user_command(self) -> bool {
        !self.is_server_push() && self != CommandKind::JumpUnused
    }

    /// Lower-case command name as typed at the prompt.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Abort => "abort",
            CommandKind::Break => "break",
            CommandKind::Continue => "continue",
            CommandKind::Down => "down",
            CommandKind::Exception => "exception",
            CommandKind::Frame => "frame",
            CommandKind::Global => "global",
            CommandKind::Help => "help",
            CommandKind::Info => "info",
            CommandKind::JumpUnused => "jump",
            CommandKind::Constant => "konstant",
            CommandKind::List => "list",
            CommandKind::Machine => "machine",
            CommandKind::Next => "next",
            CommandKind::Out => "out",
            CommandKind::Print => "print",
            CommandKind::Quit => "quit",
            CommandKind::Run => "run",
            CommandKind::Step => "step",
            CommandKind::Thread => "thread",
            CommandKind::Up => "up",
            CommandKind::Variable => "variable",
            CommandKind::Where => "where",
            CommandKind::Extended => "x",
            CommandKind::User => "y",
            CommandKind::Zend => "zend",
            CommandKind::Complete => "complete",
            CommandKind::Eval => "eval",
            CommandKind::Shell => "shell",
            CommandKind::Macro => "macro",
            CommandKind::Config => "set",
            CommandKind::Instrument => "instrument",
            CommandKind::Interrupt => "interrupt",
            CommandKind::Signal => "signal",
        }
    }

    /// Resolves a prompt token (full name, one-letter abbreviation, or sigil)
    /// to a user command kind.
    ///
    /// Push kinds and the reserved id are never returned.
    pub fn from_user_token(token: &str) -> Option<CommandKind> {
        let kind = match token.to_ascii_lowercase().as_str() {
            "a" | "abort" => CommandKind::Abort,
            "b" | "break" => CommandKind::Break,
            "c" | "continue" => CommandKind::Continue,
            "d" | "down" => CommandKind::Down,
            "e" | "exception" => CommandKind::Exception,
            "f" | "frame" => CommandKind::Frame,
            "g" | "global" => CommandKind::Global,
            "h" | "?" | "help" => CommandKind::Help,
            "i" | "info" => CommandKind::Info,
            "k" | "konstant" | "constant" => CommandKind::Constant,
            "l" | "list" => CommandKind::List,
            "m" | "machine" => CommandKind::Machine,
            "n" | "next" => CommandKind::Next,
            "o" | "out" => CommandKind::Out,
            "p" | "=" | "print" => CommandKind::Print,
            "q" | "quit" => CommandKind::Quit,
            "r" | "run" => CommandKind::Run,
            "s" | "step" => CommandKind::Step,
            "t" | "thread" => CommandKind::Thread,
            "u" | "up" => CommandKind::Up,
            "v" | "variable" => CommandKind::Variable,
            "w" | "where" => CommandKind::Where,
            "x" | "extended" => CommandKind::Extended,
            "y" | "user" => CommandKind::User,
            "z" | "zend" => CommandKind::Zend,
            "complete" => CommandKind::Complete,
            "@" | "eval" => CommandKind::Eval,
            "!" | "shell" => CommandKind::Shell,
            "&" | "macro" => CommandKind::Macro,
            "set" | "config" => CommandKind::Config,
            "instrument" => CommandKind::Instrument,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}
