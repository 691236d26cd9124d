//! Integration tests for the console over a scripted proxy.
//!
//! The proxy's side of the conversation is queued on a [`MemoryChannel`]
//! before the console runs; typed input comes from an in-memory reader.

use std::io::Cursor;
use std::sync::atomic::Ordering;

use rdbg_client::application::console::{Console, ConsoleError, LineOutcome};
use rdbg_core::command::InterruptReason;
use rdbg_core::protocol::wire::WireWriter;
use rdbg_core::{
    decode_command, ClientDispatcher, ClientOptions, ClientState, Command, CommandBody,
    CommandKind, MemoryChannel, ProtocolError, WireCodec,
};
use serde_json::Value;

/// A proxy reply carrying `argument` and a successful `text`.
fn answered(kind: CommandKind, argument: &str, text: &str) -> Command {
    let mut w = WireWriter::new();
    w.write_i32(kind.id());
    w.write_i32(1);
    w.write_string("");
    w.write_string(argument);
    w.write_bool(true);
    w.write_string(text);
    decode_command(&w.into_bytes()).expect("well-formed reply")
}

fn session_started() -> Command {
    Command::interrupt(InterruptReason::SessionStarted, "app.php:1", "")
}

fn console_with(proxy: &[Command], options: ClientOptions) -> Console<MemoryChannel> {
    let codec = WireCodec::new(MemoryChannel::with_frames(proxy));
    Console::new(ClientDispatcher::new(codec, 7), ClientState::new(options))
}

fn sent(console: &Console<MemoryChannel>) -> Vec<Command> {
    console
        .dispatcher()
        .codec()
        .channel()
        .sent_commands()
        .expect("client writes well-formed frames")
}

fn run_script(console: &mut Console<MemoryChannel>, script: &str) -> (usize, String) {
    let mut out = Vec::new();
    console.attach(&mut out).expect("attach");
    let executed = console
        .run(Cursor::new(script.to_string()), &mut out)
        .expect("console run");
    (executed, String::from_utf8(out).expect("utf-8 output"))
}

#[test]
fn test_break_print_quit_session() {
    // Arrange
    let mut console = console_with(
        &[
            session_started(),
            answered(CommandKind::Break, "app.php:4", "Breakpoint 1 set at app.php:4"),
            answered(CommandKind::Print, "$user", "'alice'"),
        ],
        ClientOptions::default(),
    );

    // Act
    let (executed, output) = run_script(&mut console, "break app.php:4\n= $user\nquit\nnever run\n");

    // Assert
    assert_eq!(executed, 3);
    assert!(output.starts_with("Debugging session started. At app.php:1.\n"));
    assert!(output.contains("rdbg> Breakpoint 1 set at app.php:4\n"));
    assert!(output.contains("rdbg> 'alice'\n"));
    assert!(console.state().quit_requested());

    let out = sent(&console);
    let kinds: Vec<CommandKind> = out.iter().map(Command::kind).collect();
    assert_eq!(kinds, vec![CommandKind::Break, CommandKind::Print, CommandKind::Quit]);
    assert!(out.iter().all(|c| c.version() == 7));
}

#[test]
fn test_continue_answers_signal_poll_with_pending_signal() {
    // Arrange
    let mut console = console_with(
        &[
            session_started(),
            Command::signal(0),
            Command::interrupt(
                InterruptReason::HardBreakpoint,
                "app.php:2",
                "Interrupted by signal 2.",
            ),
        ],
        ClientOptions::default(),
    );
    console.state().signal_handle().store(2, Ordering::SeqCst);

    // Act
    let (_, output) = run_script(&mut console, "continue\n");

    // Assert
    assert!(output.contains("Hard breakpoint reached. At app.php:2.\nInterrupted by signal 2.\n"));
    let out = sent(&console);
    assert!(out[0].is(CommandKind::Continue));
    match out[1].body() {
        CommandBody::Signal(s) => assert_eq!(s.signal, 2),
        other => panic!("expected the signal answer, got {other:?}"),
    }
}

#[test]
fn test_api_mode_prints_one_json_record_per_command() {
    // Arrange
    let options = ClientOptions {
        api_mode: true,
        ..ClientOptions::default()
    };
    let mut console = console_with(
        &[
            session_started(),
            answered(CommandKind::Break, "app.php:4", "Breakpoint 1 set at app.php:4"),
        ],
        options,
    );

    // Act
    let (_, output) = run_script(&mut console, "break app.php:4\n");

    // Assert
    assert!(!output.contains("rdbg> "), "no prompt in API mode");
    let records: Vec<Value> = output
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["kind"], "Interrupt");
    assert_eq!(records[1]["kind"], "Break");
    assert_eq!(records[1]["value"]["location"], "app.php:4");
    assert_eq!(records[1]["value"]["reply"]["ok"], true);
}

#[test]
fn test_recorded_macro_replays_its_lines() {
    // Arrange
    let mut console = console_with(
        &[
            session_started(),
            answered(CommandKind::Break, "app.php:4", "Breakpoint 1 set at app.php:4"),
            answered(CommandKind::Break, "app.php:4", "breakpoint already set at app.php:4"),
        ],
        ClientOptions::default(),
    );

    // Act
    let (executed, output) = run_script(
        &mut console,
        "macro start\nbreak app.php:4\nmacro end\nmacro replay 0\n",
    );

    // Assert
    assert_eq!(executed, 5);
    assert!(output.contains("rdbg> break app.php:4\n"), "replayed line is echoed");
    let kinds: Vec<CommandKind> = sent(&console).iter().map(Command::kind).collect();
    assert_eq!(kinds, vec![CommandKind::Break, CommandKind::Break]);
}

#[test]
fn test_help_and_unknown_commands_stay_local() {
    let mut console = console_with(&[session_started()], ClientOptions::default());

    let (executed, output) = run_script(&mut console, "break ?\nfrobnicate\n");

    assert_eq!(executed, 2);
    assert!(output.contains("break <file>:<line>"));
    assert!(output.contains("unknown command \"frobnicate\""));
    assert!(sent(&console).is_empty());
}

#[test]
fn test_completions_for_names_and_arguments() {
    // Arrange
    let mut console = console_with(&[session_started()], ClientOptions::default());
    console.attach(&mut Vec::new()).expect("attach");

    // Act
    let names = console.completions("br");
    let files = console.completions("break ");

    // Assert
    assert_eq!(names, vec!["break"]);
    assert_eq!(files, vec!["app.php"]);
}

#[test]
fn test_proxy_hanging_up_mid_request_is_an_error() {
    let mut console = console_with(&[session_started()], ClientOptions::default());
    let mut out = Vec::new();
    console.attach(&mut out).expect("attach");

    let result = console.execute_line("break app.php:4", &mut out);

    assert!(matches!(
        result,
        Err(ConsoleError::Protocol(ProtocolError::Closed))
    ));
}

#[test]
fn test_blank_line_does_nothing() {
    let mut console = console_with(&[session_started()], ClientOptions::default());
    let mut out = Vec::new();

    let outcome = console.execute_line("   ", &mut out).expect("blank line");

    assert_eq!(outcome, LineOutcome::Continue);
    assert!(out.is_empty());
}
