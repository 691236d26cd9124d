//! Integration tests for the rdbg-core wire protocol.
//!
//! These pin the numeric kind ids, check that every constructible kind
//! survives encode/decode through the public API, and walk the two reference
//! scenarios: a `break file.php:42` round trip and an unknown kind id.

use rdbg_core::command::{InterruptReason, Reply};
use rdbg_core::protocol::wire::WireWriter;
use rdbg_core::{
    decode_command, encode_command, Command, CommandBody, CommandKind, FlowMode, MemoryChannel,
    ProtocolError, WireCodec,
};

fn roundtrip(cmd: &Command) -> Command {
    decode_command(&encode_command(cmd)).expect("decode must succeed")
}

#[test]
fn test_kind_ids_never_change() {
    let expected: [(CommandKind, i32); 34] = [
        (CommandKind::Abort, 1),
        (CommandKind::Break, 2),
        (CommandKind::Continue, 3),
        (CommandKind::Down, 4),
        (CommandKind::Exception, 5),
        (CommandKind::Frame, 6),
        (CommandKind::Global, 7),
        (CommandKind::Help, 8),
        (CommandKind::Info, 9),
        (CommandKind::JumpUnused, 10),
        (CommandKind::Constant, 11),
        (CommandKind::List, 12),
        (CommandKind::Machine, 13),
        (CommandKind::Next, 14),
        (CommandKind::Out, 15),
        (CommandKind::Print, 16),
        (CommandKind::Quit, 17),
        (CommandKind::Run, 18),
        (CommandKind::Step, 19),
        (CommandKind::Thread, 20),
        (CommandKind::Up, 21),
        (CommandKind::Variable, 22),
        (CommandKind::Where, 23),
        (CommandKind::Extended, 24),
        (CommandKind::User, 25),
        (CommandKind::Zend, 26),
        (CommandKind::Complete, 27),
        (CommandKind::Eval, 1000),
        (CommandKind::Shell, 1001),
        (CommandKind::Macro, 1002),
        (CommandKind::Config, 1003),
        (CommandKind::Instrument, 1004),
        (CommandKind::Interrupt, 10000),
        (CommandKind::Signal, 10001),
    ];

    for (kind, id) in expected {
        assert_eq!(kind.id(), id, "{kind:?} was renumbered");
        assert_eq!(CommandKind::try_from(id), Ok(kind));
    }
}

#[test]
fn test_every_constructible_kind_round_trips() {
    for kind in CommandKind::ALL {
        let Ok(mut cmd) = Command::create(kind) else {
            assert_eq!(kind, CommandKind::JumpUnused);
            continue;
        };
        cmd.set_version(3);
        cmd.set_qualifier(format!("q{}", kind.id()));

        let decoded = roundtrip(&cmd);

        assert_eq!(decoded.kind(), kind);
        assert_eq!(decoded.version(), 3);
        assert_eq!(decoded.qualifier(), cmd.qualifier());
        assert_eq!(decoded.payload_bytes(), cmd.payload_bytes());
    }
}

#[test]
fn test_filled_payloads_round_trip() {
    let commands = [
        Command::flow(FlowMode::Step, 4),
        Command::extended("tick", &["5".to_string(), "fast".to_string()]),
        Command::print("$user->name"),
        Command::interrupt(
            InterruptReason::ExceptionThrown,
            "lib/db.php:88",
            "Uncaught PDOException",
        ),
        Command::signal(2),
    ];

    for cmd in &commands {
        assert_eq!(&roundtrip(cmd), cmd);
    }
}

#[test]
fn test_break_file_php_42_scenario() {
    // Arrange
    let cmd = Command::breakpoint("file.php:42");

    // Act
    let bytes = encode_command(&cmd);
    let decoded = decode_command(&bytes).expect("decode must succeed");

    // Assert
    assert_eq!(&bytes[0..4], &2i32.to_be_bytes());
    assert_eq!(&bytes[4..8], &1i32.to_be_bytes());
    assert_eq!(&bytes[8..12], &0u32.to_be_bytes());
    assert_eq!(decoded.kind(), CommandKind::Break);
    assert_eq!(decoded.version(), 1);
    assert_eq!(decoded.qualifier(), "");
    match decoded.body() {
        CommandBody::Break(b) => {
            assert_eq!(b.location, "file.php:42");
            assert_eq!(b.reply, Reply::default());
        }
        other => panic!("unexpected body {other:?}"),
    }
}

#[test]
fn test_kind_99999_is_unknown_and_stream_stays_usable() {
    // Arrange
    let mut w = WireWriter::new();
    w.write_i32(99_999);
    w.write_i32(1);
    w.write_string("");
    w.write_string("payload from a newer peer");
    let body = w.into_bytes();
    let mut channel = MemoryChannel::new();
    channel.push_raw(&(body.len() as u32).to_be_bytes());
    channel.push_raw(&body);
    channel.push_frame(&Command::breakpoint("file.php:42"));
    let mut codec = WireCodec::new(channel);

    // Act
    let first = codec.recv();
    let second = codec.recv();

    // Assert
    assert_eq!(first, Err(ProtocolError::UnknownKind(99_999)));
    assert_eq!(second, Ok(Command::breakpoint("file.php:42")));
}

#[test]
fn test_malformed_interrupt_reason_yields_no_command() {
    let mut w = WireWriter::new();
    w.write_i32(CommandKind::Interrupt.id());
    w.write_i32(1);
    w.write_string("");
    w.write_i32(77);
    w.write_string("a.php:1");
    w.write_string("");

    let result = decode_command(&w.into_bytes());

    assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
}
