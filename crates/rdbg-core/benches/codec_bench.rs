//! Criterion benchmarks for the rdbg binary codec.
//!
//! Measures encoding and decoding of representative commands, plus a full
//! send/recv through a [`WireCodec`] over an in-memory channel.
//!
//! Run with:
//! ```bash
//! cargo bench --package rdbg-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rdbg_core::command::InterruptReason;
use rdbg_core::{decode_command, encode_command, Command, FlowMode, MemoryChannel, WireCodec};

// ── Command fixtures ──────────────────────────────────────────────────────────

fn fixtures() -> Vec<(&'static str, Command)> {
    let long_listing: Vec<String> = (0..200).map(|i| format!("$var{i}")).collect();
    vec![
        ("Break", Command::breakpoint("src/controllers/UserController.php:142")),
        ("Step", Command::flow(FlowMode::Step, 1)),
        ("Eval", Command::eval("array_map(fn($u) => $u->id, $users)")),
        ("Extended(200 args)", Command::extended("dump", &long_listing)),
        (
            "Interrupt",
            Command::interrupt(
                InterruptReason::BreakpointReached,
                "src/controllers/UserController.php:142",
                "",
            ),
        ),
        ("Signal", Command::signal(0)),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_command");
    for (name, cmd) in fixtures() {
        group.bench_with_input(BenchmarkId::new("cmd", name), &cmd, |b, cmd| {
            b.iter(|| encode_command(black_box(cmd)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_command");
    for (name, cmd) in fixtures() {
        let bytes = encode_command(&cmd);
        group.bench_with_input(BenchmarkId::new("cmd", name), &bytes, |b, bytes| {
            b.iter(|| decode_command(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

/// Framed send followed by recv, the per-command cost on a live connection.
fn bench_codec_round_trip(c: &mut Criterion) {
    let cmd = Command::breakpoint("file.php:42");
    c.bench_function("codec_send_recv/Break", |b| {
        b.iter(|| {
            let mut sender = WireCodec::new(MemoryChannel::new());
            sender.send(black_box(&cmd)).expect("send must succeed");
            let mut inbound = MemoryChannel::new();
            inbound.push_raw(sender.channel().written());
            WireCodec::new(inbound).recv().expect("recv must succeed")
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_codec_round_trip);
criterion_main!(benches);
