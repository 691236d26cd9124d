//! rdbg console entry point.
//!
//! Connects to the proxy, waits for the first stop, then hands stdin and
//! stdout to the [`Console`] on a blocking thread. Ctrl-C does not exit: it
//! raises signal 2, which the proxy collects with its next `Signal` poll to
//! interrupt a running program. Use `quit` (or end of input) to leave.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rdbg_client::application::console::Console;
use rdbg_client::infrastructure::{config::load_config, network};
use rdbg_core::{ClientDispatcher, ClientState, WireCodec};

/// Signal number reported for Ctrl-C.
const SIGINT: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rdbg.toml"));
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Logs go to stderr so they never interleave with console output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    let stream = network::connect(&config.server).await?;
    let codec = WireCodec::new(stream).with_max_frame_len(config.protocol.max_frame_bytes);
    let dispatcher = ClientDispatcher::new(codec, config.protocol.version);
    let state = ClientState::new(config.initial_options());

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let signal = state.signal_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt requested");
            signal.store(SIGINT, Ordering::SeqCst);
        }
    });

    let mut console = Console::new(dispatcher, state);
    let executed = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        console.attach(&mut stdout)?;
        console.run(stdin.lock(), &mut stdout)
    })
    .await??;

    info!("console finished after {executed} line(s)");
    Ok(())
}
