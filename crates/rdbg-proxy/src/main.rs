//! rdbg proxy entry point.
//!
//! ```text
//! main()
//!  └─ load_config(argv[1])   -- defaults when absent
//!  └─ ProxyListener::bind()
//!  └─ serve()                -- one blocking DebugSession per connection
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rdbg_proxy::infrastructure::config::load_config;
use rdbg_proxy::infrastructure::network::ProxyListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rdbg-proxy.toml"));
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.proxy.log_level)),
        )
        .init();

    info!("rdbg proxy starting with {}", config_path.display());

    let source = match std::fs::read_to_string(&config.program.file) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(e) => {
            warn!("no source for {}: {e}; `list` will show line numbers only", config.program.file);
            Vec::new()
        }
    };

    let listener = ProxyListener::bind(config).await?.with_source(source);

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!("rdbg proxy ready.  Press Ctrl-C to exit.");
    let sessions = listener.serve(running).await?;

    info!("rdbg proxy stopped after {} session(s)", sessions.len());
    Ok(())
}
