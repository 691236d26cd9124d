//! TCP listener for client connections.
//!
//! Accepting is async (tokio); serving a connection is not. The core
//! dispatchers are synchronous and own their channel exclusively, so each
//! accepted socket is converted back into a blocking `std::net::TcpStream`
//! and handed to [`tokio::task::spawn_blocking`], where a
//! [`DebugSession`] runs it to completion.
//!
//! The accept loop wakes up every [`ACCEPT_POLL`] to check the shared
//! `running` flag, so Ctrl-C stops new connections promptly. Each wake-up
//! also collects the sessions that have ended. On shutdown, a session still
//! open after [`SHUTDOWN_GRACE`] has its socket shut down, which ends its
//! blocking read and lets the task finish.

use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use rdbg_core::{ServerDispatcher, WireCodec};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::application::session::{DebugSession, SessionSummary};
use crate::infrastructure::config::ProxyConfig;
use crate::infrastructure::program::SimulatedProgram;

/// How often the accept loop re-checks the shutdown flag.
pub const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// How long shutdown waits for open sessions before closing their sockets.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A running session task and a handle on its socket.
struct ActiveSession {
    peer: SocketAddr,
    task: JoinHandle<SessionSummary>,
    socket: TcpStream,
}

/// Logs how a session task ended and keeps its summary.
fn collect(result: Result<SessionSummary, JoinError>, peer: SocketAddr, finished: &mut Vec<SessionSummary>) {
    match result {
        Ok(summary) => {
            info!(session = %summary.id, %peer, end = ?summary.end, commands = summary.commands, "session collected");
            finished.push(summary);
        }
        Err(e) => error!(%peer, "session task failed: {e}"),
    }
}

/// Errors that can occur in the proxy network layer.
#[derive(Debug, Error)]
pub enum ProxyNetworkError {
    /// The bind address in the configuration is not an IP address.
    #[error("invalid bind address \"{0}\"")]
    InvalidAddress(String),
    /// The listening socket could not be bound.
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error on the listener or while preparing a connection.
    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound listener plus everything a session needs to start.
pub struct ProxyListener {
    listener: TcpListener,
    config: ProxyConfig,
    source: Vec<String>,
}

impl ProxyListener {
    /// Binds to `[network] bind_address:port`.
    ///
    /// # Errors
    ///
    /// [`ProxyNetworkError::InvalidAddress`] or
    /// [`ProxyNetworkError::BindFailed`].
    pub async fn bind(config: ProxyConfig) -> Result<Self, ProxyNetworkError> {
        let ip: std::net::IpAddr = config
            .network
            .bind_address
            .parse()
            .map_err(|_| ProxyNetworkError::InvalidAddress(config.network.bind_address.clone()))?;
        let addr = SocketAddr::new(ip, config.network.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ProxyNetworkError::BindFailed { addr, source })?;
        info!("proxy listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            config,
            source: Vec::new(),
        })
    }

    /// Source lines given to every session's program for `list`.
    pub fn with_source(mut self, source: Vec<String>) -> Self {
        self.source = source;
        self
    }

    /// The bound address; useful when the configured port is 0.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, ProxyNetworkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `running` is cleared.
    ///
    /// Returns the summary of every session served. Sessions that ended while
    /// the listener was running are collected as it goes; the rest are given
    /// [`SHUTDOWN_GRACE`] and then disconnected.
    ///
    /// # Errors
    ///
    /// Only a failure of the listener itself; per-connection failures are
    /// logged and end that connection.
    pub async fn serve(
        self,
        running: Arc<AtomicBool>,
    ) -> Result<Vec<SessionSummary>, ProxyNetworkError> {
        let mut sessions: Vec<ActiveSession> = Vec::new();
        let mut finished = Vec::new();

        while running.load(Ordering::Relaxed) {
            let (ended, open): (Vec<_>, Vec<_>) =
                sessions.into_iter().partition(|s| s.task.is_finished());
            sessions = open;
            for session in ended {
                collect(session.task.await, session.peer, &mut finished);
            }

            let (stream, peer) = match tokio::time::timeout(ACCEPT_POLL, self.listener.accept()).await {
                Err(_elapsed) => continue,
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            info!("client connected from {peer}");

            let prepared = stream.into_std().and_then(|s| {
                s.set_nonblocking(false)?;
                s.set_nodelay(true)?;
                let socket = s.try_clone()?;
                Ok((s, socket))
            });
            let (stream, socket) = match prepared {
                Ok(pair) => pair,
                Err(e) => {
                    error!("could not prepare connection from {peer}: {e}");
                    continue;
                }
            };

            let program = SimulatedProgram::new(
                self.config.program.clone(),
                self.config.proxy.allow_shell,
            )
            .with_source(self.source.clone());
            let max_frame = self.config.protocol.max_frame_bytes;

            let task = tokio::task::spawn_blocking(move || {
                let mut program = program;
                let codec = WireCodec::new(stream).with_max_frame_len(max_frame);
                let mut session = DebugSession::new(ServerDispatcher::new(codec));
                debug!(session = %session.id(), %peer, "session started");
                session.run(&mut program)
            });
            sessions.push(ActiveSession { peer, task, socket });
        }

        info!(open = sessions.len(), "proxy stopped accepting connections");
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        for mut session in sessions {
            let result = match tokio::time::timeout_at(deadline, &mut session.task).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    debug!(peer = %session.peer, "closing a session still open after the grace period");
                    if let Err(e) = session.socket.shutdown(Shutdown::Both) {
                        warn!(peer = %session.peer, "could not shut down session socket: {e}");
                    }
                    session.task.await
                }
            };
            collect(result, session.peer, &mut finished);
        }
        Ok(finished)
    }
}
