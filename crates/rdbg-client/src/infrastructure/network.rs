//! TCP connection from the console to the proxy.
//!
//! The connection is opened with tokio so the connect timeout is a plain
//! `tokio::time::timeout`, then handed back to the synchronous world as a
//! blocking `std::net::TcpStream`: the core [`rdbg_core::ClientDispatcher`]
//! reads and writes it directly.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info};

use crate::infrastructure::config::ServerConfig;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    /// The host name did not resolve to any address.
    #[error("could not resolve {host}:{port}")]
    Resolve { host: String, port: u16 },
    /// TCP connection to the proxy failed.
    #[error("failed to connect to proxy at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The proxy did not accept the connection in time.
    #[error("timed out connecting to proxy at {addr}")]
    Timeout { addr: SocketAddr },
    /// An I/O error while resolving or preparing the connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connects to the proxy named in `config`, trying each resolved address.
///
/// # Errors
///
/// The error for the last address tried, or
/// [`ClientNetworkError::Resolve`] if there was none.
pub async fn connect(config: &ServerConfig) -> Result<std::net::TcpStream, ClientNetworkError> {
    let mut last_error = ClientNetworkError::Resolve {
        host: config.host.clone(),
        port: config.port,
    };

    for addr in lookup_host((config.host.as_str(), config.port)).await? {
        debug!("connecting to {addr}");
        match tokio::time::timeout(config.connect_timeout(), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                info!("connected to proxy at {addr}");
                let stream = stream.into_std()?;
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Ok(Err(source)) => last_error = ClientNetworkError::ConnectFailed { addr, source },
            Err(_elapsed) => last_error = ClientNetworkError::Timeout { addr },
        }
    }

    Err(last_error)
}
