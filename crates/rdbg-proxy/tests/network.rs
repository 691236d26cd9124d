//! End-to-end test of the proxy listener over a real loopback socket.

use std::net::TcpStream;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use rdbg_core::command::InterruptReason;
use rdbg_core::{Command, CommandBody, CommandKind, ProtocolError, WireCodec};
use rdbg_proxy::application::session::SessionEnd;
use rdbg_proxy::infrastructure::config::ProxyConfig;
use rdbg_proxy::infrastructure::network::{ProxyListener, ProxyNetworkError};

fn loopback_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.network.bind_address = "127.0.0.1".to_string();
    config.network.port = 0;
    config.program.file = "app.php".to_string();
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_connects_sets_breakpoint_and_quits() {
    // Arrange
    let listener = ProxyListener::bind(loopback_config()).await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let running = Arc::new(AtomicBool::new(true));
    let server = tokio::spawn(listener.serve(Arc::clone(&running)));

    // Act
    let conversation = tokio::task::spawn_blocking(move || {
        let stream = TcpStream::connect(addr).expect("connect");
        let mut codec = WireCodec::new(stream);
        let hello = codec.recv().expect("initial interrupt");
        codec.send(&Command::breakpoint("app.php:3")).expect("send break");
        let reply = codec.recv().expect("break reply");
        codec
            .send(&Command::create(CommandKind::Quit).unwrap())
            .expect("send quit");
        let after_quit = codec.recv();
        (hello, reply, after_quit)
    })
    .await
    .expect("client task");
    running.store(false, Ordering::Relaxed);
    let sessions = server.await.expect("server task").expect("serve");

    // Assert
    let (hello, reply, after_quit) = conversation;
    match hello.body() {
        CommandBody::Interrupt(i) => {
            assert_eq!(i.reason, InterruptReason::SessionStarted);
            assert_eq!(i.location, "app.php:1");
        }
        other => panic!("unexpected first frame {other:?}"),
    }
    match reply.body() {
        CommandBody::Break(b) => {
            assert!(b.reply.ok);
            assert_eq!(b.reply.text, "Breakpoint 1 set at app.php:3");
        }
        other => panic!("unexpected reply {other:?}"),
    }
    assert_eq!(after_quit, Err(ProtocolError::Closed));
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].end, SessionEnd::Detached);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_closes_a_session_whose_client_stays_idle() {
    // Arrange
    let listener = ProxyListener::bind(loopback_config()).await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let running = Arc::new(AtomicBool::new(true));
    let server = tokio::spawn(listener.serve(Arc::clone(&running)));
    let mut client = tokio::task::spawn_blocking(move || {
        let stream = TcpStream::connect(addr).expect("connect");
        let mut codec = WireCodec::new(stream);
        codec.recv().expect("initial interrupt");
        codec
    })
    .await
    .expect("client task");

    // Act
    running.store(false, Ordering::Relaxed);
    let sessions = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("serve returns after the grace period")
        .expect("server task")
        .expect("serve");
    let after_shutdown = tokio::task::spawn_blocking(move || client.recv())
        .await
        .expect("client task");

    // Assert
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].end, SessionEnd::Closed);
    assert_eq!(sessions[0].stops, 1);
    assert_eq!(after_shutdown, Err(ProtocolError::Closed));
}

#[tokio::test]
async fn test_bind_rejects_hostname_address() {
    let mut config = loopback_config();
    config.network.bind_address = "not-an-ip".to_string();

    let result = ProxyListener::bind(config).await;

    assert!(matches!(result, Err(ProxyNetworkError::InvalidAddress(_))));
}
