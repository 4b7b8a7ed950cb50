use crdb::error::ErrorKind;
use crdb::tunnel::{PortForwardTunnel, TunnelHandle};
use crdb_telemetry::init_test_tracing;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use crate::support::mocks::{TcpConnector, UnreachableConnector};
use crate::support::net::{
    free_port, port_is_free, round_trip, spawn_closing_server, spawn_echo_server,
};

mod support;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread")]
async fn tunnel_forwards_bytes_unmodified() {
    init_test_tracing();
    // Arrange
    let remote = spawn_echo_server().await;
    let local_port = free_port();
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(
        local_port,
        Arc::new(TcpConnector::new(remote)),
    ));
    tunnel.wait_ready(READY_TIMEOUT).await.unwrap();

    // Act
    let payload: Vec<u8> = (0..=255u8).cycle().take(16 * 1024).collect();
    let received = round_trip(local_port, &payload).await;

    // Assert
    assert_eq!(received, payload);
    tunnel.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn tunnel_serves_several_connections() {
    init_test_tracing();
    let remote = spawn_echo_server().await;
    let local_port = free_port();
    let connector = Arc::new(TcpConnector::new(remote));
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(local_port, connector.clone()));
    tunnel.wait_ready(READY_TIMEOUT).await.unwrap();

    for message in [&b"SELECT 1"[..], b"SELECT 2", b"SELECT 3"] {
        assert_eq!(round_trip(local_port, message).await, message);
    }

    assert_eq!(connector.connects(), 3);
    tunnel.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn readiness_precedes_the_first_forwarded_connection() {
    init_test_tracing();
    let remote = spawn_echo_server().await;
    let local_port = free_port();
    let connector = Arc::new(TcpConnector::new(remote));
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(local_port, connector.clone()));

    tunnel.wait_ready(READY_TIMEOUT).await.unwrap();

    assert!(tunnel.is_ready());
    assert_eq!(connector.connects(), 0);
    // Once ready, the port accepts immediately.
    TcpStream::connect((Ipv4Addr::LOCALHOST, local_port))
        .await
        .unwrap();
    tunnel.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn stopping_twice_is_harmless() {
    init_test_tracing();
    let remote = spawn_echo_server().await;
    let local_port = free_port();
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(
        local_port,
        Arc::new(TcpConnector::new(remote)),
    ));
    tunnel.wait_ready(READY_TIMEOUT).await.unwrap();

    tunnel.stop();
    tunnel.stop();

    assert!(tunnel.is_stopped());
    tunnel.close().await.unwrap();
    assert!(port_is_free(local_port).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn stopping_before_readiness_is_harmless() {
    init_test_tracing();
    let local_port = free_port();
    let tunnel = TunnelHandle::start(PortForwardTunnel::new(
        local_port,
        Arc::new(UnreachableConnector),
    ));

    tunnel.stop();

    tunnel.close().await.unwrap();
    assert!(port_is_free(local_port).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn occupied_port_fails_with_tunnel_start_error() {
    init_test_tracing();
    // Arrange
    let blocker = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let local_port = blocker.local_addr().unwrap().port();

    // Act
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(
        local_port,
        Arc::new(UnreachableConnector),
    ));
    let err = tunnel.wait_ready(READY_TIMEOUT).await.unwrap_err();

    // Assert
    assert_eq!(err.kind(), ErrorKind::TunnelStartError);
    assert!(!tunnel.is_ready());
    tunnel.stop();
    tunnel.stop();
    tunnel.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_remote_terminates_the_tunnel() {
    init_test_tracing();
    let local_port = free_port();
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(
        local_port,
        Arc::new(UnreachableConnector),
    ));
    tunnel.wait_ready(READY_TIMEOUT).await.unwrap();

    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, local_port))
        .await
        .unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(READY_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("local connection should be closed");
    assert!(matches!(read, Ok(0) | Err(_)));

    let err = tunnel.close().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteUnreachableError);
    assert!(port_is_free(local_port).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_closing_a_connection_keeps_the_tunnel_up() {
    init_test_tracing();
    let remote = spawn_closing_server().await;
    let local_port = free_port();
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(
        local_port,
        Arc::new(TcpConnector::new(remote)),
    ));
    tunnel.wait_ready(READY_TIMEOUT).await.unwrap();

    for _ in 0..2 {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, local_port))
            .await
            .unwrap();
        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(READY_TIMEOUT, stream.read(&mut buf))
            .await
            .expect("forwarded connection should be closed");
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    tunnel.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_closes_in_flight_connections() {
    init_test_tracing();
    let remote = spawn_echo_server().await;
    let local_port = free_port();
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(
        local_port,
        Arc::new(TcpConnector::new(remote)),
    ));
    tunnel.wait_ready(READY_TIMEOUT).await.unwrap();

    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, local_port))
        .await
        .unwrap();
    // Wait until the connection is forwarded.
    {
        use tokio::io::AsyncWriteExt;
        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
    }

    tunnel.close().await.unwrap();

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(READY_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("in-flight connection should be closed");
    assert!(matches!(read, Ok(0) | Err(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_the_handle_stops_the_tunnel() {
    init_test_tracing();
    let remote = spawn_echo_server().await;
    let local_port = free_port();
    let mut tunnel = TunnelHandle::start(PortForwardTunnel::new(
        local_port,
        Arc::new(TcpConnector::new(remote)),
    ));
    tunnel.wait_ready(READY_TIMEOUT).await.unwrap();

    drop(tunnel);

    let released = tokio::time::timeout(READY_TIMEOUT, async {
        while !port_is_free(local_port).await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok());
}
