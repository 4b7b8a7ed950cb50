use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Returns a port that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("Failed to bind");
    listener.local_addr().expect("Failed to read address").port()
}

/// Spawns a server echoing back every byte it receives.
pub async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("Failed to bind echo server");
    let addr = listener.local_addr().expect("Failed to read address");

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// Spawns a server closing every connection right after accepting it.
pub async fn spawn_closing_server() -> SocketAddr {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("Failed to bind closing server");
    let addr = listener.local_addr().expect("Failed to read address");

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    addr
}

/// Sends `payload` through `127.0.0.1:local_port` and returns what comes back.
pub async fn round_trip(local_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, local_port))
        .await
        .expect("Failed to connect to tunnel");
    stream.write_all(payload).await.expect("Failed to write");

    let mut received = vec![0; payload.len()];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut received))
        .await
        .expect("Timed out reading from tunnel")
        .expect("Failed to read");

    received
}

/// Returns `true` if `127.0.0.1:port` can be bound.
pub async fn port_is_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.is_ok()
}
