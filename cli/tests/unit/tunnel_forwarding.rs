//! Forwarder behavior over real loopback sockets with an in-memory transport.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bokchoi_cli::application::ports::TunnelTransport;
use bokchoi_cli::application::services::tunnel::{ForwardTarget, serve};
use bokchoi_cli::domain::TunnelError;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

/// Each channel is served by its own task that upper-cases what it reads.
#[derive(Default)]
struct ShoutingTransport {
    opened: AtomicUsize,
    reject_first: usize,
}

impl TunnelTransport for ShoutingTransport {
    type Channel = DuplexStream;

    fn open_channel(
        &self,
        host: &str,
        port: u16,
        _originator: SocketAddr,
    ) -> impl Future<Output = Result<Self::Channel, TunnelError>> + Send {
        let n = self.opened.fetch_add(1, Ordering::SeqCst);
        let reject = n < self.reject_first;
        let host = host.to_string();
        async move {
            if reject {
                return Err(TunnelError::ChannelRejected {
                    host,
                    port,
                    reason: "administratively prohibited".to_string(),
                });
            }
            let (channel, mut remote) = duplex(1024);
            tokio::spawn(async move {
                let mut buf = [0u8; 256];
                loop {
                    match remote.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let upper = buf[..n].to_ascii_uppercase();
                            if remote.write_all(&upper).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
            Ok(channel)
        }
    }
}

struct Forwarder {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

async fn start(transport: ShoutingTransport, max_connections: usize) -> Forwarder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(serve(
        listener,
        Arc::new(transport),
        ForwardTarget {
            host: "localhost".to_string(),
            port: 8888,
        },
        max_connections,
        async move {
            let _ = stopped.await;
        },
    ));
    Forwarder { addr, stop, task }
}

async fn exchange(client: &mut TcpStream, message: &[u8]) -> Vec<u8> {
    client.write_all(message).await.unwrap();
    let mut reply = vec![0u8; message.len()];
    tokio::time::timeout(WAIT, client.read_exact(&mut reply))
        .await
        .expect("reply in time")
        .unwrap();
    reply
}

#[tokio::test]
async fn concurrent_clients_get_independent_channels() {
    let forwarder = start(ShoutingTransport::default(), 8).await;
    let mut alpha = TcpStream::connect(forwarder.addr).await.unwrap();
    let mut beta = TcpStream::connect(forwarder.addr).await.unwrap();

    assert_eq!(exchange(&mut alpha, b"alpha").await, b"ALPHA");
    assert_eq!(exchange(&mut beta, b"beta").await, b"BETA");
    assert_eq!(exchange(&mut alpha, b"again").await, b"AGAIN");

    forwarder.stop.send(()).unwrap();
    forwarder.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn rejected_channel_drops_only_that_client() {
    let forwarder = start(
        ShoutingTransport {
            reject_first: 1,
            ..ShoutingTransport::default()
        },
        8,
    )
    .await;

    let mut refused = TcpStream::connect(forwarder.addr).await.unwrap();
    let mut buf = [0u8; 8];
    let read = tokio::time::timeout(WAIT, refused.read(&mut buf))
        .await
        .expect("refused client is closed in time");
    assert!(matches!(read, Ok(0) | Err(_)));

    let mut accepted = TcpStream::connect(forwarder.addr).await.unwrap();
    assert_eq!(exchange(&mut accepted, b"still up").await, b"STILL UP");

    forwarder.stop.send(()).unwrap();
    forwarder.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_closes_in_flight_relays() {
    let forwarder = start(ShoutingTransport::default(), 8).await;
    let mut client = TcpStream::connect(forwarder.addr).await.unwrap();
    assert_eq!(exchange(&mut client, b"hello").await, b"HELLO");

    forwarder.stop.send(()).unwrap();
    tokio::time::timeout(WAIT, forwarder.task)
        .await
        .expect("listener stops in time")
        .unwrap()
        .unwrap();

    let mut buf = [0u8; 8];
    let read = tokio::time::timeout(WAIT, client.read(&mut buf))
        .await
        .expect("client is closed in time");
    assert!(matches!(read, Ok(0) | Err(_)));
}

#[tokio::test]
async fn connections_beyond_the_cap_wait_for_a_slot() {
    let forwarder = start(ShoutingTransport::default(), 1).await;
    let mut first = TcpStream::connect(forwarder.addr).await.unwrap();
    assert_eq!(exchange(&mut first, b"one").await, b"ONE");

    let mut second = TcpStream::connect(forwarder.addr).await.unwrap();
    second.write_all(b"two").await.unwrap();
    let mut reply = [0u8; 3];
    assert!(
        tokio::time::timeout(Duration::from_millis(200), second.read_exact(&mut reply))
            .await
            .is_err(),
        "second client must wait while the first holds the only slot"
    );

    drop(first);
    tokio::time::timeout(WAIT, second.read_exact(&mut reply))
        .await
        .expect("second client served after the first left")
        .unwrap();
    assert_eq!(&reply, b"TWO");

    forwarder.stop.send(()).unwrap();
    forwarder.task.await.unwrap().unwrap();
}
