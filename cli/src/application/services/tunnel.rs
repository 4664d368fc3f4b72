//! Local port forwarding over an established tunnel transport.
//!
//! Each accepted client gets its own channel and its own relay task; bytes of
//! one client never reach another client's channel. The listener stops
//! accepting and aborts all relays when the shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::application::ports::TunnelTransport;

/// Bytes moved per read.
pub const CHUNK_SIZE: usize = 8192;

/// Pause after a failed `accept`, so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Destination of forwarded connections, as seen from the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    pub host: String,
    pub port: u16,
}

/// Bytes relayed in each direction for one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub to_remote: u64,
    pub to_local: u64,
}

/// Copy bytes between `local` and `channel` until either side reaches EOF,
/// then shut down both.
///
/// Each chunk is written in full and flushed before the next read on that
/// side, so per-direction order is preserved.
///
/// # Errors
///
/// Returns an I/O error from either side.
pub async fn relay<L, C>(local: &mut L, channel: &mut C) -> std::io::Result<RelayStats>
where
    L: AsyncRead + AsyncWrite + Unpin,
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut upstream = vec![0u8; CHUNK_SIZE];
    let mut downstream = vec![0u8; CHUNK_SIZE];
    let mut stats = RelayStats::default();

    loop {
        tokio::select! {
            read = local.read(&mut upstream) => {
                let n = read?;
                if n == 0 {
                    break;
                }
                channel.write_all(&upstream[..n]).await?;
                channel.flush().await?;
                stats.to_remote += byte_count(n);
            }
            read = channel.read(&mut downstream) => {
                let n = read?;
                if n == 0 {
                    break;
                }
                local.write_all(&downstream[..n]).await?;
                local.flush().await?;
                stats.to_local += byte_count(n);
            }
        }
    }

    // The peer may already be gone.
    let _ = channel.shutdown().await;
    let _ = local.shutdown().await;
    Ok(stats)
}

fn byte_count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Open a channel for one accepted client and relay until it closes.
///
/// # Errors
///
/// Returns an error if the channel is rejected or the relay fails.
pub async fn forward_client<T: TunnelTransport>(
    transport: &T,
    mut client: TcpStream,
    peer: SocketAddr,
    target: &ForwardTarget,
) -> Result<RelayStats> {
    let mut channel = transport
        .open_channel(&target.host, target.port, peer)
        .await?;
    debug!(%peer, host = %target.host, port = target.port, "channel opened");
    relay(&mut client, &mut channel)
        .await
        .with_context(|| format!("relaying {peer} to {}:{}", target.host, target.port))
}

/// Accept clients on `listener` and forward each through `transport` to
/// `target`, with at most `max_connections` relays at a time.
///
/// A client whose channel is rejected is dropped; the listener keeps
/// serving others. Returns once `shutdown` resolves, after aborting all
/// in-flight relays.
///
/// # Errors
///
/// Returns an error if the connection limiter is closed.
pub async fn serve<T, F>(
    listener: TcpListener,
    transport: Arc<T>,
    target: ForwardTarget,
    max_connections: usize,
    shutdown: F,
) -> Result<()>
where
    T: TunnelTransport,
    F: Future<Output = ()>,
{
    let limiter = Arc::new(Semaphore::new(max_connections.max(1)));
    let mut relays = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        let permit = tokio::select! {
            () = &mut shutdown => break,
            permit = Arc::clone(&limiter).acquire_owned() => {
                permit.context("connection limiter closed")?
            }
        };
        let accepted = tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                if backoff(shutdown.as_mut()).await {
                    continue;
                }
                break;
            }
        };

        while relays.try_join_next().is_some() {}

        let transport = Arc::clone(&transport);
        let target = target.clone();
        relays.spawn(async move {
            let _permit = permit;
            match forward_client(transport.as_ref(), stream, peer, &target).await {
                Ok(stats) => debug!(
                    %peer,
                    sent = stats.to_remote,
                    received = stats.to_local,
                    "client disconnected"
                ),
                Err(e) => warn!(%peer, error = %format!("{e:#}"), "dropping client"),
            }
        });
    }

    info!(active = relays.len(), "shutting down forwarder");
    relays.shutdown().await;
    Ok(())
}

/// Sleep for [`ACCEPT_BACKOFF`]. Returns false if `shutdown` resolved first.
async fn backoff<F: Future<Output = ()>>(shutdown: Pin<&mut F>) -> bool {
    tokio::select! {
        () = shutdown => false,
        () = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}
