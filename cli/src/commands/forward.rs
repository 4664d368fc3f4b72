//! `bokchoi forward`: forward a local port through an SSH host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;

use crate::app::AppContext;
use crate::application::services::tunnel::{ForwardTarget, serve};
use crate::domain::TunnelConfig;
use crate::infra::ssh::SshTransport;

/// Arguments for the `bokchoi forward` command.
#[derive(Args)]
pub struct ForwardArgs {
    /// Local port to listen on
    #[arg(long)]
    pub local_port: u16,

    /// SSH host to tunnel through
    #[arg(long)]
    pub host: String,

    /// Port on the remote side's localhost
    #[arg(long, default_value_t = 8888)]
    pub remote_port: u16,

    /// Login user on the SSH host
    #[arg(long, default_value = "ubuntu")]
    pub user: String,

    /// Private key file
    #[arg(long)]
    pub key: PathBuf,

    /// Maximum concurrently forwarded connections
    #[arg(long, default_value_t = TunnelConfig::default().max_connections)]
    pub max_connections: usize,
}

/// One tunnel to open: the SSH endpoint and the ports on both sides.
pub struct Tunnel<'a> {
    pub host: &'a str,
    pub user: &'a str,
    pub key: &'a Path,
    pub local_port: u16,
    pub remote_port: u16,
    pub max_connections: usize,
}

/// Run `bokchoi forward`.
///
/// # Errors
///
/// Returns an error if the SSH session cannot be established or the local
/// port cannot be bound.
pub async fn run(app: &AppContext, args: &ForwardArgs) -> Result<()> {
    open(
        app,
        &Tunnel {
            host: &args.host,
            user: &args.user,
            key: &args.key,
            local_port: args.local_port,
            remote_port: args.remote_port,
            max_connections: args.max_connections,
        },
    )
    .await
}

/// Authenticate, bind the local port and forward until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the SSH session cannot be established or the local
/// port cannot be bound.
pub async fn open(app: &AppContext, tunnel: &Tunnel<'_>) -> Result<()> {
    let transport = SshTransport::connect(tunnel.host, tunnel.user, tunnel.key).await?;
    let listener = TcpListener::bind(("127.0.0.1", tunnel.local_port))
        .await
        .with_context(|| format!("cannot listen on localhost:{}", tunnel.local_port))?;

    app.output.success(&format!(
        "Forwarding localhost:{} to {}:{}",
        tunnel.local_port, tunnel.host, tunnel.remote_port
    ));
    app.output.kv("Open:", &format!("http://localhost:{}", tunnel.local_port));
    app.output.kv("Stop:", "press Ctrl-C");

    serve(
        listener,
        Arc::new(transport),
        ForwardTarget {
            host: "localhost".to_string(),
            port: tunnel.remote_port,
        },
        tunnel.max_connections,
        shutdown_signal(),
    )
    .await?;

    app.output.success("Tunnel closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
