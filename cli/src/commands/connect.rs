//! `bokchoi connect`: tunnel to the notebook server of the running instance.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::deployment::Orchestrator;
use crate::commands::forward::{self, Tunnel};
use crate::infra::ssh::KeyStore;

/// Arguments for the connect command.
#[derive(Args)]
pub struct ConnectArgs {
    /// Local port to listen on (default from bokchoi.yaml)
    #[arg(long)]
    pub local_port: Option<u16>,

    /// Notebook port on the instance (default from bokchoi.yaml)
    #[arg(long)]
    pub remote_port: Option<u16>,
}

/// Run `bokchoi connect`.
///
/// # Errors
///
/// Returns an error if no instance is running, the project key pair is
/// missing, or the tunnel cannot be opened.
pub async fn run(app: &AppContext, args: &ConnectArgs) -> Result<()> {
    let session = app.session().await?;
    let reporter = app.reporter();
    let host = Orchestrator::new(&session.gateway, &reporter, &session.project)
        .connect_target()
        .await?;

    let keys = KeyStore::new(app.runner())?;
    let key = keys.private_key_path(session.project.id());
    anyhow::ensure!(
        key.exists(),
        "no key pair at {}. Launch the project in notebook mode with 'bokchoi run' first.",
        key.display()
    );

    let tunnel = &session.config.tunnel;
    forward::open(
        app,
        &Tunnel {
            host: &host,
            user: &tunnel.user,
            key: &key,
            local_port: args.local_port.unwrap_or(tunnel.local_port),
            remote_port: args.remote_port.unwrap_or(tunnel.remote_port),
            max_connections: tunnel.max_connections,
        },
    )
    .await
}
