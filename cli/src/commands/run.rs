//! `bokchoi run`: launch a spot instance running the deployed package.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::deployment::{Orchestrator, RunRequest};
use crate::infra::ssh::KeyStore;
use crate::output::json;

/// Run `bokchoi run`.
///
/// In notebook mode the project key pair is created on first use and its
/// public half is authorized on the instance for `bokchoi connect`.
///
/// # Errors
///
/// Returns an error if the entrypoint is invalid, the key pair cannot be
/// generated, or the spot request fails.
pub async fn run(app: &AppContext) -> Result<()> {
    let session = app.session().await?;
    let config = &session.config;
    let entrypoint = config.launch_entrypoint()?;

    let public_key = if config.notebook {
        let keys = KeyStore::new(app.runner())?;
        Some(keys.ensure_key_pair(session.project.id()).await?)
    } else {
        None
    };

    let reporter = app.reporter();
    let launched = Orchestrator::new(&session.gateway, &reporter, &session.project)
        .run(&RunRequest {
            launch: &config.ec2.launch_specification,
            spot_price: &config.ec2.spot_price,
            entrypoint: entrypoint.as_ref(),
            notebook_mode: config.notebook,
            shutdown_on_exit: config.shutdown,
            public_key: public_key.as_deref(),
        })
        .await?;

    if app.is_json() {
        println!("{}", json::render(&launched)?);
        return Ok(());
    }

    app.output.success(&format!(
        "Launched {} for {}",
        launched.instance_ids.join(", "),
        session.project.id()
    ));
    if config.notebook {
        app.output.kv("Next:", "bokchoi connect");
    } else {
        app.output.kv("Next:", "bokchoi logs --follow");
    }
    Ok(())
}
