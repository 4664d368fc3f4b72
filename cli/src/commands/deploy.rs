//! `bokchoi deploy`: package the project and provision its resources.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::{Packager, PublicAddress};
use crate::application::services::deployment::{DeployRequest, Orchestrator, UploadOutcome};
use crate::infra::network::HttpPublicAddress;
use crate::infra::package::ZipPackager;
use crate::output::{json, progress};

/// Arguments for the `bokchoi deploy` command.
#[derive(Args)]
pub struct DeployArgs {
    /// Project directory to package
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
}

/// Run `bokchoi deploy`.
///
/// # Errors
///
/// Returns an error if packaging, the public address lookup or any
/// provisioning step fails.
pub async fn run(app: &AppContext, args: &DeployArgs) -> Result<()> {
    let session = app.session().await?;
    let requirements = session
        .config
        .requirements
        .as_deref()
        .map(|file| args.path.join(file));

    let pb = progress::spinner(&app.output, "Packaging project...");
    let package = ZipPackager.package(&args.path, requirements.as_deref());
    progress::finish(&pb);
    let package = package?;

    let pb = progress::spinner(&app.output, "Looking up your public IP...");
    let ip = HttpPublicAddress::new().public_ip().await;
    progress::finish(&pb);
    let ip = ip?;

    let reporter = app.reporter();
    let orchestrator = Orchestrator::new(&session.gateway, &reporter, &session.project);
    let outcome = orchestrator
        .deploy(&DeployRequest {
            package: &package,
            subnet_id: &session.config.ec2.launch_specification.subnet_id,
            custom_policy: session.config.custom_policy.as_deref(),
            ssh_source_ip: &ip,
        })
        .await?;

    if app.is_json() {
        println!(
            "{}",
            json::render(&serde_json::json!({
                "project_id": session.project.id(),
                "bucket": session.project.bucket(),
                "uploaded": outcome == UploadOutcome::Uploaded,
                "fingerprint": package.fingerprint,
            }))?
        );
    } else {
        app.output
            .success(&format!("Deployed {}", session.project.id()));
        app.output.kv("Next:", "bokchoi run");
    }
    Ok(())
}
