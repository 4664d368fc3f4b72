//! `bokchoi stop [--dry-run]`: cancel spot requests and terminate instances.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::deployment::Orchestrator;
use crate::domain::ExecutionMode;
use crate::output::json;

/// Arguments for the `bokchoi stop` command.
#[derive(Args)]
pub struct StopArgs {
    /// Show what would be stopped without stopping anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Run `bokchoi stop`.
///
/// # Errors
///
/// Returns an error if a request cannot be cancelled or an instance
/// terminated.
pub async fn run(app: &AppContext, args: &StopArgs) -> Result<()> {
    let session = app.session().await?;
    let mode = ExecutionMode::from_dry_run(args.dry_run);
    let reporter = app.reporter();
    let report = Orchestrator::new(&session.gateway, &reporter, &session.project)
        .stop(mode)
        .await?;

    if app.is_json() {
        println!(
            "{}",
            json::render(&serde_json::json!({
                "project_id": session.project.id(),
                "dry_run": mode.is_dry_run(),
                "cancelled": report.cancelled,
                "terminated": report.terminated,
            }))?
        );
    } else if report.terminated.is_empty() && report.cancelled.is_empty() {
        app.output.success("Nothing to stop");
    } else if !mode.is_dry_run() {
        let noun = if report.terminated.len() == 1 { "instance" } else { "instances" };
        app.output
            .success(&format!("Stopped {} {noun}", report.terminated.len()));
    }
    Ok(())
}
