//! `bokchoi undeploy [--dry-run] [-y]`: remove everything the project owns.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::deployment::Orchestrator;
use crate::domain::ExecutionMode;
use crate::output::json;

/// Arguments for the `bokchoi undeploy` command.
#[derive(Args)]
pub struct UndeployArgs {
    /// Show what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Run `bokchoi undeploy`.
///
/// # Errors
///
/// Returns an error if the prompt fails or a deletion step fails.
pub async fn run(app: &AppContext, args: &UndeployArgs) -> Result<()> {
    let session = app.session().await?;
    let mode = ExecutionMode::from_dry_run(args.dry_run);

    if !mode.is_dry_run() && !args.yes {
        let prompt = format!(
            "Terminate all instances and delete every resource of {}?",
            session.project.id()
        );
        if !app.confirm(&prompt, false)? {
            if app.is_json() {
                println!(
                    "{}",
                    json::render(&serde_json::json!({
                        "project_id": session.project.id(),
                        "cancelled": true,
                    }))?
                );
            } else {
                println!("Cancelled.");
            }
            return Ok(());
        }
    }

    let reporter = app.reporter();
    let report = Orchestrator::new(&session.gateway, &reporter, &session.project)
        .undeploy(mode)
        .await?;

    if app.is_json() {
        println!(
            "{}",
            json::render(&serde_json::json!({
                "project_id": session.project.id(),
                "dry_run": mode.is_dry_run(),
                "removed": report,
            }))?
        );
    } else if mode.is_dry_run() {
        app.output.success("Dry run complete, nothing was deleted");
    } else {
        app.output
            .success(&format!("Undeployed {}", session.project.id()));
    }
    Ok(())
}
