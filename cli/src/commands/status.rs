//! `bokchoi status`: show the project's lifecycle state and instances.

use anyhow::Result;
use serde::Serialize;

use crate::app::AppContext;
use crate::application::services::deployment::{DeploymentState, Orchestrator};
use crate::domain::Instance;
use crate::output::json;

/// JSON document printed by `bokchoi status --json`.
#[derive(Debug, Serialize)]
pub struct StatusOutput<'a> {
    pub project_id: &'a str,
    pub state: DeploymentState,
    pub instances: &'a [Instance],
}

/// Run `bokchoi status`.
///
/// # Errors
///
/// Returns an error if the project's resources cannot be listed.
pub async fn run(app: &AppContext) -> Result<()> {
    let session = app.session().await?;
    let reporter = app.reporter();
    let orchestrator = Orchestrator::new(&session.gateway, &reporter, &session.project);
    let state = orchestrator.observe().await?;
    let instances = orchestrator.status().await?;

    if app.is_json() {
        println!(
            "{}",
            json::render(&StatusOutput {
                project_id: session.project.id(),
                state,
                instances: &instances,
            })?
        );
        return Ok(());
    }

    app.output.header(session.project.id());
    app.output.kv("State:", state.as_str());
    if instances.is_empty() {
        app.output.kv("Instances:", "none");
    } else {
        for instance in &instances {
            app.output.instance(instance);
        }
    }
    Ok(())
}
