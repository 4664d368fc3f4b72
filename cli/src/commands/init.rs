//! `bokchoi init`: write a starter `bokchoi.yaml`.

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::domain::project::validate_project_name;

/// Arguments for the `bokchoi init` command.
#[derive(Args)]
pub struct InitArgs {
    /// Project name. Defaults to the name of the current directory.
    #[arg(long)]
    pub project: Option<String>,
}

/// Run `bokchoi init`.
///
/// # Errors
///
/// Returns an error if the project name is invalid or the file cannot be
/// written.
pub fn run(app: &AppContext, args: &InitArgs) -> Result<()> {
    let name = match &args.project {
        Some(name) => name.clone(),
        None => {
            let cwd = std::env::current_dir().context("cannot determine working directory")?;
            let dir = cwd
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            project_name_from_dir(&dir)
        }
    };
    validate_project_name(&name)?;

    let path = app.config.path()?;
    let created = app.config.init(&name)?;
    if app.is_json() {
        println!(
            "{}",
            crate::output::json::render(&serde_json::json!({
                "path": path.display().to_string(),
                "project": name,
                "created": created,
            }))?
        );
        return Ok(());
    }

    if created {
        app.output
            .success(&format!("Wrote {} for project {name}", path.display()));
        app.output.kv("Next:", "edit the ec2 section, then run 'bokchoi deploy'");
    } else {
        app.output
            .warn(&format!("{} already exists, leaving it unchanged", path.display()));
    }
    Ok(())
}

/// Turn a directory name into a valid project name.
fn project_name_from_dir(dir: &str) -> String {
    let mapped: String = dir
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = mapped.trim_matches('-');
    if trimmed.is_empty() {
        "app".to_string()
    } else {
        trimmed.to_string()
    }
}
