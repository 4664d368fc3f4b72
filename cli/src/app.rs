//! Application context: unified state passed to every command handler.
//!
//! `AppContext` carries output settings, the configuration store and the
//! prompt policy. Commands that talk to the cloud account open a [`Session`],
//! which loads the project configuration, checks the provider client and
//! resolves the project identity.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::{AccountInfo, ConfigStore};
use crate::domain::{Project, ProjectConfig};
use crate::infra::aws::AwsCliGateway;
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner};
use crate::infra::config::YamlConfigStore;
use crate::output::{OutputContext, TerminalReporter, progress};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `BOKCHOI_YES` env vars).
    pub yes: bool,
    /// Explicit configuration file, overriding `BOKCHOI_CONFIG`.
    pub config: Option<PathBuf>,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Project configuration store.
    pub config: YamlConfigStore,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `BOKCHOI_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

/// Everything a cloud-facing command needs: the loaded configuration, a
/// gateway to the account and the project identity derived from both.
pub struct Session<G> {
    pub config: ProjectConfig,
    pub gateway: G,
    pub project: Project,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("BOKCHOI_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        // Narration would corrupt the JSON document on stdout.
        let quiet = flags.output.quiet || flags.output.json;

        let config = match &flags.behaviour.config {
            Some(path) => YamlConfigStore::with_path(path.clone()),
            None => YamlConfigStore::new(),
        };

        Self {
            output: OutputContext::new(flags.output.no_color, quiet),
            mode,
            config,
            non_interactive,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Progress reporter handed to application services.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Command runner for external tools (`aws`, `ssh-keygen`).
    #[must_use]
    pub fn runner(&self) -> TokioCommandRunner {
        TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT).with_env("AWS_PAGER", "")
    }

    /// Load the configuration and resolve the project against the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing or invalid, the
    /// `aws` client is unusable, or the derived project id is invalid.
    pub async fn session(&self) -> Result<Session<AwsCliGateway<TokioCommandRunner>>> {
        let config = self.config.load()?;
        let gateway = AwsCliGateway::new(self.runner(), config.ec2.region.clone());

        let pb = progress::spinner(&self.output, "Resolving AWS account...");
        let account = resolve_account(&gateway).await;
        progress::finish(&pb);

        let project = Project::new(&config.project, &account?)?;
        tracing::debug!(project_id = project.id(), "session ready");
        Ok(Session {
            config,
            gateway,
            project,
        })
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `BOKCHOI_YES`
    /// env), returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}

async fn resolve_account(gateway: &AwsCliGateway<TokioCommandRunner>) -> Result<String> {
    let version = gateway.check_prerequisites().await?;
    tracing::debug!(%version, "aws client found");
    gateway
        .account_id()
        .await
        .context("cannot resolve the AWS account; check your credentials")
}
