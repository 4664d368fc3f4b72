//! Domain types and validators for the project configuration file.
//!
//! Pure functions only. No I/O or async.

use serde::{Deserialize, Serialize};

use crate::domain::bootstrap::Entrypoint;
use crate::domain::error::ConfigError;
use crate::domain::project::validate_project_name;
use crate::domain::resource::LaunchSpecification;

// ── Config schema ────────────────────────────────────────────────────────────

/// Project configuration stored in `bokchoi.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name; combined with the account id into the project id.
    pub project: String,
    /// Script path (`app.py`) or `module.function` run on the instance.
    #[serde(default)]
    pub entrypoint: String,
    /// Path of a `requirements.txt` to ship with the package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    /// Start a notebook server and allow SSH tunnelling instead of running
    /// the entrypoint.
    #[serde(default)]
    pub notebook: bool,
    /// Power off once the entrypoint exits.
    #[serde(default = "default_true")]
    pub shutdown: bool,
    /// Extra IAM policy document (JSON) attached to the instance role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_policy: Option<String>,
    /// EC2 spot settings.
    pub ec2: Ec2Config,
    /// Port-forwarding settings for `connect`.
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

/// EC2 spot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ec2Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Maximum hourly bid, e.g. `"0.10"`.
    pub spot_price: String,
    pub launch_specification: LaunchSpecification,
}

/// Port-forwarding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Login user on the instance image.
    pub user: String,
    pub local_port: u16,
    pub remote_port: u16,
    /// Upper bound on concurrently forwarded client connections.
    pub max_connections: usize,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            user: "ubuntu".to_string(),
            local_port: 8888,
            remote_port: 8888,
            max_connections: 64,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ProjectConfig {
    /// Parse the configured entrypoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the entrypoint is neither a script path nor a
    /// `module.function` pair.
    pub fn entrypoint(&self) -> anyhow::Result<Entrypoint> {
        Ok(self.entrypoint.parse()?)
    }

    /// Entrypoint for a launch: optional in notebook mode, required otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured entrypoint is malformed, or none is
    /// configured outside notebook mode.
    pub fn launch_entrypoint(&self) -> anyhow::Result<Option<Entrypoint>> {
        if self.notebook && self.entrypoint.trim().is_empty() {
            return Ok(None);
        }
        self.entrypoint().map(Some)
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a loaded configuration.
///
/// # Errors
///
/// Returns the first invalid field found.
pub fn validate_config(config: &ProjectConfig) -> anyhow::Result<()> {
    validate_project_name(&config.project)?;

    if !config.notebook {
        config.entrypoint()?;
    }

    let price_ok = config
        .ec2
        .spot_price
        .parse::<f64>()
        .is_ok_and(|p| p.is_finite() && p > 0.0);
    if !price_ok {
        return Err(invalid(
            "ec2.spot_price",
            &config.ec2.spot_price,
            "Use a positive decimal hourly price, e.g. \"0.10\".",
        ));
    }

    let spec = &config.ec2.launch_specification;
    for (key, value) in [
        ("ec2.launch_specification.image_id", &spec.image_id),
        ("ec2.launch_specification.instance_type", &spec.instance_type),
        ("ec2.launch_specification.subnet_id", &spec.subnet_id),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(key, value, "This setting is required."));
        }
    }

    if let Some(policy) = &config.custom_policy
        && serde_json::from_str::<serde_json::Value>(policy).is_err()
    {
        return Err(invalid(
            "custom_policy",
            "<document>",
            "The custom policy must be a JSON policy document.",
        ));
    }

    if config.tunnel.max_connections == 0 {
        return Err(invalid(
            "tunnel.max_connections",
            "0",
            "Allow at least one connection.",
        ));
    }
    Ok(())
}

fn invalid(key: &str, value: &str, hint: &str) -> anyhow::Error {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        hint: hint.to_string(),
    }
    .into()
}

/// Starter configuration written by `bokchoi init`.
#[must_use]
pub fn starter_config(project: &str) -> String {
    format!(
        "# bokchoi project configuration\n\
         project: {project}\n\
         # Script path (app.py) or module.function to run on the instance\n\
         entrypoint: app.py\n\
         # requirements: requirements.txt\n\
         # Start a notebook server instead of running the entrypoint\n\
         notebook: false\n\
         # Power off the instance when the entrypoint exits\n\
         shutdown: true\n\
         ec2:\n  \
           # region: eu-west-1\n  \
           spot_price: \"0.10\"\n  \
           launch_specification:\n    \
             image_id: ami-00000000000000000\n    \
             instance_type: t3.medium\n    \
             subnet_id: subnet-00000000\n\
         tunnel:\n  \
           user: ubuntu\n  \
           local_port: 8888\n  \
           remote_port: 8888\n"
    )
}

// ── Unit tests ───────────────────────────────────────────────────────────────
