//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::config::{ProjectConfig, starter_config, validate_config};
use crate::domain::error::ConfigError;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "bokchoi.yaml";

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "BOKCHOI_CONFIG";

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
#[derive(Debug, Default)]
pub struct YamlConfigStore {
    path: Option<PathBuf>,
}

impl YamlConfigStore {
    /// Resolve the path from `BOKCHOI_CONFIG`, else `./bokchoi.yaml`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<ProjectConfig> {
        let path = self.path()?;
        if !path.exists() {
            return Err(ConfigError::Missing(path.display().to_string()).into());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: ProjectConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        validate_config(&config).with_context(|| format!("invalid {}", path.display()))?;
        Ok(config)
    }

    fn init(&self, project: &str) -> Result<bool> {
        let path = self.path()?;
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(&path, starter_config(project))
            .with_context(|| format!("cannot write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("cannot set permissions on {}", path.display()))?;
        }
        Ok(true)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(val));
        }
        let cwd = std::env::current_dir().context("cannot determine working directory")?;
        Ok(cwd.join(CONFIG_FILE))
    }
}
