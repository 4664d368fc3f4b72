//! Instance bootstrap script rendering.
//!
//! The script runs once under cloud-init on first boot: it installs the AWS
//! client, pulls the project package from the bucket, installs requirements and
//! then either starts a notebook server or runs the entrypoint.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::domain::error::ProjectError;

const TEMPLATE: &str = r#"#!/bin/bash

# Install aws-cli
curl -sS "https://awscli.amazonaws.com/awscli-exe-linux-x86_64.zip" -o "/tmp/awscliv2.zip"
python3 -c "import zipfile; zipfile.ZipFile('/tmp/awscliv2.zip').extractall('/tmp/')"
chmod -R u+x /tmp/aws
/tmp/aws/install

# Download project package
aws s3 cp s3://{bucket}/{package} /tmp/
python3 -c "import zipfile; zipfile.ZipFile('/tmp/{package}').extractall('/tmp/')"

# Install pip3 and the project's requirements.txt if the package has one
curl -sS https://bootstrap.pypa.io/get-pip.py | python3
[ -f /tmp/requirements.txt ] && pip3 install -r /tmp/requirements.txt

if [ "{notebook}" = "true" ]
then
    echo "{public_key}" >> /home/ubuntu/.ssh/authorized_keys
    pip3 install jupyterlab
    jupyter lab --no-browser --allow-root --ip=0.0.0.0 --port=8888 --ServerApp.token=''
else
    cd /tmp
    {app}
    aws s3 cp /var/log/cloud-init-output.log s3://{bucket}/cloud-init-output.log
    if [ "{shutdown}" = "true" ]
    then
        shutdown -h now
    fi
fi
"#;

/// What the instance runs after setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entrypoint {
    /// A script path relative to the package root, e.g. `app.py`.
    Script(String),
    /// A `module.function` pair, called with no arguments.
    Function { module: String, function: String },
}

impl Entrypoint {
    /// Shell command line that runs this entrypoint from the package root.
    #[must_use]
    pub fn command(&self) -> String {
        match self {
            Self::Script(path) => format!("python3 {path}"),
            Self::Function { module, function } => {
                format!("python3 -c \"import {module}; {module}.{function}()\"")
            }
        }
    }
}

impl FromStr for Entrypoint {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.contains(char::is_whitespace) {
            return Err(ProjectError::InvalidEntrypoint(s.to_string()));
        }
        if s.ends_with(".py") || s.contains('/') {
            return Ok(Self::Script(s.to_string()));
        }
        match s.rsplit_once('.') {
            Some((module, function)) if is_dotted_path(module) && is_identifier(function) => {
                Ok(Self::Function {
                    module: module.to_string(),
                    function: function.to_string(),
                })
            }
            _ => Err(ProjectError::InvalidEntrypoint(s.to_string())),
        }
    }
}

impl fmt::Display for Entrypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(path) => f.write_str(path),
            Self::Function { module, function } => write!(f, "{module}.{function}"),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    s.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_dotted_path(s: &str) -> bool {
    s.split('.').all(is_identifier)
}

/// Values substituted into the bootstrap script.
#[derive(Debug, Clone)]
pub struct BootstrapConfig<'a> {
    pub bucket: &'a str,
    pub package: &'a str,
    /// What to run; `None` in notebook mode without an entrypoint.
    pub entrypoint: Option<&'a Entrypoint>,
    pub notebook_mode: bool,
    pub shutdown_on_exit: bool,
    /// Full public key line (`ssh-ed25519 AAAA...`) appended to `authorized_keys`.
    pub public_key: Option<&'a str>,
}

/// Render the bootstrap script.
#[must_use]
pub fn render(config: &BootstrapConfig<'_>) -> Vec<u8> {
    TEMPLATE
        .replace("{bucket}", config.bucket)
        .replace("{package}", config.package)
        .replace(
            "{app}",
            &config.entrypoint.map(Entrypoint::command).unwrap_or_default(),
        )
        .replace("{notebook}", bool_flag(config.notebook_mode))
        .replace("{shutdown}", bool_flag(config.shutdown_on_exit))
        .replace("{public_key}", config.public_key.unwrap_or_default().trim())
        .into_bytes()
}

/// Base64-encode a rendered script as instance user data.
#[must_use]
pub fn encode_user_data(script: &[u8]) -> String {
    STANDARD.encode(script)
}

fn bool_flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
