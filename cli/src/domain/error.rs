//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

use crate::domain::resource::ResourceKind;

// ── Gateway errors ────────────────────────────────────────────────────────────

/// Errors surfaced by the cloud resource gateway.
///
/// `AlreadyExists` and `NotFound` are the benign classes: callers decide per
/// call site whether they mean "nothing to do". Everything else aborts the
/// current operation.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("provider rejected the request ({code}): {message}")]
    Provider { code: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    /// `true` for duplicate-resource errors.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// `true` when the target resource does not exist (anymore).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Collapses a `NotFound` into `Ok(false)`; `Ok(true)` means the call took effect.
///
/// # Errors
///
/// Returns every gateway error other than `NotFound` unchanged.
pub fn ignore_not_found(result: GatewayResult<()>) -> GatewayResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Collapses an `AlreadyExists` into `Ok(false)`; `Ok(true)` means the call
/// took effect.
///
/// # Errors
///
/// Returns every gateway error other than `AlreadyExists` unchanged.
pub fn ignore_already_exists(result: GatewayResult<()>) -> GatewayResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

// ── Tunnel errors ─────────────────────────────────────────────────────────────

/// Errors raised while establishing or using a forwarding tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("cannot reach {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("authentication as '{user}' failed: {reason}")]
    AuthenticationFailure { user: String, reason: String },

    #[error("channel to {host}:{port} was rejected: {reason}")]
    ChannelRejected {
        host: String,
        port: u16,
        reason: String,
    },
}

// ── Project errors ────────────────────────────────────────────────────────────

/// Errors related to project identity.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Invalid project name '{0}': use lowercase letters, digits and '-'")]
    InvalidName(String),

    #[error(
        "Derived project id '{0}' is not a valid bucket name (3-63 chars of a-z, 0-9 and '-')"
    )]
    InvalidId(String),

    #[error("Invalid entrypoint '{0}': expected a script path or module.function")]
    InvalidEntrypoint(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to the project configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No bokchoi.yaml found at {0}. Run 'bokchoi init' to create one.")]
    Missing(String),

    #[error("Invalid value for {key}: {value}\n\n{hint}")]
    InvalidValue {
        key: String,
        value: String,
        hint: String,
    },
}
