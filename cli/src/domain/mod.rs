//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod policy;
pub mod project;
pub mod resource;
pub mod ssh;

pub use bootstrap::{BootstrapConfig, Entrypoint};
pub use config::{ProjectConfig, TunnelConfig, validate_config};
pub use error::{
    ConfigError, GatewayError, GatewayResult, ProjectError, TunnelError, ignore_already_exists,
    ignore_not_found,
};
pub use project::Project;
pub use resource::{
    ExecutionMode, IngressRule, Instance, InstanceProfile, InstanceState, LaunchSpecification,
    LogEvent, LogPage, Policy, ResourceKind, Role, SecurityGroup, SpotRequest, SpotRequestState,
    TAG_KEY,
};
