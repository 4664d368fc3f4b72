//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::{
    GatewayResult, IngressRule, Instance, InstanceProfile, InstanceState, LaunchSpecification,
    LogPage, Policy, ProjectConfig, ResourceKind, Role, SecurityGroup, SpotRequest,
    SpotRequestState, TunnelError,
};

// ── Resource Gateway ──────────────────────────────────────────────────────────
//
// Each sub-trait covers one provider service. Create calls report an existing
// resource as `GatewayError::AlreadyExists`; delete/detach calls report a
// missing one as `GatewayError::NotFound`. Classification of those as benign
// is the caller's decision.

/// Caller identity.
#[allow(async_fn_in_trait)]
pub trait AccountInfo {
    /// Account id of the active credentials.
    async fn account_id(&self) -> GatewayResult<String>;
}

/// Object storage: buckets and objects with user metadata.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Create a bucket. An existing bucket owned by the caller is `AlreadyExists`.
    async fn create_bucket(&self, bucket: &str) -> GatewayResult<()>;
    /// Whether the bucket exists and is reachable.
    async fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool>;
    /// Stored `fingerprint` metadata of an object; `NotFound` if the object is absent.
    async fn object_fingerprint(&self, bucket: &str, key: &str) -> GatewayResult<Option<String>>;
    /// Upload `body`, overwriting any existing object and its metadata.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &Path,
        fingerprint: &str,
    ) -> GatewayResult<()>;
    /// Delete every object in the bucket.
    async fn delete_objects(&self, bucket: &str) -> GatewayResult<()>;
    /// Delete the (empty) bucket.
    async fn delete_bucket(&self, bucket: &str) -> GatewayResult<()>;
}

/// Network ACLs.
#[allow(async_fn_in_trait)]
pub trait NetworkAcl {
    /// VPC that contains `subnet_id`.
    async fn subnet_vpc(&self, subnet_id: &str) -> GatewayResult<String>;
    /// Create a security group tagged with `project_id` in the same call.
    /// A name clash in the VPC is `AlreadyExists`.
    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: &str,
        project_id: &str,
    ) -> GatewayResult<SecurityGroup>;
    /// Add an ingress rule. A rule the group already has is `AlreadyExists`.
    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> GatewayResult<()>;
    /// Security groups tagged with `project_id`, optionally narrowed by name.
    async fn security_groups(
        &self,
        project_id: &str,
        name: Option<&str>,
    ) -> GatewayResult<Vec<SecurityGroup>>;
    async fn delete_security_group(&self, group_id: &str) -> GatewayResult<()>;
}

/// Resource tagging for compute and network resources.
#[allow(async_fn_in_trait)]
pub trait ResourceTagger {
    async fn tag_resources(
        &self,
        kind: ResourceKind,
        resource_ids: &[String],
        key: &str,
        value: &str,
    ) -> GatewayResult<()>;
}

/// IAM: policies, roles and instance profiles.
#[allow(async_fn_in_trait)]
pub trait IdentityStore {
    async fn create_policy(&self, name: &str, document: &str) -> GatewayResult<Policy>;
    /// All customer-managed policies in the account.
    async fn list_policies(&self) -> GatewayResult<Vec<Policy>>;
    /// Names of roles the policy is attached to.
    async fn policy_roles(&self, policy_arn: &str) -> GatewayResult<Vec<String>>;
    async fn delete_policy(&self, policy_arn: &str) -> GatewayResult<()>;

    async fn create_role(&self, name: &str, trust_document: &str) -> GatewayResult<Role>;
    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()>;
    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()>;
    async fn list_roles(&self) -> GatewayResult<Vec<Role>>;
    /// Policies attached to the role.
    async fn role_policies(&self, role: &str) -> GatewayResult<Vec<Policy>>;
    async fn delete_role(&self, role: &str) -> GatewayResult<()>;

    async fn create_instance_profile(&self, name: &str) -> GatewayResult<InstanceProfile>;
    async fn add_role_to_instance_profile(&self, profile: &str, role: &str) -> GatewayResult<()>;
    async fn remove_role_from_instance_profile(
        &self,
        profile: &str,
        role: &str,
    ) -> GatewayResult<()>;
    async fn list_instance_profiles(&self) -> GatewayResult<Vec<InstanceProfile>>;
    async fn delete_instance_profile(&self, name: &str) -> GatewayResult<()>;
}

/// Spot requests and instances.
#[allow(async_fn_in_trait)]
pub trait ComputeFleet {
    /// Submit a one-instance spot request tagged with `project_id` at
    /// creation; returns the request id.
    async fn request_spot_instance(
        &self,
        spec: &LaunchSpecification,
        spot_price: &str,
        project_id: &str,
    ) -> GatewayResult<String>;
    /// Block until the request is fulfilled (provider waiter).
    async fn wait_spot_fulfilled(&self, request_id: &str) -> GatewayResult<()>;
    async fn describe_spot_requests(&self, request_ids: &[String])
    -> GatewayResult<Vec<SpotRequest>>;
    /// Spot requests tagged with `project_id` in one of `states`.
    async fn spot_requests(
        &self,
        project_id: &str,
        states: &[SpotRequestState],
    ) -> GatewayResult<Vec<SpotRequest>>;
    async fn cancel_spot_requests(&self, request_ids: &[String]) -> GatewayResult<()>;
    /// Instances tagged with `project_id` in one of `states`.
    async fn instances(
        &self,
        project_id: &str,
        states: &[InstanceState],
    ) -> GatewayResult<Vec<Instance>>;
    async fn terminate_instance(&self, instance_id: &str) -> GatewayResult<()>;
    /// Block until the instance reports `terminated`.
    async fn wait_terminated(&self, instance_id: &str) -> GatewayResult<()>;
}

/// Remote log groups and streams.
#[allow(async_fn_in_trait)]
pub trait LogStore {
    async fn create_log_group(&self, group: &str) -> GatewayResult<()>;
    /// Name of the most recent stream; `NotFound` if the group does not exist.
    async fn latest_log_stream(&self, group: &str) -> GatewayResult<Option<String>>;
    /// One page of events starting after `next_token` (from the head when `None`).
    async fn log_events(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> GatewayResult<LogPage>;
    async fn delete_log_group(&self, group: &str) -> GatewayResult<()>;
}

/// Any type implementing all sub-traits is a `ResourceGateway`.
pub trait ResourceGateway:
    AccountInfo + ObjectStore + NetworkAcl + ResourceTagger + IdentityStore + ComputeFleet + LogStore
{
}

/// Blanket implementation: any type implementing all sub-traits is a `ResourceGateway`.
impl<T> ResourceGateway for T where
    T: AccountInfo
        + ObjectStore
        + NetworkAcl
        + ResourceTagger
        + IdentityStore
        + ComputeFleet
        + LogStore
{
}

// ── Tunnel Transport Port ─────────────────────────────────────────────────────

/// An authenticated session able to open forwarding channels concurrently.
///
/// Shared by all connection workers of one listener, hence `Send + Sync`.
pub trait TunnelTransport: Send + Sync + 'static {
    /// Byte stream of one forwarding channel.
    type Channel: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a channel to `host:port` as seen from the remote side.
    fn open_channel(
        &self,
        host: &str,
        port: u16,
        originator: SocketAddr,
    ) -> impl Future<Output = Result<Self::Channel, TunnelError>> + Send;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Packaging Port ────────────────────────────────────────────────────────────

/// A packaged project ready for upload.
pub struct PackageArtifact {
    /// Path of the archive on local disk.
    pub path: PathBuf,
    /// Content hash of the packaged files.
    pub fingerprint: String,
    /// Keeps the archive's temporary directory alive until dropped.
    pub guard: Box<dyn std::any::Any + Send>,
}

/// Abstracts packaging of a project tree.
pub trait Packager {
    /// Package `source_dir` (plus `requirements`, if given) into an archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be read or the archive written.
    fn package(&self, source_dir: &Path, requirements: Option<&Path>) -> Result<PackageArtifact>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts loading and writing the project configuration file.
pub trait ConfigStore {
    /// Load and validate the project configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or invalid.
    fn load(&self) -> Result<ProjectConfig>;
    /// Write a starter configuration for `project` unless one exists.
    ///
    /// Returns `false` when a file was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn init(&self, project: &str) -> Result<bool>;
    /// Path of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be resolved.
    fn path(&self) -> Result<PathBuf>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Abstracts discovery of the caller's public address.
#[allow(async_fn_in_trait)]
pub trait PublicAddress {
    /// Public IPv4 address of this machine as seen from the internet.
    async fn public_ip(&self) -> Result<String>;
}
