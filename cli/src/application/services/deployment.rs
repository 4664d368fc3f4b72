//! Deployment lifecycle: deploy, run, status, stop and undeploy of one project.
//!
//! Every operation derives the names it touches from [`Project`] and
//! discovers existing resources by tag or name, so repeated invocations
//! converge instead of duplicating resources. No state is kept locally.

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::application::ports::{PackageArtifact, ProgressReporter, ResourceGateway};
use crate::application::services::identity::{IdentityProvisioner, TeardownReport};
use crate::application::services::skipped;
use crate::domain::bootstrap::{self, BootstrapConfig};
use crate::domain::policy::{TRUST_POLICY, permission_policy};
use crate::domain::{
    Entrypoint, ExecutionMode, IngressRule, Instance, InstanceState, LaunchSpecification, Project,
    ResourceKind, SpotRequestState, TAG_KEY, ignore_already_exists, ignore_not_found,
};

/// Description attached to the project's security group.
const SECURITY_GROUP_DESCRIPTION: &str = "Bokchoi default security group";

/// Inputs of a deploy.
pub struct DeployRequest<'a> {
    pub package: &'a PackageArtifact,
    /// Subnet whose VPC hosts the security group.
    pub subnet_id: &'a str,
    /// Extra policy document attached to the role next to the default one.
    pub custom_policy: Option<&'a str>,
    /// Address allowed to reach the instances over SSH.
    pub ssh_source_ip: &'a str,
}

/// Inputs of a run.
pub struct RunRequest<'a> {
    pub launch: &'a LaunchSpecification,
    pub spot_price: &'a str,
    /// `None` only in notebook mode.
    pub entrypoint: Option<&'a Entrypoint>,
    pub notebook_mode: bool,
    pub shutdown_on_exit: bool,
    /// Key authorized on the instance in notebook mode.
    pub public_key: Option<&'a str>,
}

/// Whether deploy transferred the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Unchanged,
}

/// A fulfilled spot request and the instances it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Launched {
    pub request_id: String,
    pub instance_ids: Vec<String>,
}

/// Spot requests and instances a stop cancelled and terminated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub cancelled: Vec<String>,
    pub terminated: Vec<String>,
}

/// Everything an undeploy removed (or would remove in dry-run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UndeployReport {
    pub stop: StopReport,
    pub bucket_deleted: bool,
    pub identity: TeardownReport,
    pub security_groups: Vec<String>,
    pub log_group_deleted: bool,
}

/// Lifecycle state of a project, derived from what exists in the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentState {
    Undeployed,
    Deployed,
    Running,
    Stopped,
}

impl DeploymentState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undeployed => "undeployed",
            Self::Deployed => "deployed",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Drives the lifecycle of one project against a resource gateway.
pub struct Orchestrator<'a, G, R> {
    gateway: &'a G,
    reporter: &'a R,
    project: &'a Project,
}

impl<'a, G: ResourceGateway, R: ProgressReporter> Orchestrator<'a, G, R> {
    pub fn new(gateway: &'a G, reporter: &'a R, project: &'a Project) -> Self {
        Self {
            gateway,
            reporter,
            project,
        }
    }

    /// Create or reuse every resource the project needs before it can run,
    /// and upload the package when its fingerprint changed.
    ///
    /// # Errors
    ///
    /// Returns the first gateway error that is not an `AlreadyExists` on an
    /// idempotent create.
    pub async fn deploy(&self, request: &DeployRequest<'_>) -> Result<UploadOutcome> {
        self.ensure_bucket().await?;
        let outcome = self.upload(request.package).await?;

        let identity = IdentityProvisioner::new(self.gateway, self.reporter);
        let mut policies = vec![
            identity
                .ensure_policy(
                    &self.project.default_policy_name(),
                    &permission_policy(self.project.bucket()),
                )
                .await?,
        ];
        if let Some(document) = request.custom_policy {
            policies.push(
                identity
                    .ensure_policy(&self.project.custom_policy_name(), document)
                    .await?,
            );
        }
        identity
            .ensure_role(self.project.role_name(), TRUST_POLICY, &policies)
            .await?;
        identity
            .ensure_instance_profile(
                self.project.instance_profile_name(),
                Some(self.project.role_name()),
            )
            .await?;

        self.ensure_security_group(request.subnet_id, request.ssh_source_ip)
            .await?;
        self.ensure_log_group().await?;
        Ok(outcome)
    }

    async fn ensure_bucket(&self) -> Result<()> {
        let bucket = self.project.bucket();
        match self.gateway.create_bucket(bucket).await {
            Ok(()) => self.reporter.success(&format!("created bucket {bucket}")),
            Err(e) if e.is_already_exists() => {
                self.reporter.step(&format!("bucket {bucket} already exists"));
            }
            Err(e) => return Err(e).with_context(|| format!("creating bucket {bucket}")),
        }
        Ok(())
    }

    async fn upload(&self, package: &PackageArtifact) -> Result<UploadOutcome> {
        let bucket = self.project.bucket();
        let key = self.project.package_name();
        match self.gateway.object_fingerprint(bucket, &key).await {
            Ok(Some(remote)) if remote == package.fingerprint => {
                self.reporter
                    .step("local package matches the deployed one, not uploading");
                return Ok(UploadOutcome::Unchanged);
            }
            Ok(_) => self
                .reporter
                .step("local package differs from the deployed one, uploading"),
            Err(e) if e.is_not_found() => self.reporter.step("no package deployed yet, uploading"),
            Err(e) => return Err(e).with_context(|| format!("reading metadata of {key}")),
        }
        self.gateway
            .put_object(bucket, &key, &package.path, &package.fingerprint)
            .await
            .with_context(|| format!("uploading {key} to {bucket}"))?;
        self.reporter.success(&format!("uploaded {key}"));
        Ok(UploadOutcome::Uploaded)
    }

    async fn ensure_security_group(&self, subnet_id: &str, ssh_source_ip: &str) -> Result<()> {
        let name = self.project.security_group_name();
        let vpc_id = self
            .gateway
            .subnet_vpc(subnet_id)
            .await
            .with_context(|| format!("looking up the VPC of {subnet_id}"))?;
        let group = match self
            .gateway
            .create_security_group(name, SECURITY_GROUP_DESCRIPTION, &vpc_id, self.project.id())
            .await
        {
            Ok(group) => {
                self.reporter.success(&format!("created security group {name}"));
                group
            }
            Err(e) if e.is_already_exists() => {
                self.reporter
                    .step(&format!("security group {name} already exists"));
                let groups = self
                    .gateway
                    .security_groups(self.project.id(), Some(name))
                    .await
                    .with_context(|| format!("looking up security group {name}"))?;
                let Some(group) = groups.into_iter().next() else {
                    bail!(
                        "security group {name} exists but is not tagged {TAG_KEY}={}. \
                         Delete it and deploy again.",
                        self.project.id()
                    );
                };
                group
            }
            Err(e) => return Err(e).with_context(|| format!("creating security group {name}")),
        };

        let rule = IngressRule::ssh_from(ssh_source_ip);
        if ignore_already_exists(self.gateway.authorize_ingress(&group.id, &rule).await)
            .with_context(|| format!("authorizing SSH on {}", group.id))?
        {
            self.reporter
                .success(&format!("{name} allows SSH from {ssh_source_ip}"));
        } else {
            self.reporter
                .step(&format!("{name} already allows SSH from {ssh_source_ip}"));
        }
        Ok(())
    }

    async fn ensure_log_group(&self) -> Result<()> {
        let group = self.project.log_group();
        match self.gateway.create_log_group(group).await {
            Ok(()) => self.reporter.success(&format!("created log group {group}")),
            Err(e) if e.is_already_exists() => {
                self.reporter.step(&format!("log group {group} already exists"));
            }
            Err(e) => return Err(e).with_context(|| format!("creating log group {group}")),
        }
        Ok(())
    }

    /// Request one spot instance running the deployed package.
    ///
    /// The request is tagged with the project id as it is created, so a
    /// failed wait leaves it discoverable by `stop`. Once fulfilled, its
    /// instances are tagged too.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the waiter times out, or in
    /// notebook mode the project's security group does not exist.
    pub async fn run(&self, request: &RunRequest<'_>) -> Result<Launched> {
        let package = self.project.package_name();
        let script = bootstrap::render(&BootstrapConfig {
            bucket: self.project.bucket(),
            package: &package,
            entrypoint: request.entrypoint,
            notebook_mode: request.notebook_mode,
            shutdown_on_exit: request.shutdown_on_exit,
            public_key: request.public_key,
        });

        let mut spec = request.launch.clone();
        spec.user_data = Some(bootstrap::encode_user_data(&script));
        spec.iam_instance_profile = Some(self.project.instance_profile_name().to_string());

        if request.notebook_mode {
            let name = self.project.security_group_name();
            let groups = self
                .gateway
                .security_groups(self.project.id(), Some(name))
                .await
                .context("looking up the project security group")?;
            let Some(group) = groups.into_iter().next() else {
                bail!("security group {name} not found. Run 'bokchoi deploy' first.");
            };
            if !spec.security_group_ids.contains(&group.id) {
                spec.security_group_ids.push(group.id);
            }
        }

        self.reporter.step(&format!(
            "requesting {} spot instance at {}",
            spec.instance_type, request.spot_price
        ));
        let request_id = self
            .gateway
            .request_spot_instance(&spec, request.spot_price, self.project.id())
            .await
            .context("requesting spot instance")?;

        self.reporter
            .step(&format!("waiting for spot request {request_id} to be fulfilled"));
        self.gateway
            .wait_spot_fulfilled(&request_id)
            .await
            .with_context(|| {
                format!(
                    "waiting for spot request {request_id}; it stays tagged and \
                     'bokchoi stop' cancels it"
                )
            })?;

        let requests = self
            .gateway
            .describe_spot_requests(std::slice::from_ref(&request_id))
            .await
            .with_context(|| format!("describing spot request {request_id}"))?;
        let instance_ids: Vec<String> = requests.into_iter().filter_map(|r| r.instance_id).collect();
        if !instance_ids.is_empty() {
            self.gateway
                .tag_resources(ResourceKind::Instance, &instance_ids, TAG_KEY, self.project.id())
                .await
                .with_context(|| {
                    format!(
                        "tagging instances {}; they are untagged and must be terminated by hand",
                        instance_ids.join(", ")
                    )
                })?;
        }

        self.reporter.success(&format!(
            "spot request {request_id} fulfilled by {}",
            instance_ids.join(", ")
        ));
        Ok(Launched {
            request_id,
            instance_ids,
        })
    }

    /// Instances of the project that are pending, running, stopping or stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the instances cannot be listed.
    pub async fn status(&self) -> Result<Vec<Instance>> {
        self.gateway
            .instances(self.project.id(), &InstanceState::LIVE)
            .await
            .context("listing instances")
    }

    /// Cancel open or active spot requests and terminate live instances.
    ///
    /// # Errors
    ///
    /// Returns the first gateway error that is not a `NotFound`.
    pub async fn stop(&self, mode: ExecutionMode) -> Result<StopReport> {
        let mut report = StopReport::default();

        let requests = self
            .gateway
            .spot_requests(self.project.id(), &SpotRequestState::CANCELLABLE)
            .await
            .context("listing spot requests")?;
        let ids: Vec<String> = requests.into_iter().map(|r| r.id).collect();
        if ids.is_empty() {
            self.reporter.step("no spot requests to cancel");
        } else if mode.is_dry_run() {
            skipped(
                self.reporter,
                &format!("cancel spot requests {}", ids.join(", ")),
            );
            report.cancelled = ids;
        } else {
            self.reporter
                .step(&format!("cancelling spot requests {}", ids.join(", ")));
            if ignore_not_found(self.gateway.cancel_spot_requests(&ids).await)
                .context("cancelling spot requests")?
            {
                self.reporter.success("spot requests cancelled");
                report.cancelled = ids;
            } else {
                self.reporter.step("no spot requests to cancel");
            }
        }

        for instance in self.status().await? {
            if mode.is_dry_run() {
                skipped(self.reporter, &format!("terminate instance {}", instance.id));
                report.terminated.push(instance.id);
                continue;
            }
            self.reporter
                .step(&format!("terminating instance {}", instance.id));
            if !ignore_not_found(self.gateway.terminate_instance(&instance.id).await)
                .with_context(|| format!("terminating instance {}", instance.id))?
            {
                self.reporter
                    .step(&format!("instance {} already gone", instance.id));
                continue;
            }
            self.gateway
                .wait_terminated(&instance.id)
                .await
                .with_context(|| format!("waiting for {} to terminate", instance.id))?;
            self.reporter
                .success(&format!("instance {} terminated", instance.id));
            report.terminated.push(instance.id);
        }
        Ok(report)
    }

    /// Stop the project and delete every resource it owns.
    ///
    /// # Errors
    ///
    /// Returns the first gateway error that is not a `NotFound`.
    pub async fn undeploy(&self, mode: ExecutionMode) -> Result<UndeployReport> {
        let stop = self.stop(mode).await?;
        let bucket_deleted = self.delete_bucket(mode).await?;
        let identity = IdentityProvisioner::new(self.gateway, self.reporter)
            .teardown(self.project, mode)
            .await?;
        let security_groups = self.delete_security_groups(mode).await?;
        let log_group_deleted = self.delete_log_group(mode).await?;
        Ok(UndeployReport {
            stop,
            bucket_deleted,
            identity,
            security_groups,
            log_group_deleted,
        })
    }

    async fn delete_bucket(&self, mode: ExecutionMode) -> Result<bool> {
        let bucket = self.project.bucket();
        if mode.is_dry_run() {
            skipped(
                self.reporter,
                &format!("delete bucket {bucket} and its objects"),
            );
            return Ok(true);
        }
        self.reporter.step(&format!("deleting bucket {bucket}"));
        let emptied = ignore_not_found(self.gateway.delete_objects(bucket).await)
            .with_context(|| format!("emptying bucket {bucket}"))?;
        let deleted = emptied
            && ignore_not_found(self.gateway.delete_bucket(bucket).await)
                .with_context(|| format!("deleting bucket {bucket}"))?;
        if deleted {
            self.reporter.success(&format!("deleted bucket {bucket}"));
        } else {
            self.reporter.step(&format!("bucket {bucket} already deleted"));
        }
        Ok(deleted)
    }

    async fn delete_security_groups(&self, mode: ExecutionMode) -> Result<Vec<String>> {
        let groups = self
            .gateway
            .security_groups(self.project.id(), None)
            .await
            .context("listing security groups")?;
        let mut deleted = Vec::new();
        for group in groups {
            if mode.is_dry_run() {
                skipped(
                    self.reporter,
                    &format!("delete security group {} ({})", group.name, group.id),
                );
                deleted.push(group.id);
                continue;
            }
            self.reporter
                .step(&format!("deleting security group {}", group.name));
            if ignore_not_found(self.gateway.delete_security_group(&group.id).await)
                .with_context(|| format!("deleting security group {}", group.id))?
            {
                self.reporter
                    .success(&format!("deleted security group {}", group.name));
                deleted.push(group.id);
            } else {
                self.reporter
                    .step(&format!("security group {} already deleted", group.name));
            }
        }
        Ok(deleted)
    }

    async fn delete_log_group(&self, mode: ExecutionMode) -> Result<bool> {
        let group = self.project.log_group();
        if mode.is_dry_run() {
            skipped(self.reporter, &format!("delete log group {group}"));
            return Ok(true);
        }
        let deleted = ignore_not_found(self.gateway.delete_log_group(group).await)
            .with_context(|| format!("deleting log group {group}"))?;
        if deleted {
            self.reporter.success(&format!("deleted log group {group}"));
        } else {
            self.reporter
                .step(&format!("log group {group} already deleted"));
        }
        Ok(deleted)
    }

    /// Address of the first running instance, for opening a tunnel.
    ///
    /// # Errors
    ///
    /// Returns an error if no instance is running or it has no address yet.
    pub async fn connect_target(&self) -> Result<String> {
        let running = self
            .gateway
            .instances(self.project.id(), &[InstanceState::Running])
            .await
            .context("listing instances")?;
        let Some(instance) = running.into_iter().next() else {
            bail!(
                "no running instance for {}. Start one with 'bokchoi run'.",
                self.project.id()
            );
        };
        let Some(address) = instance.address() else {
            bail!("instance {} has no address yet", instance.id);
        };
        Ok(address.to_string())
    }

    /// Derive the lifecycle state from the bucket and the live instances.
    ///
    /// Without the bucket the project is `Undeployed`, whatever instances
    /// are still winding down.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket or instances cannot be queried.
    pub async fn observe(&self) -> Result<DeploymentState> {
        let deployed = self
            .gateway
            .bucket_exists(self.project.bucket())
            .await
            .context("checking the project bucket")?;
        if !deployed {
            return Ok(DeploymentState::Undeployed);
        }
        let instances = self.status().await?;
        if instances
            .iter()
            .any(|i| matches!(i.state, InstanceState::Pending | InstanceState::Running))
        {
            return Ok(DeploymentState::Running);
        }
        Ok(if instances.is_empty() {
            DeploymentState::Deployed
        } else {
            DeploymentState::Stopped
        })
    }
}
