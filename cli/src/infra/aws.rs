//! `ResourceGateway` backed by the `aws` command line client.
//!
//! Every call runs `aws --output json [--region R] <service> <operation> ...`
//! through the `CommandRunner` port. Failed calls are classified from the
//! client's `An error occurred (<Code>) when calling the <Op> operation`
//! message into `AlreadyExists`, `NotFound` or `Provider`.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use semver::Version;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{
    AccountInfo, CommandRunner, ComputeFleet, IdentityStore, LogStore, NetworkAcl, ObjectStore,
    ResourceTagger,
};
use crate::domain::{
    GatewayError, GatewayResult, IngressRule, Instance, InstanceProfile, InstanceState,
    LaunchSpecification, LogEvent, LogPage, Policy, ResourceKind, Role, SecurityGroup,
    SpotRequest, SpotRequestState, TAG_KEY,
};

/// Upper bound for provider waiters (spot fulfilment, termination).
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Oldest client release with the commands and output shapes used here.
pub const MIN_CLI_VERSION: Version = Version::new(2, 0, 0);

/// Bucket region that must not be sent as a location constraint.
const DEFAULT_BUCKET_REGION: &str = "us-east-1";

static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"An error occurred \(([^)]+)\) when calling the (\w+) operation: ?(.*)")
        .expect("valid regex")
});

const ALREADY_EXISTS_CODES: &[&str] = &[
    "BucketAlreadyOwnedByYou",
    "InvalidGroup.Duplicate",
    "InvalidPermission.Duplicate",
    "EntityAlreadyExists",
    "ResourceAlreadyExistsException",
];

const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchEntity",
    "ResourceNotFoundException",
    "InvalidGroup.NotFound",
    "InvalidInstanceID.NotFound",
    "InvalidSpotInstanceRequestID.NotFound",
    "InvalidSubnetID.NotFound",
    "404",
    "NotFound",
];

/// Map a failed call's stderr onto the gateway error classes.
#[must_use]
pub fn classify_error(stderr: &str, kind: ResourceKind, name: &str) -> GatewayError {
    let Some(caps) = ERROR_RE.captures(stderr) else {
        return GatewayError::Provider {
            code: "Unknown".to_string(),
            message: stderr.trim().to_string(),
        };
    };
    let code = &caps[1];
    if ALREADY_EXISTS_CODES.contains(&code) {
        GatewayError::AlreadyExists {
            kind,
            name: name.to_string(),
        }
    } else if NOT_FOUND_CODES.contains(&code) {
        GatewayError::NotFound {
            kind,
            name: name.to_string(),
        }
    } else {
        GatewayError::Provider {
            code: code.to_string(),
            message: caps[3].trim().to_string(),
        }
    }
}

/// Extract the release from `aws --version` output, e.g.
/// `aws-cli/2.15.30 Python/3.11.8 Linux/6.5.0 exe/x86_64.ubuntu.22`.
#[must_use]
pub fn parse_cli_version(text: &str) -> Option<Version> {
    text.split_whitespace()
        .find_map(|word| word.strip_prefix("aws-cli/"))
        .and_then(|v| Version::parse(v).ok())
}

/// Gateway over the `aws` client.
pub struct AwsCliGateway<R> {
    runner: R,
    region: Option<String>,
}

impl<R: CommandRunner> AwsCliGateway<R> {
    pub fn new(runner: R, region: Option<String>) -> Self {
        Self { runner, region }
    }

    /// Verify that a supported `aws` client is installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is missing or older than
    /// [`MIN_CLI_VERSION`].
    pub async fn check_prerequisites(&self) -> anyhow::Result<Version> {
        let output = self
            .runner
            .run("aws", &["--version"])
            .await
            .context("the aws command line client is required. Install it from https://aws.amazon.com/cli/")?;
        let text = format!(
            "{} {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let version = parse_cli_version(&text)
            .with_context(|| format!("cannot parse aws --version output: {}", text.trim()))?;
        anyhow::ensure!(
            version >= MIN_CLI_VERSION,
            "aws client {version} is too old. Version {MIN_CLI_VERSION} or newer is required."
        );
        Ok(version)
    }

    async fn exec(
        &self,
        args: &[&str],
        timeout: Option<Duration>,
        kind: ResourceKind,
        name: &str,
    ) -> GatewayResult<Vec<u8>> {
        let mut argv: Vec<&str> = vec!["--output", "json"];
        if let Some(region) = &self.region {
            argv.extend(["--region", region.as_str()]);
        }
        argv.extend_from_slice(args);

        let output = match timeout {
            Some(timeout) => self.runner.run_with_timeout("aws", &argv, timeout).await,
            None => self.runner.run("aws", &argv).await,
        }?;
        if output.status.success() {
            return Ok(output.stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(?args, %stderr, "aws call failed");
        Err(classify_error(&stderr, kind, name))
    }

    async fn call(&self, args: &[&str], kind: ResourceKind, name: &str) -> GatewayResult<()> {
        self.exec(args, None, kind, name).await.map(drop)
    }

    async fn query<T: DeserializeOwned>(
        &self,
        args: &[&str],
        kind: ResourceKind,
        name: &str,
    ) -> GatewayResult<T> {
        let stdout = self.exec(args, None, kind, name).await?;
        serde_json::from_slice(&stdout)
            .with_context(|| format!("parsing response of aws {}", args[..2.min(args.len())].join(" ")))
            .map_err(GatewayError::from)
    }

    async fn wait(&self, args: &[&str], kind: ResourceKind, name: &str) -> GatewayResult<()> {
        self.exec(args, Some(WAIT_TIMEOUT), kind, name)
            .await
            .map(drop)
    }

    async fn bucket_region(&self) -> Option<String> {
        if let Some(region) = &self.region {
            return Some(region.clone());
        }
        let output = self
            .runner
            .run("aws", &["configure", "get", "region"])
            .await
            .ok()?;
        let region = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (output.status.success() && !region.is_empty()).then_some(region)
    }
}

fn tag_filter(project_id: &str) -> String {
    format!("Name=tag:{TAG_KEY},Values={project_id}")
}

/// `--tag-specifications` value that tags a resource as it is created.
fn tag_specification(resource_type: &str, project_id: &str) -> String {
    format!("ResourceType={resource_type},Tags=[{{Key={TAG_KEY},Value={project_id}}}]")
}

// ── Response shapes ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct HeadObject {
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Subnets {
    subnets: Vec<Subnet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Subnet {
    vpc_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedGroup {
    group_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecurityGroups {
    security_groups: Vec<GroupEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupEntry {
    group_id: String,
    group_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedPolicy {
    policy: PolicyEntry,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Policies {
    policies: Vec<PolicyEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyEntry {
    policy_name: String,
    arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyEntities {
    #[serde(default)]
    policy_roles: Vec<RoleEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedPolicies {
    attached_policies: Vec<AttachedPolicy>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedPolicy {
    policy_name: String,
    policy_arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedRole {
    role: RoleEntry,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Roles {
    roles: Vec<RoleEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleEntry {
    role_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedProfile {
    instance_profile: ProfileEntry,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Profiles {
    instance_profiles: Vec<ProfileEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProfileEntry {
    instance_profile_name: String,
    #[serde(default)]
    roles: Vec<RoleEntry>,
}

impl From<ProfileEntry> for InstanceProfile {
    fn from(entry: ProfileEntry) -> Self {
        Self {
            name: entry.instance_profile_name,
            roles: entry.roles.into_iter().map(|r| r.role_name).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpotRequests {
    spot_instance_requests: Vec<SpotEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpotEntry {
    spot_instance_request_id: String,
    state: String,
    #[serde(default)]
    instance_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservations {
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    instances: Vec<InstanceEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceEntry {
    instance_id: String,
    state: InstanceStateEntry,
    #[serde(default)]
    public_ip_address: Option<String>,
    #[serde(default)]
    private_ip_address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceStateEntry {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStreams {
    #[serde(default)]
    log_streams: Vec<LogStreamEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStreamEntry {
    log_stream_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEvents {
    #[serde(default)]
    events: Vec<LogEventEntry>,
    #[serde(default)]
    next_forward_token: Option<String>,
}

#[derive(Deserialize)]
struct LogEventEntry {
    timestamp: i64,
    message: String,
}

fn spot_request(entry: SpotEntry) -> GatewayResult<SpotRequest> {
    let state = SpotRequestState::parse(&entry.state).ok_or_else(|| {
        GatewayError::Other(anyhow::anyhow!(
            "unknown spot request state '{}'",
            entry.state
        ))
    })?;
    Ok(SpotRequest {
        id: entry.spot_instance_request_id,
        state,
        instance_id: entry.instance_id,
    })
}

// ── Port implementations ──────────────────────────────────────────────────────

impl<R: CommandRunner> AccountInfo for AwsCliGateway<R> {
    async fn account_id(&self) -> GatewayResult<String> {
        let identity: CallerIdentity = self
            .query(&["sts", "get-caller-identity"], ResourceKind::Account, "caller")
            .await?;
        Ok(identity.account)
    }
}

impl<R: CommandRunner> ObjectStore for AwsCliGateway<R> {
    async fn create_bucket(&self, bucket: &str) -> GatewayResult<()> {
        let mut args = vec!["s3api", "create-bucket", "--bucket", bucket];
        let constraint = self
            .bucket_region()
            .await
            .filter(|r| r != DEFAULT_BUCKET_REGION)
            .map(|r| format!("LocationConstraint={r}"));
        if let Some(constraint) = &constraint {
            args.extend(["--create-bucket-configuration", constraint.as_str()]);
        }
        self.call(&args, ResourceKind::Bucket, bucket).await
    }

    async fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool> {
        match self
            .call(
                &["s3api", "head-bucket", "--bucket", bucket],
                ResourceKind::Bucket,
                bucket,
            )
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn object_fingerprint(&self, bucket: &str, key: &str) -> GatewayResult<Option<String>> {
        let head: HeadObject = self
            .query(
                &["s3api", "head-object", "--bucket", bucket, "--key", key],
                ResourceKind::Object,
                key,
            )
            .await?;
        Ok(head.metadata.get("fingerprint").cloned())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &Path,
        fingerprint: &str,
    ) -> GatewayResult<()> {
        let body = body.to_string_lossy();
        let metadata = format!("fingerprint={fingerprint}");
        self.call(
            &[
                "s3api",
                "put-object",
                "--bucket",
                bucket,
                "--key",
                key,
                "--body",
                &body,
                "--metadata",
                &metadata,
            ],
            ResourceKind::Object,
            key,
        )
        .await
    }

    async fn delete_objects(&self, bucket: &str) -> GatewayResult<()> {
        let url = format!("s3://{bucket}");
        self.call(
            &["s3", "rm", &url, "--recursive", "--only-show-errors"],
            ResourceKind::Bucket,
            bucket,
        )
        .await
    }

    async fn delete_bucket(&self, bucket: &str) -> GatewayResult<()> {
        self.call(
            &["s3api", "delete-bucket", "--bucket", bucket],
            ResourceKind::Bucket,
            bucket,
        )
        .await
    }
}

impl<R: CommandRunner> NetworkAcl for AwsCliGateway<R> {
    async fn subnet_vpc(&self, subnet_id: &str) -> GatewayResult<String> {
        let subnets: Subnets = self
            .query(
                &["ec2", "describe-subnets", "--subnet-ids", subnet_id],
                ResourceKind::Subnet,
                subnet_id,
            )
            .await?;
        subnets
            .subnets
            .into_iter()
            .next()
            .map(|s| s.vpc_id)
            .ok_or_else(|| GatewayError::NotFound {
                kind: ResourceKind::Subnet,
                name: subnet_id.to_string(),
            })
    }

    async fn create_security_group(
        &self,
        name: &str,
        description: &str,
        vpc_id: &str,
        project_id: &str,
    ) -> GatewayResult<SecurityGroup> {
        let tags = tag_specification("security-group", project_id);
        let created: CreatedGroup = self
            .query(
                &[
                    "ec2",
                    "create-security-group",
                    "--group-name",
                    name,
                    "--description",
                    description,
                    "--vpc-id",
                    vpc_id,
                    "--tag-specifications",
                    &tags,
                ],
                ResourceKind::SecurityGroup,
                name,
            )
            .await?;
        Ok(SecurityGroup {
            id: created.group_id,
            name: name.to_string(),
        })
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> GatewayResult<()> {
        let port = if rule.from_port == rule.to_port {
            rule.from_port.to_string()
        } else {
            format!("{}-{}", rule.from_port, rule.to_port)
        };
        self.call(
            &[
                "ec2",
                "authorize-security-group-ingress",
                "--group-id",
                group_id,
                "--protocol",
                &rule.protocol,
                "--port",
                &port,
                "--cidr",
                &rule.cidr,
            ],
            ResourceKind::SecurityGroup,
            group_id,
        )
        .await
    }

    async fn security_groups(
        &self,
        project_id: &str,
        name: Option<&str>,
    ) -> GatewayResult<Vec<SecurityGroup>> {
        let tag = tag_filter(project_id);
        let by_name = name.map(|n| format!("Name=group-name,Values={n}"));
        let mut args = vec!["ec2", "describe-security-groups", "--filters", tag.as_str()];
        if let Some(by_name) = &by_name {
            args.push(by_name.as_str());
        }
        let groups: SecurityGroups = self
            .query(&args, ResourceKind::SecurityGroup, project_id)
            .await?;
        Ok(groups
            .security_groups
            .into_iter()
            .map(|g| SecurityGroup {
                id: g.group_id,
                name: g.group_name,
            })
            .collect())
    }

    async fn delete_security_group(&self, group_id: &str) -> GatewayResult<()> {
        self.call(
            &["ec2", "delete-security-group", "--group-id", group_id],
            ResourceKind::SecurityGroup,
            group_id,
        )
        .await
    }
}

impl<R: CommandRunner> ResourceTagger for AwsCliGateway<R> {
    async fn tag_resources(
        &self,
        kind: ResourceKind,
        resource_ids: &[String],
        key: &str,
        value: &str,
    ) -> GatewayResult<()> {
        let tag = format!("Key={key},Value={value}");
        let mut args = vec!["ec2", "create-tags", "--resources"];
        args.extend(resource_ids.iter().map(String::as_str));
        args.extend(["--tags", tag.as_str()]);
        self.call(&args, kind, &resource_ids.join(",")).await
    }
}

impl<R: CommandRunner> IdentityStore for AwsCliGateway<R> {
    async fn create_policy(&self, name: &str, document: &str) -> GatewayResult<Policy> {
        let created: CreatedPolicy = self
            .query(
                &[
                    "iam",
                    "create-policy",
                    "--policy-name",
                    name,
                    "--policy-document",
                    document,
                ],
                ResourceKind::Policy,
                name,
            )
            .await?;
        Ok(Policy {
            name: created.policy.policy_name,
            arn: created.policy.arn,
        })
    }

    async fn list_policies(&self) -> GatewayResult<Vec<Policy>> {
        let listed: Policies = self
            .query(
                &["iam", "list-policies", "--scope", "Local"],
                ResourceKind::Policy,
                "*",
            )
            .await?;
        Ok(listed
            .policies
            .into_iter()
            .map(|p| Policy {
                name: p.policy_name,
                arn: p.arn,
            })
            .collect())
    }

    async fn policy_roles(&self, policy_arn: &str) -> GatewayResult<Vec<String>> {
        let entities: PolicyEntities = self
            .query(
                &[
                    "iam",
                    "list-entities-for-policy",
                    "--policy-arn",
                    policy_arn,
                    "--entity-filter",
                    "Role",
                ],
                ResourceKind::Policy,
                policy_arn,
            )
            .await?;
        Ok(entities
            .policy_roles
            .into_iter()
            .map(|r| r.role_name)
            .collect())
    }

    async fn delete_policy(&self, policy_arn: &str) -> GatewayResult<()> {
        self.call(
            &["iam", "delete-policy", "--policy-arn", policy_arn],
            ResourceKind::Policy,
            policy_arn,
        )
        .await
    }

    async fn create_role(&self, name: &str, trust_document: &str) -> GatewayResult<Role> {
        let created: CreatedRole = self
            .query(
                &[
                    "iam",
                    "create-role",
                    "--role-name",
                    name,
                    "--assume-role-policy-document",
                    trust_document,
                ],
                ResourceKind::Role,
                name,
            )
            .await?;
        Ok(Role {
            name: created.role.role_name,
        })
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()> {
        self.call(
            &[
                "iam",
                "attach-role-policy",
                "--role-name",
                role,
                "--policy-arn",
                policy_arn,
            ],
            ResourceKind::Role,
            role,
        )
        .await
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()> {
        self.call(
            &[
                "iam",
                "detach-role-policy",
                "--role-name",
                role,
                "--policy-arn",
                policy_arn,
            ],
            ResourceKind::Role,
            role,
        )
        .await
    }

    async fn list_roles(&self) -> GatewayResult<Vec<Role>> {
        let listed: Roles = self
            .query(&["iam", "list-roles"], ResourceKind::Role, "*")
            .await?;
        Ok(listed
            .roles
            .into_iter()
            .map(|r| Role { name: r.role_name })
            .collect())
    }

    async fn role_policies(&self, role: &str) -> GatewayResult<Vec<Policy>> {
        let attached: AttachedPolicies = self
            .query(
                &["iam", "list-attached-role-policies", "--role-name", role],
                ResourceKind::Role,
                role,
            )
            .await?;
        Ok(attached
            .attached_policies
            .into_iter()
            .map(|p| Policy {
                name: p.policy_name,
                arn: p.policy_arn,
            })
            .collect())
    }

    async fn delete_role(&self, role: &str) -> GatewayResult<()> {
        self.call(
            &["iam", "delete-role", "--role-name", role],
            ResourceKind::Role,
            role,
        )
        .await
    }

    async fn create_instance_profile(&self, name: &str) -> GatewayResult<InstanceProfile> {
        let created: CreatedProfile = self
            .query(
                &[
                    "iam",
                    "create-instance-profile",
                    "--instance-profile-name",
                    name,
                ],
                ResourceKind::InstanceProfile,
                name,
            )
            .await?;
        Ok(created.instance_profile.into())
    }

    async fn add_role_to_instance_profile(&self, profile: &str, role: &str) -> GatewayResult<()> {
        self.call(
            &[
                "iam",
                "add-role-to-instance-profile",
                "--instance-profile-name",
                profile,
                "--role-name",
                role,
            ],
            ResourceKind::InstanceProfile,
            profile,
        )
        .await
    }

    async fn remove_role_from_instance_profile(
        &self,
        profile: &str,
        role: &str,
    ) -> GatewayResult<()> {
        self.call(
            &[
                "iam",
                "remove-role-from-instance-profile",
                "--instance-profile-name",
                profile,
                "--role-name",
                role,
            ],
            ResourceKind::InstanceProfile,
            profile,
        )
        .await
    }

    async fn list_instance_profiles(&self) -> GatewayResult<Vec<InstanceProfile>> {
        let listed: Profiles = self
            .query(
                &["iam", "list-instance-profiles"],
                ResourceKind::InstanceProfile,
                "*",
            )
            .await?;
        Ok(listed
            .instance_profiles
            .into_iter()
            .map(InstanceProfile::from)
            .collect())
    }

    async fn delete_instance_profile(&self, name: &str) -> GatewayResult<()> {
        self.call(
            &[
                "iam",
                "delete-instance-profile",
                "--instance-profile-name",
                name,
            ],
            ResourceKind::InstanceProfile,
            name,
        )
        .await
    }
}

impl<R: CommandRunner> ComputeFleet for AwsCliGateway<R> {
    async fn request_spot_instance(
        &self,
        spec: &LaunchSpecification,
        spot_price: &str,
        project_id: &str,
    ) -> GatewayResult<String> {
        let launch = spec.to_provider_json().to_string();
        let tags = tag_specification("spot-instances-request", project_id);
        let requested: SpotRequests = self
            .query(
                &[
                    "ec2",
                    "request-spot-instances",
                    "--spot-price",
                    spot_price,
                    "--instance-count",
                    "1",
                    "--launch-specification",
                    &launch,
                    "--tag-specifications",
                    &tags,
                ],
                ResourceKind::SpotRequest,
                &spec.instance_type,
            )
            .await?;
        requested
            .spot_instance_requests
            .into_iter()
            .next()
            .map(|r| r.spot_instance_request_id)
            .ok_or_else(|| {
                GatewayError::Other(anyhow::anyhow!("spot request returned no request id"))
            })
    }

    async fn wait_spot_fulfilled(&self, request_id: &str) -> GatewayResult<()> {
        self.wait(
            &[
                "ec2",
                "wait",
                "spot-instance-request-fulfilled",
                "--spot-instance-request-ids",
                request_id,
            ],
            ResourceKind::SpotRequest,
            request_id,
        )
        .await
    }

    async fn describe_spot_requests(
        &self,
        request_ids: &[String],
    ) -> GatewayResult<Vec<SpotRequest>> {
        let mut args = vec![
            "ec2",
            "describe-spot-instance-requests",
            "--spot-instance-request-ids",
        ];
        args.extend(request_ids.iter().map(String::as_str));
        let described: SpotRequests = self
            .query(&args, ResourceKind::SpotRequest, &request_ids.join(","))
            .await?;
        described
            .spot_instance_requests
            .into_iter()
            .map(spot_request)
            .collect()
    }

    async fn spot_requests(
        &self,
        project_id: &str,
        states: &[SpotRequestState],
    ) -> GatewayResult<Vec<SpotRequest>> {
        let tag = tag_filter(project_id);
        let state = format!(
            "Name=state,Values={}",
            states
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );
        let described: SpotRequests = self
            .query(
                &[
                    "ec2",
                    "describe-spot-instance-requests",
                    "--filters",
                    &tag,
                    &state,
                ],
                ResourceKind::SpotRequest,
                project_id,
            )
            .await?;
        described
            .spot_instance_requests
            .into_iter()
            .map(spot_request)
            .collect()
    }

    async fn cancel_spot_requests(&self, request_ids: &[String]) -> GatewayResult<()> {
        let mut args = vec![
            "ec2",
            "cancel-spot-instance-requests",
            "--spot-instance-request-ids",
        ];
        args.extend(request_ids.iter().map(String::as_str));
        self.call(&args, ResourceKind::SpotRequest, &request_ids.join(","))
            .await
    }

    async fn instances(
        &self,
        project_id: &str,
        states: &[InstanceState],
    ) -> GatewayResult<Vec<Instance>> {
        let tag = tag_filter(project_id);
        let state = format!(
            "Name=instance-state-name,Values={}",
            states
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );
        let described: Reservations = self
            .query(
                &["ec2", "describe-instances", "--filters", &tag, &state],
                ResourceKind::Instance,
                project_id,
            )
            .await?;
        let mut instances = Vec::new();
        for entry in described
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
        {
            let Some(state) = InstanceState::parse(&entry.state.name) else {
                tracing::warn!(instance = %entry.instance_id, state = %entry.state.name, "skipping instance in unknown state");
                continue;
            };
            instances.push(Instance {
                id: entry.instance_id,
                state,
                public_ip: entry.public_ip_address,
                private_ip: entry.private_ip_address,
            });
        }
        Ok(instances)
    }

    async fn terminate_instance(&self, instance_id: &str) -> GatewayResult<()> {
        self.call(
            &["ec2", "terminate-instances", "--instance-ids", instance_id],
            ResourceKind::Instance,
            instance_id,
        )
        .await
    }

    async fn wait_terminated(&self, instance_id: &str) -> GatewayResult<()> {
        self.wait(
            &[
                "ec2",
                "wait",
                "instance-terminated",
                "--instance-ids",
                instance_id,
            ],
            ResourceKind::Instance,
            instance_id,
        )
        .await
    }
}

impl<R: CommandRunner> LogStore for AwsCliGateway<R> {
    async fn create_log_group(&self, group: &str) -> GatewayResult<()> {
        self.call(
            &["logs", "create-log-group", "--log-group-name", group],
            ResourceKind::LogGroup,
            group,
        )
        .await
    }

    async fn latest_log_stream(&self, group: &str) -> GatewayResult<Option<String>> {
        let streams: LogStreams = self
            .query(
                &[
                    "logs",
                    "describe-log-streams",
                    "--log-group-name",
                    group,
                    "--order-by",
                    "LogStreamName",
                    "--descending",
                    "--max-items",
                    "1",
                ],
                ResourceKind::LogGroup,
                group,
            )
            .await?;
        Ok(streams
            .log_streams
            .into_iter()
            .next()
            .map(|s| s.log_stream_name))
    }

    async fn log_events(
        &self,
        group: &str,
        stream: &str,
        next_token: Option<&str>,
    ) -> GatewayResult<LogPage> {
        let mut args = vec![
            "logs",
            "get-log-events",
            "--log-group-name",
            group,
            "--log-stream-name",
            stream,
            "--start-from-head",
        ];
        if let Some(token) = next_token {
            args.extend(["--next-token", token]);
        }
        let page: LogEvents = self
            .query(&args, ResourceKind::LogStream, stream)
            .await?;
        Ok(LogPage {
            events: page
                .events
                .into_iter()
                .map(|e| LogEvent {
                    timestamp: e.timestamp,
                    message: e.message,
                })
                .collect(),
            next_token: page.next_forward_token,
        })
    }

    async fn delete_log_group(&self, group: &str) -> GatewayResult<()> {
        self.call(
            &["logs", "delete-log-group", "--log-group-name", group],
            ResourceKind::LogGroup,
            group,
        )
        .await
    }
}
