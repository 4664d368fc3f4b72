//! Cloud resource value types shared by the gateway port and the services.
//!
//! Pure data: no I/O, no async.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag key carried by every taggable resource owned by a project.
pub const TAG_KEY: &str = "bokchoi-id";

// ── Execution mode ────────────────────────────────────────────────────────────

/// Whether mutating gateway calls are issued or only narrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Apply,
    DryRun,
}

impl ExecutionMode {
    #[must_use]
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Apply }
    }

    #[must_use]
    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }
}

// ── Resource kinds ────────────────────────────────────────────────────────────

/// Resource category, used for error messages and narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Account,
    Bucket,
    Object,
    Subnet,
    SecurityGroup,
    Policy,
    Role,
    InstanceProfile,
    SpotRequest,
    Instance,
    LogGroup,
    LogStream,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Account => "account",
            Self::Bucket => "bucket",
            Self::Object => "object",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security group",
            Self::Policy => "policy",
            Self::Role => "role",
            Self::InstanceProfile => "instance profile",
            Self::SpotRequest => "spot request",
            Self::Instance => "instance",
            Self::LogGroup => "log group",
            Self::LogStream => "log stream",
        };
        f.write_str(s)
    }
}

// ── Compute ───────────────────────────────────────────────────────────────────

/// EC2 instance lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    /// States in which an instance still belongs to a deployment.
    pub const LIVE: [Self; 4] = [Self::Pending, Self::Running, Self::Stopping, Self::Stopped];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "shutting-down" => Some(Self::ShuttingDown),
            "terminated" => Some(Self::Terminated),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub id: String,
    pub state: InstanceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
}

impl Instance {
    /// Address to connect to: public if assigned, private otherwise.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.public_ip.as_deref().or(self.private_ip.as_deref())
    }
}

/// Spot request state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotRequestState {
    Open,
    Active,
    Closed,
    Cancelled,
    Failed,
}

impl SpotRequestState {
    /// States in which a request can still be cancelled.
    pub const CANCELLABLE: [Self; 2] = [Self::Open, Self::Active];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A spot instance request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotRequest {
    pub id: String,
    pub state: SpotRequestState,
    pub instance_id: Option<String>,
}

/// Launch parameters for a spot request.
///
/// Field names follow the project config file; [`LaunchSpecification::to_provider_json`]
/// produces the provider's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchSpecification {
    pub image_id: String,
    pub instance_type: String,
    pub subnet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    #[serde(skip)]
    pub user_data: Option<String>,
    #[serde(skip)]
    pub iam_instance_profile: Option<String>,
}

impl LaunchSpecification {
    /// Render as the provider's `LaunchSpecification` JSON object.
    #[must_use]
    pub fn to_provider_json(&self) -> serde_json::Value {
        let mut spec = serde_json::json!({
            "ImageId": self.image_id,
            "InstanceType": self.instance_type,
            "SubnetId": self.subnet_id,
        });
        if let Some(key) = &self.key_name {
            spec["KeyName"] = serde_json::json!(key);
        }
        if !self.security_group_ids.is_empty() {
            spec["SecurityGroupIds"] = serde_json::json!(self.security_group_ids);
        }
        if let Some(data) = &self.user_data {
            spec["UserData"] = serde_json::json!(data);
        }
        if let Some(profile) = &self.iam_instance_profile {
            spec["IamInstanceProfile"] = serde_json::json!({ "Name": profile });
        }
        spec
    }
}

// ── Network ───────────────────────────────────────────────────────────────────

/// A security group discovered by tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
}

/// A single ingress permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr: String,
}

impl IngressRule {
    /// SSH from exactly one IPv4 address.
    #[must_use]
    pub fn ssh_from(ip: &str) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: 22,
            to_port: 22,
            cidr: format!("{ip}/32"),
        }
    }
}

// ── Identity ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceProfile {
    pub name: String,
    pub roles: Vec<String>,
}

// ── Logs ──────────────────────────────────────────────────────────────────────

/// One log event; `timestamp` is milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp: i64,
    pub message: String,
}

/// One page of log events plus the token for the next forward read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogPage {
    pub events: Vec<LogEvent>,
    pub next_token: Option<String>,
}
