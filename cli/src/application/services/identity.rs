//! Identity provisioning: idempotent create of policies, roles and instance
//! profiles, and ordered teardown of everything a project owns.
//!
//! Teardown runs policies, then instance profiles, then roles. Each entity is
//! detached from its dependents before it is deleted, and an entity that
//! vanished in between counts as already deleted.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::ports::{IdentityStore, ProgressReporter};
use crate::application::services::skipped;
use crate::domain::{ExecutionMode, InstanceProfile, Policy, Project, Role, ignore_not_found};

/// Names of the IAM entities a teardown deleted (or would delete in dry-run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub policies: Vec<String>,
    pub instance_profiles: Vec<String>,
    pub roles: Vec<String>,
}

/// Creates and removes the IAM entities of one project.
pub struct IdentityProvisioner<'a, G, R> {
    iam: &'a G,
    reporter: &'a R,
}

impl<'a, G: IdentityStore, R: ProgressReporter> IdentityProvisioner<'a, G, R> {
    pub fn new(iam: &'a G, reporter: &'a R) -> Self {
        Self { iam, reporter }
    }

    /// Create a managed policy, or reuse the existing one with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails for any reason other than a
    /// duplicate, or if an existing policy cannot be found by listing.
    pub async fn ensure_policy(&self, name: &str, document: &str) -> Result<Policy> {
        match self.iam.create_policy(name, document).await {
            Ok(policy) => {
                self.reporter.success(&format!("created policy {name}"));
                Ok(policy)
            }
            Err(e) if e.is_already_exists() => {
                self.reporter.step(&format!("policy {name} already exists"));
                let policies = self.iam.list_policies().await.context("listing policies")?;
                policies
                    .into_iter()
                    .find(|p| p.name == name)
                    .with_context(|| format!("policy {name} exists but is not listed"))
            }
            Err(e) => Err(e).with_context(|| format!("creating policy {name}")),
        }
    }

    /// Create a role trusted by `trust_document` and attach `policies`.
    ///
    /// An existing role is left as it is.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails for any reason other than a
    /// duplicate, or a policy cannot be attached.
    pub async fn ensure_role(
        &self,
        name: &str,
        trust_document: &str,
        policies: &[Policy],
    ) -> Result<Role> {
        match self.iam.create_role(name, trust_document).await {
            Ok(role) => {
                for policy in policies {
                    self.iam
                        .attach_role_policy(name, &policy.arn)
                        .await
                        .with_context(|| format!("attaching {} to role {name}", policy.name))?;
                }
                self.reporter.success(&format!("created role {name}"));
                Ok(role)
            }
            Err(e) if e.is_already_exists() => {
                self.reporter.step(&format!("role {name} already exists"));
                Ok(Role {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(e).with_context(|| format!("creating role {name}")),
        }
    }

    /// Create an instance profile, adding `role` to it when freshly created.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails for any reason other than a
    /// duplicate, or the role cannot be added.
    pub async fn ensure_instance_profile(
        &self,
        name: &str,
        role: Option<&str>,
    ) -> Result<InstanceProfile> {
        match self.iam.create_instance_profile(name).await {
            Ok(mut profile) => {
                if let Some(role) = role {
                    self.iam
                        .add_role_to_instance_profile(name, role)
                        .await
                        .with_context(|| format!("adding role {role} to instance profile {name}"))?;
                    profile.roles.push(role.to_string());
                }
                self.reporter
                    .success(&format!("created instance profile {name}"));
                Ok(profile)
            }
            Err(e) if e.is_already_exists() => {
                self.reporter
                    .step(&format!("instance profile {name} already exists"));
                let profiles = self
                    .iam
                    .list_instance_profiles()
                    .await
                    .context("listing instance profiles")?;
                Ok(profiles
                    .into_iter()
                    .find(|p| p.name == name)
                    .unwrap_or_else(|| InstanceProfile {
                        name: name.to_string(),
                        roles: Vec::new(),
                    }))
            }
            Err(e) => Err(e).with_context(|| format!("creating instance profile {name}")),
        }
    }

    /// Delete every policy, instance profile and role named by `project`.
    ///
    /// In dry-run mode the entities are discovered and narrated but nothing
    /// is detached or deleted.
    ///
    /// # Errors
    ///
    /// Returns the first gateway error that is not a `NotFound`.
    pub async fn teardown(&self, project: &Project, mode: ExecutionMode) -> Result<TeardownReport> {
        let mut report = TeardownReport::default();

        let policies = self.iam.list_policies().await.context("listing policies")?;
        for policy in policies.iter().filter(|p| project.owns_name(&p.name)) {
            if mode.is_dry_run() {
                skipped(self.reporter, &format!("delete policy {}", policy.name));
            } else {
                self.delete_policy(policy).await?;
            }
            report.policies.push(policy.name.clone());
        }

        let profiles = self
            .iam
            .list_instance_profiles()
            .await
            .context("listing instance profiles")?;
        for profile in profiles.iter().filter(|p| project.owns_name(&p.name)) {
            if mode.is_dry_run() {
                skipped(
                    self.reporter,
                    &format!("delete instance profile {}", profile.name),
                );
            } else {
                self.delete_instance_profile(profile).await?;
            }
            report.instance_profiles.push(profile.name.clone());
        }

        let roles = self.iam.list_roles().await.context("listing roles")?;
        for role in roles.iter().filter(|r| project.owns_name(&r.name)) {
            if mode.is_dry_run() {
                skipped(self.reporter, &format!("delete role {}", role.name));
            } else {
                self.delete_role(&role.name).await?;
            }
            report.roles.push(role.name.clone());
        }

        Ok(report)
    }

    async fn delete_policy(&self, policy: &Policy) -> Result<()> {
        self.reporter.step(&format!("deleting policy {}", policy.name));
        let roles = match self.iam.policy_roles(&policy.arn).await {
            Ok(roles) => roles,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("listing roles of policy {}", policy.name));
            }
        };
        for role in roles {
            ignore_not_found(self.iam.detach_role_policy(&role, &policy.arn).await)
                .with_context(|| format!("detaching {} from role {role}", policy.name))?;
        }
        if ignore_not_found(self.iam.delete_policy(&policy.arn).await)
            .with_context(|| format!("deleting policy {}", policy.name))?
        {
            self.reporter
                .success(&format!("deleted policy {}", policy.name));
        } else {
            self.reporter
                .step(&format!("policy {} already deleted", policy.name));
        }
        Ok(())
    }

    async fn delete_instance_profile(&self, profile: &InstanceProfile) -> Result<()> {
        self.reporter
            .step(&format!("deleting instance profile {}", profile.name));
        for role in &profile.roles {
            ignore_not_found(
                self.iam
                    .remove_role_from_instance_profile(&profile.name, role)
                    .await,
            )
            .with_context(|| format!("removing role {role} from {}", profile.name))?;
        }
        if ignore_not_found(self.iam.delete_instance_profile(&profile.name).await)
            .with_context(|| format!("deleting instance profile {}", profile.name))?
        {
            self.reporter
                .success(&format!("deleted instance profile {}", profile.name));
        } else {
            self.reporter
                .step(&format!("instance profile {} already deleted", profile.name));
        }
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        self.reporter.step(&format!("deleting role {name}"));
        let attached = match self.iam.role_policies(name).await {
            Ok(policies) => policies,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e).with_context(|| format!("listing policies of role {name}")),
        };
        for policy in attached {
            ignore_not_found(self.iam.detach_role_policy(name, &policy.arn).await)
                .with_context(|| format!("detaching {} from role {name}", policy.name))?;
        }
        if ignore_not_found(self.iam.delete_role(name).await)
            .with_context(|| format!("deleting role {name}"))?
        {
            self.reporter.success(&format!("deleted role {name}"));
        } else {
            self.reporter.step(&format!("role {name} already deleted"));
        }
        Ok(())
    }
}
