//! Project identity and the resource naming convention derived from it.
//!
//! Every resource a project owns is found again by this convention: taggable
//! resources carry `bokchoi-id = <project_id>`, IAM entities and the bucket
//! are named `<project_id>` or `<project_id>` plus a policy suffix.

use crate::domain::error::ProjectError;

const DEFAULT_POLICY_SUFFIX: &str = "-default-policy";
const CUSTOM_POLICY_SUFFIX: &str = "-custom-policy";
const POLICY_SUFFIXES: [&str; 2] = [DEFAULT_POLICY_SUFFIX, CUSTOM_POLICY_SUFFIX];

/// A deployable project bound to one cloud account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    name: String,
    id: String,
}

impl Project {
    /// Derive the project identity from its name and the caller's account id.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the derived id is not a
    /// usable bucket name.
    pub fn new(name: &str, account_id: &str) -> Result<Self, ProjectError> {
        validate_project_name(name)?;
        let id = project_id(name, account_id);
        validate_project_id(&id)?;
        Ok(Self {
            name: name.to_string(),
            id,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The deterministic id used as tag value and name fragment.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn package_name(&self) -> String {
        format!("bokchoi-{}.zip", self.name)
    }

    #[must_use]
    pub fn role_name(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn instance_profile_name(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn security_group_name(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn log_group(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn default_policy_name(&self) -> String {
        format!("{}{DEFAULT_POLICY_SUFFIX}", self.id)
    }

    #[must_use]
    pub fn custom_policy_name(&self) -> String {
        format!("{}{CUSTOM_POLICY_SUFFIX}", self.id)
    }

    /// `true` if `resource_name` is one of the names this project derives.
    ///
    /// Matching is exact, so `a-123` does not claim `ba-123` or
    /// `a-123-x-123-default-policy`.
    #[must_use]
    pub fn owns_name(&self, resource_name: &str) -> bool {
        match resource_name.strip_prefix(self.id.as_str()) {
            Some("") => true,
            Some(rest) => POLICY_SUFFIXES.contains(&rest),
            None => false,
        }
    }
}

/// Combine project name and account id into the project id.
#[must_use]
pub fn project_id(name: &str, account_id: &str) -> String {
    format!("{name}-{account_id}").to_lowercase()
}

/// Project names: lowercase alphanumerics and `-`, not starting or ending with `-`.
///
/// # Errors
///
/// Returns an error if the name does not match.
pub fn validate_project_name(name: &str) -> Result<(), ProjectError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(ProjectError::InvalidName(name.to_string()))
    }
}

/// The project id doubles as bucket name, so it must satisfy bucket rules.
///
/// # Errors
///
/// Returns an error if the id is too short, too long, or has illegal characters.
pub fn validate_project_id(id: &str) -> Result<(), ProjectError> {
    let valid = (3..=63).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && id.starts_with(|c: char| c.is_ascii_alphanumeric())
        && id.ends_with(|c: char| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ProjectError::InvalidId(id.to_string()))
    }
}
