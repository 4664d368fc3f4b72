//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod deployment;
pub mod identity;
pub mod logs;
pub mod tunnel;

use crate::application::ports::ProgressReporter;

/// Narrate a mutation that dry-run mode skipped.
pub(crate) fn skipped(reporter: &impl ProgressReporter, action: &str) {
    reporter.warn(&format!("dry run: would {action}"));
}
