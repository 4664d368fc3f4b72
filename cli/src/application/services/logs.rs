//! Reading the remote log stream of a project.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{LogStore, ProgressReporter};
use crate::domain::LogEvent;

/// Delay between polls when following a stream.
pub const FOLLOW_INTERVAL: Duration = Duration::from_secs(5);

/// Name of the newest stream in `group`, or `None` with a hint when there is
/// nothing to read.
///
/// # Errors
///
/// Returns an error for gateway failures other than a missing group.
pub async fn latest_stream(
    logs: &impl LogStore,
    reporter: &impl ProgressReporter,
    group: &str,
) -> Result<Option<String>> {
    match logs.latest_log_stream(group).await {
        Ok(Some(stream)) => Ok(Some(stream)),
        Ok(None) => {
            reporter.warn("No log streams found. Start the project with 'bokchoi run' first.");
            Ok(None)
        }
        Err(e) if e.is_not_found() => {
            reporter.warn(&format!(
                "Log group {group} does not exist. Deploy the project with 'bokchoi deploy' first."
            ));
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("looking up streams of {group}")),
    }
}

/// Print every event of `stream` through `sink`, oldest first.
///
/// With `follow`, keeps polling every `interval` after the stream is
/// drained; otherwise returns once a read yields no events.
///
/// # Errors
///
/// Returns an error if a page cannot be read.
pub async fn tail(
    logs: &impl LogStore,
    group: &str,
    stream: &str,
    follow: bool,
    interval: Duration,
    mut sink: impl FnMut(&LogEvent),
) -> Result<()> {
    let mut token: Option<String> = None;
    loop {
        let page = logs
            .log_events(group, stream, token.as_deref())
            .await
            .with_context(|| format!("reading {group}/{stream}"))?;
        // Keep the token of the last page that produced events.
        if page.events.is_empty() {
            if !follow {
                return Ok(());
            }
            tokio::time::sleep(interval).await;
            continue;
        }
        for event in &page.events {
            sink(event);
        }
        token = page.next_token.or(token);
    }
}
