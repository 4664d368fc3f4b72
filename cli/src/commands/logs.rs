//! `bokchoi logs [--follow]`: print the most recent log stream.

use anyhow::Result;
use chrono::DateTime;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::logs::{FOLLOW_INTERVAL, latest_stream, tail};
use crate::domain::LogEvent;

/// Arguments for the logs command.
#[derive(Args)]
pub struct LogsArgs {
    /// Keep polling for new events
    #[arg(short, long)]
    pub follow: bool,
}

/// Run the logs command.
///
/// # Errors
///
/// Returns an error if the log stream cannot be read.
pub async fn run(app: &AppContext, args: &LogsArgs) -> Result<()> {
    let session = app.session().await?;
    let reporter = app.reporter();
    let group = session.project.log_group();
    let Some(stream) = latest_stream(&session.gateway, &reporter, group).await? else {
        return Ok(());
    };
    tracing::debug!(group, %stream, follow = args.follow, "reading log stream");

    let json = app.is_json();
    tail(
        &session.gateway,
        group,
        &stream,
        args.follow,
        FOLLOW_INTERVAL,
        |event| {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "timestamp": event.timestamp,
                        "message": event.message,
                    })
                );
            } else {
                println!("{}", format_event(event));
            }
        },
    )
    .await
}

/// `2024-05-01 12:00:00 message`, in UTC.
#[must_use]
pub fn format_event(event: &LogEvent) -> String {
    let message = event.message.trim_end();
    match DateTime::from_timestamp_millis(event.timestamp) {
        Some(at) => format!("{} {message}", at.format("%Y-%m-%d %H:%M:%S")),
        None => message.to_string(),
    }
}
