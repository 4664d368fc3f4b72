//! Network infrastructure: implements `PublicAddress` using `spawn_blocking`.

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::PublicAddress;

/// Echo service that answers with the caller's public IPv4 address.
pub const CHECK_IP_URL: &str = "https://checkip.amazonaws.com";

/// Production implementation backed by a plain HTTPS request.
pub struct HttpPublicAddress {
    url: String,
}

impl HttpPublicAddress {
    #[must_use]
    pub fn new() -> Self {
        Self {
            url: CHECK_IP_URL.to_string(),
        }
    }
}

impl Default for HttpPublicAddress {
    fn default() -> Self {
        Self::new()
    }
}

impl PublicAddress for HttpPublicAddress {
    async fn public_ip(&self) -> Result<String> {
        let url = self.url.clone();
        let body = tokio::task::spawn_blocking(move || {
            let agent = ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(10))
                .build();
            agent
                .get(&url)
                .call()
                .with_context(|| format!("requesting {url}"))?
                .into_string()
                .context("reading public address response")
        })
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking panicked: {e}"))??;
        parse_ip(&body)
    }
}

/// Parse the echo service's response body.
///
/// # Errors
///
/// Returns an error if the body is not a single IPv4 address.
pub fn parse_ip(body: &str) -> Result<String> {
    let trimmed = body.trim();
    let ip: Ipv4Addr = trimmed
        .parse()
        .with_context(|| format!("unexpected public address response: {trimmed:?}"))?;
    Ok(ip.to_string())
}
