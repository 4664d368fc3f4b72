//! SSH key management and the SSH tunnel transport.
//!
//! `KeyStore` keeps one key pair per project under `~/.ssh/<project_id>`.
//! `SshTransport` holds one authenticated session and opens a `direct-tcpip`
//! channel per forwarded client.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use tracing::{info, warn};

use crate::application::ports::{CommandRunner, TunnelTransport};
use crate::domain::TunnelError;
use crate::domain::ssh::validate_public_key;

/// Port of the instance's SSH daemon.
pub const SSH_PORT: u16 = 22;

const KEY_TYPE: &str = "rsa";
const KEY_BITS: &str = "2048";

// ── Key store ─────────────────────────────────────────────────────────────────

/// Per-project 2048-bit RSA key pairs generated with `ssh-keygen`.
pub struct KeyStore<R> {
    runner: R,
    dir: PathBuf,
}

impl<R: CommandRunner> KeyStore<R> {
    /// Creates a store in `~/.ssh`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new(runner: R) -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_dir(runner, home.join(".ssh")))
    }

    /// Creates a store in an arbitrary directory (for testing).
    #[must_use]
    pub fn with_dir(runner: R, dir: PathBuf) -> Self {
        Self { runner, dir }
    }

    #[must_use]
    pub fn private_key_path(&self, project_id: &str) -> PathBuf {
        self.dir.join(project_id)
    }

    #[must_use]
    pub fn public_key_path(&self, project_id: &str) -> PathBuf {
        self.dir.join(format!("{project_id}.pub"))
    }

    /// Return the project's public key, generating the pair on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if `ssh-keygen` fails or the key cannot be read.
    pub async fn ensure_key_pair(&self, project_id: &str) -> Result<String> {
        let private = self.private_key_path(project_id);
        if !private.exists() {
            std::fs::create_dir_all(&self.dir)
                .with_context(|| format!("create dir {}", self.dir.display()))?;
            set_permissions(&self.dir, 0o700)?;
            let path = private.to_string_lossy();
            let comment = format!("bokchoi-{project_id}");
            let output = self
                .runner
                .run(
                    "ssh-keygen",
                    &[
                        "-t",
                        KEY_TYPE,
                        "-b",
                        KEY_BITS,
                        "-N",
                        "",
                        "-q",
                        "-C",
                        &comment,
                        "-f",
                        &path,
                    ],
                )
                .await
                .context("running ssh-keygen")?;
            anyhow::ensure!(
                output.status.success(),
                "ssh-keygen failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            set_permissions(&private, 0o600)?;
            info!(path = %private.display(), "generated key pair");
        }
        let public = self.public_key_path(project_id);
        let key = std::fs::read_to_string(&public)
            .with_context(|| format!("read {}", public.display()))?;
        validate_public_key(&key)?;
        Ok(key.trim().to_string())
    }
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// SSH client handler.
struct TunnelClient {
    host: String,
}

#[async_trait]
impl client::Handler for TunnelClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // Spot instances get a fresh host key on every launch.
        warn!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "accepting unverified host key"
        );
        Ok(true)
    }
}

/// One authenticated SSH session shared by all forwarded clients.
pub struct SshTransport {
    session: client::Handle<TunnelClient>,
}

impl SshTransport {
    /// Connect to `host:22` and authenticate as `user` with `key_file`.
    ///
    /// # Errors
    ///
    /// Returns `Connect` when the host is unreachable and
    /// `AuthenticationFailure` when the key cannot be loaded or is refused.
    pub async fn connect(host: &str, user: &str, key_file: &Path) -> Result<Self, TunnelError> {
        let auth_failure = |reason: String| TunnelError::AuthenticationFailure {
            user: user.to_string(),
            reason,
        };
        let key = russh_keys::load_secret_key(key_file, None)
            .map_err(|e| auth_failure(format!("cannot load {}: {e}", key_file.display())))?;

        info!(%host, port = SSH_PORT, %user, "connecting");
        let config = Arc::new(client::Config::default());
        let handler = TunnelClient {
            host: host.to_string(),
        };
        let mut session = client::connect(config, (host, SSH_PORT), handler)
            .await
            .map_err(|e| TunnelError::Connect {
                host: host.to_string(),
                port: SSH_PORT,
                reason: e.to_string(),
            })?;

        let accepted = session
            .authenticate_publickey(user, Arc::new(key))
            .await
            .map_err(|e| auth_failure(e.to_string()))?;
        if !accepted {
            return Err(auth_failure("public key rejected".to_string()));
        }
        info!(%host, "session established");
        Ok(Self { session })
    }
}

impl TunnelTransport for SshTransport {
    type Channel = Pin<Box<russh::ChannelStream<client::Msg>>>;

    fn open_channel(
        &self,
        host: &str,
        port: u16,
        originator: SocketAddr,
    ) -> impl Future<Output = Result<Self::Channel, TunnelError>> + Send {
        let host = host.to_string();
        async move {
            let channel = self
                .session
                .channel_open_direct_tcpip(
                    host.clone(),
                    u32::from(port),
                    originator.ip().to_string(),
                    u32::from(originator.port()),
                )
                .await
                .map_err(|e| TunnelError::ChannelRejected {
                    host,
                    port,
                    reason: e.to_string(),
                })?;
            Ok(Box::pin(channel.into_stream()))
        }
    }
}
