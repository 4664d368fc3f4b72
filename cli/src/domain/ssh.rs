//! SSH key material checks.

use anyhow::Result;

/// Validates an OpenSSH public key line before it is embedded in the
/// instance bootstrap script.
///
/// # Errors
///
/// Returns an error if the key type is not ed25519 or RSA, has no key
/// material, or contains characters outside the base64/comment set.
pub fn validate_public_key(key: &str) -> Result<()> {
    let key = key.trim();
    let material = key
        .strip_prefix("ssh-ed25519 ")
        .or_else(|| key.strip_prefix("ssh-rsa "))
        .ok_or_else(|| anyhow::anyhow!("public key must be ed25519 or rsa (got: {key:?})"))?;
    anyhow::ensure!(!material.trim().is_empty(), "public key has no key material");
    anyhow::ensure!(
        key.chars()
            .all(|c| c.is_ascii_alphanumeric() || " +/=@.-_".contains(c)),
        "public key contains invalid characters"
    );
    Ok(())
}
