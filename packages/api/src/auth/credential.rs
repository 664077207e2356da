//! Credential protection profiles.
//!
//! [`CredentialProtector`] is the one `protect`/`verify` interface the rest of the crate
//! uses for local passwords. There are two mutually exclusive profiles, chosen by
//! `auth.credential_mode`:
//!
//! - [`CredentialProtector::Hash`] (default): Argon2id via [`super::password`].
//! - [`CredentialProtector::FieldEncryption`]: legacy reversible AES-GCM via
//!   [`crate::crypto::FieldCipher`]. Only for deployments that must read data written
//!   by the old profile.
//!
//! Whatever the profile, the stored value is a [`PasswordDigest`]. Only this crate can
//! see its contents, so a digest that leaves the store can only be checked, never read.

use std::fmt;

use crate::config::{AuthSettings, CredentialMode};
use crate::crypto::FieldCipher;
use crate::error::AuthError;

use super::password::{hash_password, verify_password};

/// Protected form of a local password as it sits in the credential store.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub(crate) fn as_stored(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub enum CredentialProtector {
    Hash,
    FieldEncryption(FieldCipher),
}

impl CredentialProtector {
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        match settings.credential_mode {
            CredentialMode::Hash => Ok(Self::Hash),
            CredentialMode::FieldEncryption => {
                let key = settings.encryption_key.as_deref().ok_or_else(|| {
                    AuthError::Configuration(
                        "credential_mode = field_encryption requires auth.encryption_key"
                            .to_string(),
                    )
                })?;
                tracing::warn!(
                    "Legacy field-encryption credential profile is active; passwords are stored reversibly"
                );
                Ok(Self::FieldEncryption(FieldCipher::from_hex(key)?))
            }
        }
    }

    /// Turn a plaintext password into its stored form.
    pub fn protect(&self, plaintext: &str) -> Result<PasswordDigest, AuthError> {
        let stored = match self {
            Self::Hash => hash_password(plaintext)
                .map_err(|e| AuthError::Configuration(format!("Failed to hash password: {}", e)))?,
            Self::FieldEncryption(cipher) => cipher.encrypt(plaintext.as_bytes())?,
        };
        Ok(PasswordDigest(stored))
    }

    /// Check a candidate password.
    ///
    /// A stored value that this profile cannot read (malformed, written under another
    /// profile or key) counts as a mismatch.
    pub fn verify(&self, candidate: &str, digest: &PasswordDigest) -> bool {
        match self {
            Self::Hash => match verify_password(candidate, &digest.0) {
                Ok(matches) => matches,
                Err(e) => {
                    tracing::warn!("Stored password digest is unreadable: {}", e);
                    false
                }
            },
            Self::FieldEncryption(cipher) => match cipher.decrypt(&digest.0) {
                Ok(stored) => constant_time_eq(&stored, candidate.as_bytes()),
                Err(e) => {
                    tracing::warn!("Stored encrypted credential is unreadable: {}", e);
                    false
                }
            },
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
