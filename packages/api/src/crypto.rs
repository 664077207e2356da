//! # Field encryption: legacy reversible credential storage
//!
//! Some older deployments stored local passwords encrypted under a static server key
//! rather than hashed. [`FieldCipher`] keeps that profile available for compatibility.
//! It is **not** the default: anyone holding the key can recover every password, so
//! new deployments should stay on the Argon2 profile in [`crate::auth::password`].
//!
//! ## Key
//!
//! A 32-byte symmetric key given as 64 hex characters (`auth.encryption_key`). It is
//! the same for every record. Per-record uniqueness comes from the random nonce.
//!
//! ## Encoding
//!
//! AES-256-GCM with a fresh random 12-byte nonce. The stored value is
//! `hex(nonce ‖ ciphertext ‖ tag)`, so a single text column holds everything needed
//! to decrypt.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::AuthError;

const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher bound to the deployment's static field key.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

impl FieldCipher {
    /// Parse and validate a 64 hex-char key.
    pub fn from_hex(hex_key: &str) -> Result<Self, AuthError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| AuthError::Configuration(format!("Invalid encryption key hex: {}", e)))?;
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            AuthError::Configuration(format!(
                "Encryption key must be 64 hex chars (32 bytes), got {} bytes",
                bytes.len()
            ))
        })?;
        Ok(Self { key })
    }

    fn cipher(&self) -> Result<Aes256Gcm, AuthError> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AuthError::Configuration(format!("Failed to create cipher: {}", e)))
    }

    /// Encrypt `plaintext` under a fresh nonce and return the hex encoding.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, AuthError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| AuthError::Cipher("encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt).
    ///
    /// Bad hex, truncated input, a different key and tampering all fail with
    /// [`AuthError::Cipher`]. The error never carries plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, AuthError> {
        let raw = hex::decode(encoded).map_err(|_| AuthError::Cipher("ciphertext is not hex"))?;
        if raw.len() <= NONCE_LEN {
            return Err(AuthError::Cipher("ciphertext too short"));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

        self.cipher()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthError::Cipher("decryption failed"))
    }
}
