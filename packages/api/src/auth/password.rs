//! Argon2id password hashing, the default credential profile.
//!
//! Digests are PHC strings (`$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`), so the salt
//! and cost parameters travel with the digest and verification only needs the digest
//! and the candidate.

use argon2::password_hash::{self, rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

/// Hash `password` under a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(digest.to_string())
}

/// Check `password` against a stored PHC digest.
///
/// A wrong password is `Ok(false)`; `Err` means the digest itself could not be parsed
/// or uses parameters this build does not support.
pub fn verify_password(password: &str, digest: &str) -> Result<bool, password_hash::Error> {
    let parsed = PasswordHash::new(digest)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}
