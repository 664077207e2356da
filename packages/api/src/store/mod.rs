//! # Persistence: credential and secret stores
//!
//! Two async traits define what the auth core and the routes need from storage:
//!
//! | Trait | Owns |
//! |-------|------|
//! | [`CredentialStore`] | `users` rows and their uniqueness rules: `username` globally, `(provider, external_id)` per provider |
//! | [`SecretStore`] | `secrets` rows, each owned by one user |
//!
//! Each has a Postgres implementation ([`PgCredentialStore`], [`PgSecretStore`]) and an
//! in-memory one ([`MemoryCredentialStore`], [`MemorySecretStore`]) for tests and the
//! development backend. Lookups return `Ok(None)` for "not found". Errors are reserved
//! for uniqueness failures and [`AuthError::StoreUnavailable`].
//!
//! The local password digest never appears on [`User`]. The only way to read it is
//! [`CredentialStore::local_credential`], which hands back an opaque
//! [`PasswordDigest`] that can be checked but not displayed.

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::PasswordDigest;
use crate::error::AuthError;
use crate::models::{Provider, Secret, User};

mod memory;
mod postgres;

pub use memory::{MemoryCredentialStore, MemorySecretStore};
pub use postgres::{PgCredentialStore, PgSecretStore};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a local account. Fails with [`AuthError::DuplicateUsername`] and writes
    /// nothing if the username is taken.
    async fn create_local(&self, username: &str, digest: &PasswordDigest)
        -> Result<User, AuthError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, AuthError>;

    /// Atomic find-or-create keyed on `(provider, external_id)`.
    ///
    /// Concurrent callers with the same key all get the same row back. The new account's
    /// username is [`Provider::federated_username`]. If that username already belongs to
    /// a different account, the call fails with [`AuthError::ResolutionConflict`].
    async fn find_or_create_federated(
        &self,
        provider: Provider,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError>;

    /// The local account for `username` together with its stored digest.
    async fn local_credential(
        &self,
        username: &str,
    ) -> Result<Option<(User, PasswordDigest)>, AuthError>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn insert(&self, user_id: Uuid, body: &str) -> Result<Secret, AuthError>;

    /// Secrets owned by `user_id`, oldest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Secret>, AuthError>;
}
