//! # Account resolver: one stored user per identity
//!
//! [`AccountResolver::resolve`] maps an incoming identity to exactly one stored
//! [`User`]:
//!
//! - **Federated**: look up `(provider, external_id)`. A hit is returned unchanged, so
//!   repeat logins never overwrite a profile field. A miss goes through the store's
//!   atomic find-or-create. Racing callbacks therefore converge on one row. The
//!   returned row is checked against the requested identity. A mismatch is a
//!   [`AuthError::ResolutionConflict`] and is reported, never merged.
//! - **Local**: normalise the username, protect the password with the configured
//!   [`CredentialProtector`], and insert. A taken username fails with
//!   [`AuthError::DuplicateUsername`] before anything is written. Names containing
//!   [`USERNAME_SEPARATOR`] are reserved for federated accounts.
//!
//! [`AccountResolver::authenticate_local`] is the login-side counterpart for local
//! accounts. An unknown username is checked against a decoy digest, so it costs the
//! same as a wrong password.

use std::sync::Arc;

use crate::error::AuthError;
use crate::models::{Provider, User, USERNAME_SEPARATOR};
use crate::store::CredentialStore;

use super::credential::{CredentialProtector, PasswordDigest};

const DECOY_PASSWORD: &str = "unknown-account-decoy";

/// Identity asserted by an OAuth provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: Provider,
    pub external_id: String,
    pub profile_name: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Identity {
    Federated(FederatedIdentity),
    Local { username: String, password: String },
}

#[derive(Clone)]
pub struct AccountResolver {
    store: Arc<dyn CredentialStore>,
    protector: Arc<CredentialProtector>,
    decoy: Arc<PasswordDigest>,
}

/// Usernames are matched case-insensitively and without surrounding whitespace.
fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

impl AccountResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        protector: CredentialProtector,
    ) -> Result<Self, AuthError> {
        let decoy = protector.protect(DECOY_PASSWORD)?;
        Ok(Self {
            store,
            protector: Arc::new(protector),
            decoy: Arc::new(decoy),
        })
    }

    pub async fn resolve(&self, identity: Identity) -> Result<User, AuthError> {
        match identity {
            Identity::Federated(identity) => self.resolve_federated(&identity).await,
            Identity::Local { username, password } => {
                self.register_local(&username, &password).await
            }
        }
    }

    async fn resolve_federated(&self, identity: &FederatedIdentity) -> Result<User, AuthError> {
        let external_id = identity.external_id.trim();
        if external_id.is_empty() {
            return Err(AuthError::ProviderProfileIncomplete);
        }

        if let Some(user) = self
            .store
            .find_by_external_id(identity.provider, external_id)
            .await?
        {
            return Ok(user);
        }

        let profile_name = identity
            .profile_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let user = self
            .store
            .find_or_create_federated(identity.provider, external_id, profile_name)
            .await
            .inspect_err(|e| {
                if let AuthError::ResolutionConflict(reason) = e {
                    tracing::warn!(
                        provider = %identity.provider,
                        "Federated account resolution conflict: {}",
                        reason
                    );
                }
            })?;

        if !user.credential.is_federated_as(identity.provider, external_id) {
            tracing::warn!(
                provider = %identity.provider,
                user_id = %user.id,
                "Find-or-create returned an account bound to a different identity"
            );
            return Err(AuthError::ResolutionConflict(format!(
                "account {} does not belong to the requested {} identity",
                user.id, identity.provider
            )));
        }

        Ok(user)
    }

    async fn register_local(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(AuthError::InvalidInput("Username is required"));
        }
        if username.contains(USERNAME_SEPARATOR) {
            return Err(AuthError::InvalidInput("Username may not contain ':'"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("Password is required"));
        }

        if self.store.find_by_username(&username).await?.is_some() {
            return Err(AuthError::DuplicateUsername);
        }

        let digest = self.protector.protect(password)?;
        // The unique index still arbitrates concurrent registrations.
        let user = self.store.create_local(&username, &digest).await?;
        tracing::info!(user_id = %user.id, "Registered local account");
        Ok(user)
    }

    /// Verify a local username/password pair.
    ///
    /// Every failure is the same [`AuthError::InvalidCredentials`].
    pub async fn authenticate_local(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = normalize_username(username);

        let Some((user, digest)) = self.store.local_credential(&username).await? else {
            let _ = self.protector.verify(password, &self.decoy);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.protector.verify(password, &digest) || !user.active {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }
}
