//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::auth::{AccountResolver, CredentialProtector, ProviderRegistry, SessionManager};
use crate::config::Settings;
use crate::error::AuthError;
use crate::store::{CredentialStore, SecretStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub resolver: AccountResolver,
    pub sessions: SessionManager,
    pub providers: Arc<ProviderRegistry>,
    pub secrets: Arc<dyn SecretStore>,
}

impl AppState {
    /// Wire the auth components over the given stores.
    ///
    /// Fails with [`AuthError::Configuration`] on a bad encryption key or provider URL.
    pub fn new(
        settings: Settings,
        users: Arc<dyn CredentialStore>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self, AuthError> {
        let protector = CredentialProtector::from_settings(&settings.auth)?;
        let providers = ProviderRegistry::from_settings(&settings)?;

        Ok(Self {
            resolver: AccountResolver::new(users.clone(), protector)?,
            sessions: SessionManager::new(users),
            providers: Arc::new(providers),
            secrets,
            settings: Arc::new(settings),
        })
    }
}
