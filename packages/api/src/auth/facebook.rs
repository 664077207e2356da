//! # Facebook OAuth 2.0 provider
//!
//! Structurally the same as [`super::google`]. The differences are the endpoints, the
//! `public_profile` scope, and the Graph API profile call (`/me?fields=id,name`), whose
//! app-scoped `id` becomes the external id.

use serde::Deserialize;

use super::config::OAuthConfig;
use super::resolver::FederatedIdentity;
use crate::error::AuthError;
use crate::models::Provider;

pub(crate) const SCOPES: &[&str] = &["public_profile"];

/// Facebook Graph API `/me` response.
#[derive(Debug, Deserialize)]
struct FacebookUser {
    #[serde(default)]
    id: Option<String>,
    name: Option<String>,
}

/// Facebook OAuth handler.
#[derive(Debug, Clone)]
pub struct FacebookOAuth {
    config: OAuthConfig,
}

impl FacebookOAuth {
    pub fn new(config: OAuthConfig) -> Self {
        Self { config }
    }

    pub(crate) fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub(crate) async fn fetch_profile(
        &self,
        http: &reqwest::Client,
        access_token: &str,
    ) -> Result<FederatedIdentity, AuthError> {
        let facebook_user: FacebookUser = http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::ProviderAuthFailure(format!("Facebook /me: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::ProviderAuthFailure(format!("Facebook /me body: {}", e)))?;

        Ok(FacebookUser::into_identity(facebook_user))
    }
}

impl FacebookUser {
    fn into_identity(self) -> FederatedIdentity {
        FederatedIdentity {
            provider: Provider::Facebook,
            external_id: self.id.unwrap_or_default(),
            profile_name: self.name,
        }
    }
}
