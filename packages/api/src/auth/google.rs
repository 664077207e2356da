//! # Google OAuth 2.0 provider
//!
//! The Google variant of [`super::OAuthHandler`]. The authorization-code flow itself is
//! shared (see [`super::oauth`]); this module only contributes what is Google-specific:
//!
//! - the requested scope, `profile` (basic profile only, no offline access);
//! - the profile fetch from the userinfo endpoint
//!   (`googleapis.com/oauth2/v2/userinfo`), mapped onto a [`FederatedIdentity`] with
//!   Google's stable numeric `id` as the external id.

use serde::Deserialize;

use super::config::OAuthConfig;
use super::resolver::FederatedIdentity;
use crate::error::AuthError;
use crate::models::Provider;

pub(crate) const SCOPES: &[&str] = &["profile"];

/// Google user info from API.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    #[serde(default)]
    id: Option<String>,
    name: Option<String>,
}

/// Google OAuth handler.
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    config: OAuthConfig,
}

impl GoogleOAuth {
    pub fn new(config: OAuthConfig) -> Self {
        Self { config }
    }

    pub(crate) fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Fetch the signed-in user's profile with a freshly issued access token.
    pub(crate) async fn fetch_profile(
        &self,
        http: &reqwest::Client,
        access_token: &str,
    ) -> Result<FederatedIdentity, AuthError> {
        let google_user: GoogleUser = http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::ProviderAuthFailure(format!("Google userinfo: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::ProviderAuthFailure(format!("Google userinfo body: {}", e)))?;

        Ok(FederatedIdentity {
            provider: Provider::Google,
            external_id: google_user.id.unwrap_or_default(),
            profile_name: google_user.name,
        })
    }
}
