//! OAuth provider configuration built from [`Settings`].

use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};

use crate::config::{ProviderSettings, Settings};
use crate::error::AuthError;
use crate::models::Provider;

/// OAuth provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
    pub userinfo_url: String,
}

struct Endpoints {
    auth: &'static str,
    token: &'static str,
    userinfo: &'static str,
}

const GOOGLE: Endpoints = Endpoints {
    auth: "https://accounts.google.com/o/oauth2/v2/auth",
    token: "https://oauth2.googleapis.com/token",
    userinfo: "https://www.googleapis.com/oauth2/v2/userinfo",
};

const FACEBOOK: Endpoints = Endpoints {
    auth: "https://www.facebook.com/v19.0/dialog/oauth",
    token: "https://graph.facebook.com/v19.0/oauth/access_token",
    userinfo: "https://graph.facebook.com/me?fields=id,name",
};

impl OAuthConfig {
    /// Config for `provider`, or `None` when it has no client credentials configured.
    pub fn for_provider(settings: &Settings, provider: Provider) -> Result<Option<Self>, AuthError> {
        let (section, defaults) = match provider {
            Provider::Google => (settings.google.as_ref(), &GOOGLE),
            Provider::Facebook => (settings.facebook.as_ref(), &FACEBOOK),
        };
        let Some(section) = section else {
            return Ok(None);
        };

        let redirect = format!(
            "{}/auth/{}/callback",
            settings.server.public_url.trim_end_matches('/'),
            provider
        );
        Self::build(section, defaults, redirect).map(Some)
    }

    fn build(
        section: &ProviderSettings,
        defaults: &Endpoints,
        redirect: String,
    ) -> Result<Self, AuthError> {
        let invalid = |what: &str, e: oauth2::url::ParseError| {
            AuthError::Configuration(format!("Invalid {} URL: {}", what, e))
        };

        let auth_url = section.auth_url.as_deref().unwrap_or(defaults.auth);
        let token_url = section.token_url.as_deref().unwrap_or(defaults.token);

        Ok(Self {
            client_id: ClientId::new(section.client_id.clone()),
            client_secret: ClientSecret::new(section.client_secret.clone()),
            auth_url: AuthUrl::new(auth_url.to_string()).map_err(|e| invalid("authorization", e))?,
            token_url: TokenUrl::new(token_url.to_string()).map_err(|e| invalid("token", e))?,
            redirect_url: RedirectUrl::new(redirect).map_err(|e| invalid("redirect", e))?,
            userinfo_url: section
                .userinfo_url
                .clone()
                .unwrap_or_else(|| defaults.userinfo.to_string()),
        })
    }
}
