//! # OAuth federation: shared authorization-code flow
//!
//! [`OAuthHandler`] is a closed set of provider variants ([`GoogleOAuth`],
//! [`FacebookOAuth`]) behind one capability interface:
//!
//! 1. **[`initiate`](OAuthHandler::initiate)**: builds the provider authorization URL
//!    with a random CSRF state and a PKCE (S256) challenge, using only the provider's
//!    basic-profile scopes. The returned [`PendingAuthorization`] holds the state,
//!    verifier and a 10-minute expiry. The caller stores it in the client's anonymous
//!    session.
//!
//! 2. **[`callback`](OAuthHandler::callback)**: validates the provider's redirect
//!    against the pending record (single use, matching provider and state, not
//!    expired). It then exchanges the code + verifier for an access token, fetches the
//!    provider profile, and hands the identity to the [`AccountResolver`]. Provider
//!    denial, bad state, HTTP failures and timeouts all surface as
//!    [`AuthError::ProviderAuthFailure`].
//!
//! The token and profile calls share one `reqwest` client with a bounded timeout. It
//! never follows redirects.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeChallenge,
    PkceCodeVerifier, Scope, TokenResponse,
};
use serde::{Deserialize, Serialize};

use super::config::OAuthConfig;
use super::facebook::{self, FacebookOAuth};
use super::google::{self, GoogleOAuth};
use super::resolver::{AccountResolver, FederatedIdentity, Identity};
use crate::config::Settings;
use crate::error::AuthError;
use crate::models::{Provider, User};

/// How long a started authorization stays redeemable.
const PENDING_TTL_MINUTES: i64 = 10;

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// An authorization started by [`OAuthHandler::initiate`], kept in the session until
/// the provider redirects back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub provider: Provider,
    pub csrf_state: String,
    pub pkce_verifier: String,
    pub expires_at: DateTime<Utc>,
}

/// Where to send the browser, plus the record needed to finish the flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub pending: PendingAuthorization,
}

/// Query parameters of the provider's redirect back to us.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationResult {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum OAuthHandler {
    Google(GoogleOAuth),
    Facebook(FacebookOAuth),
}

impl OAuthHandler {
    pub fn new(provider: Provider, config: OAuthConfig) -> Self {
        match provider {
            Provider::Google => Self::Google(GoogleOAuth::new(config)),
            Provider::Facebook => Self::Facebook(FacebookOAuth::new(config)),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            Self::Google(_) => Provider::Google,
            Self::Facebook(_) => Provider::Facebook,
        }
    }

    fn config(&self) -> &OAuthConfig {
        match self {
            Self::Google(g) => g.config(),
            Self::Facebook(f) => f.config(),
        }
    }

    fn scopes(&self) -> &'static [&'static str] {
        match self {
            Self::Google(_) => google::SCOPES,
            Self::Facebook(_) => facebook::SCOPES,
        }
    }

    fn create_client(&self) -> ConfiguredClient {
        let config = self.config();
        BasicClient::new(config.client_id.clone())
            .set_client_secret(config.client_secret.clone())
            .set_auth_uri(config.auth_url.clone())
            .set_token_uri(config.token_url.clone())
            .set_redirect_uri(config.redirect_url.clone())
            .set_auth_type(AuthType::RequestBody)
    }

    /// Generate the authorization URL with PKCE.
    pub fn initiate(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .create_client()
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes().iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(pkce_challenge)
            .url();

        AuthorizationRequest {
            url: auth_url.to_string(),
            pending: PendingAuthorization {
                provider: self.provider(),
                csrf_state: csrf_state.secret().clone(),
                pkce_verifier: pkce_verifier.secret().clone(),
                expires_at: Utc::now() + chrono::Duration::minutes(PENDING_TTL_MINUTES),
            },
        }
    }

    /// Finish the flow and resolve the provider identity to a stored user.
    pub async fn callback(
        &self,
        http: &reqwest::Client,
        result: AuthorizationResult,
        pending: Option<PendingAuthorization>,
        resolver: &AccountResolver,
    ) -> Result<User, AuthError> {
        let identity = self.exchange(http, result, pending).await?;
        resolver.resolve(Identity::Federated(identity)).await
    }

    async fn exchange(
        &self,
        http: &reqwest::Client,
        result: AuthorizationResult,
        pending: Option<PendingAuthorization>,
    ) -> Result<FederatedIdentity, AuthError> {
        let failure = |reason: &str| AuthError::ProviderAuthFailure(reason.to_string());

        if let Some(error) = result.error {
            return Err(AuthError::ProviderAuthFailure(format!(
                "{} denied authorization: {}",
                self.provider(),
                error
            )));
        }
        let code = result.code.ok_or_else(|| failure("callback missing code"))?;
        let state = result.state.ok_or_else(|| failure("callback missing state"))?;

        let pending = pending.ok_or_else(|| failure("no authorization in progress"))?;
        if pending.provider != self.provider()
            || pending.expires_at <= Utc::now()
            || !state_matches(&pending.csrf_state, &state)
        {
            return Err(failure("Invalid or expired OAuth state"));
        }

        let token_result = self
            .create_client()
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier))
            .request_async(http)
            .await
            .map_err(|e| AuthError::ProviderAuthFailure(format!("Token exchange failed: {}", e)))?;

        let access_token = token_result.access_token().secret();

        match self {
            Self::Google(g) => g.fetch_profile(http, access_token).await,
            Self::Facebook(f) => f.fetch_profile(http, access_token).await,
        }
    }
}

fn state_matches(expected: &str, received: &str) -> bool {
    expected.len() == received.len()
        && expected
            .bytes()
            .zip(received.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// The configured providers, keyed by [`Provider`], sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    handlers: HashMap<Provider, OAuthHandler>,
    http: reqwest::Client,
}

impl ProviderRegistry {
    /// Register every provider that has client credentials in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, AuthError> {
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(settings.auth.provider_timeout_secs))
            .build()
            .map_err(|e| AuthError::Configuration(format!("HTTP client: {}", e)))?;

        let mut handlers = HashMap::new();
        for provider in Provider::ALL {
            if let Some(config) = OAuthConfig::for_provider(settings, provider)? {
                tracing::info!(%provider, "OAuth provider enabled");
                handlers.insert(provider, OAuthHandler::new(provider, config));
            }
        }

        Ok(Self { handlers, http })
    }

    pub fn get(&self, provider: Provider) -> Option<&OAuthHandler> {
        self.handlers.get(&provider)
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
