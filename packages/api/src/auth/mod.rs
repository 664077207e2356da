//! Authentication: local credentials, OAuth federation, sessions and the access guard.

mod config;
mod credential;
mod facebook;
mod google;
mod guard;
mod oauth;
mod password;
mod resolver;
mod session;

pub use config::OAuthConfig;
pub use credential::{CredentialProtector, PasswordDigest};
pub use facebook::FacebookOAuth;
pub use google::GoogleOAuth;
pub use guard::AuthUser;
pub use oauth::{
    AuthorizationRequest, AuthorizationResult, OAuthHandler, PendingAuthorization,
    ProviderRegistry,
};
pub use resolver::{AccountResolver, FederatedIdentity, Identity};
pub use session::{session_layer, SessionManager, OAUTH_PENDING_KEY, SESSION_USER_ID_KEY};
