//! Error taxonomy shared by the store, the auth components, and the routes.
//!
//! Everything that can go wrong during authentication is an [`AuthError`]. The routes
//! turn the authentication failures into redirects. Only [`AuthError::StoreUnavailable`]
//! ever reaches the client as a server error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username is already taken")]
    DuplicateUsername,

    /// Generic rejection, never says which half of the credential was wrong.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("provider authentication failed: {0}")]
    ProviderAuthFailure(String),

    #[error("provider profile is missing the external id")]
    ProviderProfileIncomplete,

    #[error("account resolution conflict: {0}")]
    ResolutionConflict(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// A field-encrypted value could not be produced or read back.
    #[error("field cipher failure: {0}")]
    Cipher(&'static str),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Stable code placed in the `?error=` query of redirects back to a login surface.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::DuplicateUsername => "duplicate_username",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::ProviderAuthFailure(_)
            | AuthError::ProviderProfileIncomplete
            | AuthError::ResolutionConflict(_) => "oauth_error",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::Cipher(_) => "cipher_error",
            AuthError::StoreUnavailable(_) => "store_unavailable",
            AuthError::Configuration(_) => "config_error",
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::StoreUnavailable(e.to_string())
    }
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(e: tower_sessions::session::Error) -> Self {
        AuthError::StoreUnavailable(format!("session store: {}", e))
    }
}
