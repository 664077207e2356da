//! # Application settings
//!
//! [`Settings`] is built once at process start and handed to every component that
//! needs it. Sources are layered with the `config` crate, lowest precedence first:
//!
//! 1. built-in defaults (the `Default` impls below);
//! 2. an optional TOML file (`SECRETS_CONFIG`, default `config.toml`);
//! 3. environment variables prefixed `SECRETS_`, nested with `__`,
//!    e.g. `SECRETS_GOOGLE__CLIENT_ID` or `SECRETS_SESSION__PRODUCTION=true`.
//!
//! A `.env` file is loaded into the environment first via `dotenvy`.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    /// Absent means the in-memory development backend.
    pub database: Option<DatabaseSettings>,
    pub session: SessionSettings,
    pub auth: AuthSettings,
    pub google: Option<ProviderSettings>,
    pub facebook: Option<ProviderSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub address: String,
    /// Externally visible base URL, used to build OAuth redirect URLs.
    pub public_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".into(),
            public_url: "http://localhost:3000".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Inactivity expiry in seconds.
    pub ttl_secs: i64,
    /// Forces the `Secure` cookie attribute.
    pub production: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "secrets.sid".into(),
            ttl_secs: 60 * 60 * 24 * 7,
            production: false,
        }
    }
}

/// How local passwords are protected at rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// Argon2id one-way hash.
    #[default]
    Hash,
    /// Legacy reversible AES-256-GCM encryption under `encryption_key`.
    FieldEncryption,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub credential_mode: CredentialMode,
    /// 64 hex chars; only read in [`CredentialMode::FieldEncryption`].
    pub encryption_key: Option<String>,
    pub provider_timeout_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            credential_mode: CredentialMode::Hash,
            encryption_key: None,
            provider_timeout_secs: 10,
        }
    }
}

/// Client credentials for one OAuth provider, with optional endpoint overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub userinfo_url: Option<String>,
}

impl Settings {
    /// Load settings from `.env`, the optional config file, and `SECRETS_*` variables.
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = std::env::var("SECRETS_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::from_sources(&path, "SECRETS")
    }

    pub(crate) fn from_sources(path: &str, env_prefix: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::{remove_var, set_var};

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.address, "127.0.0.1:3000");
        assert_eq!(settings.session.cookie_name, "secrets.sid");
        assert!(!settings.session.production);
        assert_eq!(settings.auth.credential_mode, CredentialMode::Hash);
        assert!(settings.database.is_none());
        assert!(settings.google.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        set_var("SECRETSTEST_SESSION__PRODUCTION", "true");
        set_var("SECRETSTEST_SESSION__COOKIE_NAME", "sid");
        set_var("SECRETSTEST_GOOGLE__CLIENT_ID", "google-id");
        set_var("SECRETSTEST_GOOGLE__CLIENT_SECRET", "google-secret");
        set_var("SECRETSTEST_AUTH__CREDENTIAL_MODE", "field_encryption");

        let settings = Settings::from_sources("does-not-exist.toml", "SECRETSTEST").unwrap();
        assert!(settings.session.production);
        assert_eq!(settings.session.cookie_name, "sid");
        assert_eq!(settings.session.ttl_secs, 60 * 60 * 24 * 7);
        assert_eq!(
            settings.auth.credential_mode,
            CredentialMode::FieldEncryption
        );

        let google = settings.google.unwrap();
        assert_eq!(google.client_id, "google-id");
        assert!(google.token_url.is_none());
        assert!(settings.facebook.is_none());

        for key in [
            "SECRETSTEST_SESSION__PRODUCTION",
            "SECRETSTEST_SESSION__COOKIE_NAME",
            "SECRETSTEST_GOOGLE__CLIENT_ID",
            "SECRETSTEST_GOOGLE__CLIENT_SECRET",
            "SECRETSTEST_AUTH__CREDENTIAL_MODE",
        ] {
            remove_var(key);
        }
    }
}
