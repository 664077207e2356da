//! # User model
//!
//! Defines the two representations of a user:
//!
//! ## [`User`]
//!
//! The domain view of a row in the `users` table:
//!
//! - `id`: primary key (`UUID v4`), assigned by the store.
//! - `username`: globally unique. Local accounts use the registration name.
//!   Federated accounts use `<provider>:<external id>` (see
//!   [`Provider::federated_username`]). Local names may not contain the separator, so
//!   the two namespaces never meet.
//! - `display_name`: optional label, taken from the provider profile on first login.
//! - `credential`: how the account authenticates: [`Credential::Local`] or
//!   [`Credential::Federated`]. The local password digest is deliberately absent; the
//!   store only hands it to the verification path.
//! - `active`: set at creation; inactive accounts cannot log in.
//! - `created_at` / `updated_at`: maintained by the store.
//!
//! ## [`UserInfo`]
//!
//! A client-safe projection that the HTTP surface serialises. It converts the `Uuid` to a
//! `String` and flattens the credential into a provider name.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separates the provider from the external id in a federated username.
pub const USERNAME_SEPARATOR: char = ':';

/// Identity providers that can federate into this application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::Facebook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }

    /// Username given to an account created from this provider's `external_id`.
    pub fn federated_username(&self, external_id: &str) -> String {
        format!("{}{}{}", self.as_str(), USERNAME_SEPARATOR, external_id)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// How a user proves who they are. Exactly one per user, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Local,
    Federated {
        provider: Provider,
        external_id: String,
    },
}

impl Credential {
    /// Value of the `provider` column.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Credential::Local => "local",
            Credential::Federated { provider, .. } => provider.as_str(),
        }
    }

    pub fn is_federated_as(&self, provider: Provider, external_id: &str) -> bool {
        matches!(
            self,
            Credential::Federated { provider: p, external_id: id }
                if *p == provider && id == external_id
        )
    }
}

/// A stored user record.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub credential: Credential,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name, falling back to the username.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Convert to UserInfo for client consumption.
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.to_string(),
            username: self.username.clone(),
            display_name: self.display_name().to_string(),
            provider: self.credential.provider_name().to_string(),
        }
    }
}

/// User information safe to send to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(display_name: Option<&str>, credential: Credential) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "g-123".to_string(),
            display_name: display_name.map(str::to_string),
            credential,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let u = user(None, Credential::Local);
        assert_eq!(u.display_name(), "g-123");

        let u = user(Some("Alice"), Credential::Local);
        assert_eq!(u.display_name(), "Alice");
    }

    #[test]
    fn test_info_reports_provider() {
        let u = user(
            Some("Alice"),
            Credential::Federated {
                provider: Provider::Google,
                external_id: "g-123".to_string(),
            },
        );
        let info = u.to_info();
        assert_eq!(info.provider, "google");
        assert_eq!(info.display_name, "Alice");
        assert_eq!(info.id, u.id.to_string());

        assert_eq!(user(None, Credential::Local).to_info().provider, "local");
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("google".parse::<Provider>(), Ok(Provider::Google));
        assert_eq!("facebook".parse::<Provider>(), Ok(Provider::Facebook));
        assert!("github".parse::<Provider>().is_err());
        assert_eq!(Provider::Facebook.to_string(), "facebook");
    }

    #[test]
    fn test_federated_username_is_namespaced() {
        assert_eq!(Provider::Google.federated_username("42"), "google:42");
        assert_ne!(
            Provider::Google.federated_username("42"),
            Provider::Facebook.federated_username("42")
        );
    }

    #[test]
    fn test_federated_match_checks_provider_and_id() {
        let c = Credential::Federated {
            provider: Provider::Google,
            external_id: "g-123".to_string(),
        };
        assert!(c.is_federated_as(Provider::Google, "g-123"));
        assert!(!c.is_federated_as(Provider::Facebook, "g-123"));
        assert!(!c.is_federated_as(Provider::Google, "g-124"));
        assert!(!Credential::Local.is_federated_as(Provider::Google, "g-123"));
    }
}
