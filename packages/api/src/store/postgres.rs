//! Postgres-backed stores.
//!
//! Uniqueness is enforced by the schema in `migrations/` rather than by read-then-write
//! checks:
//!
//! - `users_username_key`: `UNIQUE (username)`
//! - `users_provider_external_id_key`: `UNIQUE (provider, external_id)`
//!
//! Federated find-or-create is a single `INSERT … ON CONFLICT (provider, external_id)
//! DO NOTHING RETURNING *`. The loser of a race gets no row back and reads the
//! winner's.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{CredentialStore, SecretStore};
use crate::auth::PasswordDigest;
use crate::error::AuthError;
use crate::models::{Credential, Provider, Secret, User};

const USERNAME_CONSTRAINT: &str = "users_username_key";

/// Full row from the `users` table.
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    display_name: Option<String>,
    provider: String,
    external_id: Option<String>,
    password_digest: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_parts(self) -> Result<(User, Option<PasswordDigest>), AuthError> {
        let credential = match (self.provider.as_str(), self.external_id) {
            ("local", _) => Credential::Local,
            (provider, Some(external_id)) => Credential::Federated {
                provider: provider
                    .parse()
                    .map_err(|e: String| AuthError::StoreUnavailable(e))?,
                external_id,
            },
            (provider, None) => {
                return Err(AuthError::StoreUnavailable(format!(
                    "user {} has provider {} but no external id",
                    self.id, provider
                )))
            }
        };

        let user = User {
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            credential,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok((user, self.password_digest.map(PasswordDigest::from_stored)))
    }

    fn into_user(self) -> Result<User, AuthError> {
        self.into_parts().map(|(user, _)| user)
    }
}

fn violates(e: &sqlx::Error, constraint: &str) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// CredentialStore over the `users` table.
#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_local(
        &self,
        username: &str,
        digest: &PasswordDigest,
    ) -> Result<User, AuthError> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (id, username, provider, password_digest)
            VALUES ($1, $2, 'local', $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(digest.as_stored())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, USERNAME_CONSTRAINT) {
                AuthError::DuplicateUsername
            } else {
                AuthError::from(e)
            }
        })?;

        row.into_user()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, AuthError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE provider = $1 AND external_id = $2")
                .bind(provider.as_str())
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_or_create_federated(
        &self,
        provider: Provider,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let username = provider.federated_username(external_id);
        let inserted: Option<UserRow> = sqlx::query_as(
            r#"
            INSERT INTO users (id, username, display_name, provider, external_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider, external_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username.as_str())
        .bind(display_name)
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, USERNAME_CONSTRAINT) {
                AuthError::ResolutionConflict(format!(
                    "username {} is held by another account",
                    username
                ))
            } else {
                AuthError::from(e)
            }
        })?;

        if let Some(row) = inserted {
            return row.into_user();
        }

        // Lost the race (or the account already existed): read the winning row.
        self.find_by_external_id(provider, external_id)
            .await?
            .ok_or_else(|| {
                AuthError::ResolutionConflict(format!(
                    "{} account {} vanished after conflicting insert",
                    provider, external_id
                ))
            })
    }

    async fn local_credential(
        &self,
        username: &str,
    ) -> Result<Option<(User, PasswordDigest)>, AuthError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT * FROM users WHERE provider = 'local' AND username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let (user, digest) = row.into_parts()?;
        Ok(digest.map(|d| (user, d)))
    }
}

/// SecretStore over the `secrets` table.
#[derive(Clone, Debug)]
pub struct PgSecretStore {
    pool: PgPool,
}

impl PgSecretStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for PgSecretStore {
    async fn insert(&self, user_id: Uuid, body: &str) -> Result<Secret, AuthError> {
        let secret: Secret = sqlx::query_as(
            "INSERT INTO secrets (id, user_id, body) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;

        Ok(secret)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Secret>, AuthError> {
        let secrets: Vec<Secret> = sqlx::query_as(
            "SELECT * FROM secrets WHERE user_id = $1 ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseSettings;
    use crate::db;

    /// Migrated pool for `DATABASE_URL`. These tests pass trivially when it is unset.
    async fn pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = db::connect(&DatabaseSettings {
            url,
            max_connections: 20,
        })
        .await
        .unwrap();
        db::migrate(&pool).await.unwrap();
        Some(pool)
    }

    fn unique(prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }

    fn digest() -> PasswordDigest {
        PasswordDigest::from_stored("$argon2id$stub".to_string())
    }

    #[tokio::test]
    async fn test_duplicate_username_maps_to_error() {
        let Some(pool) = pool().await else { return };
        let store = PgCredentialStore::new(pool);
        let name = unique("alice");

        let alice = store.create_local(&name, &digest()).await.unwrap();
        let err = store.create_local(&name, &digest()).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));

        let (user, stored) = store.local_credential(&name).await.unwrap().unwrap();
        assert_eq!(user.id, alice.id);
        assert_eq!(user.credential, Credential::Local);
        assert_eq!(stored, digest());
    }

    #[tokio::test]
    async fn test_find_or_create_keeps_first_row() {
        let Some(pool) = pool().await else { return };
        let store = PgCredentialStore::new(pool);
        let external_id = unique("g");

        let first = store
            .find_or_create_federated(Provider::Google, &external_id, Some("Alice"))
            .await
            .unwrap();
        let second = store
            .find_or_create_federated(Provider::Google, &external_id, Some("Renamed"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.username, format!("google:{}", external_id));
        assert_eq!(second.display_name.as_deref(), Some("Alice"));
        assert!(store.local_credential(&first.username).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_taken_username_is_a_conflict() {
        let Some(pool) = pool().await else { return };
        let store = PgCredentialStore::new(pool);
        let external_id = unique("g");

        store
            .create_local(&Provider::Google.federated_username(&external_id), &digest())
            .await
            .unwrap();
        let err = store
            .find_or_create_federated(Provider::Google, &external_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ResolutionConflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_find_or_create_converges() {
        let Some(pool) = pool().await else { return };
        let store = PgCredentialStore::new(pool.clone());
        let external_id = unique("race");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let external_id = external_id.clone();
                tokio::spawn(async move {
                    store
                        .find_or_create_federated(Provider::Facebook, &external_id, None)
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        assert!(ids.iter().all(|id| *id == ids[0]));

        let (rows,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE provider = 'facebook' AND external_id = $1",
        )
        .bind(&external_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_secrets_listed_for_owner_in_order() {
        let Some(pool) = pool().await else { return };
        let users = PgCredentialStore::new(pool.clone());
        let secrets = PgSecretStore::new(pool);
        let alice = users.create_local(&unique("alice"), &digest()).await.unwrap();
        let bob = users.create_local(&unique("bob"), &digest()).await.unwrap();

        secrets.insert(alice.id, "first").await.unwrap();
        secrets.insert(bob.id, "bob's").await.unwrap();
        secrets.insert(alice.id, "second").await.unwrap();

        let mine = secrets.list_for_user(alice.id).await.unwrap();
        let bodies: Vec<_> = mine.iter().map(|s| s.body.as_str()).collect();
        assert_eq!(bodies, ["first", "second"]);
    }
}
