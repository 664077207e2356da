use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{CredentialStore, SecretStore};
use crate::auth::PasswordDigest;
use crate::error::AuthError;
use crate::models::{Credential, Provider, Secret, User};

#[derive(Debug, Default)]
struct Users {
    rows: HashMap<Uuid, (User, Option<PasswordDigest>)>,
    by_username: HashMap<String, Uuid>,
    by_external_id: HashMap<(Provider, String), Uuid>,
}

impl Users {
    fn insert(&mut self, user: User, digest: Option<PasswordDigest>) -> User {
        self.by_username.insert(user.username.clone(), user.id);
        if let Credential::Federated {
            provider,
            external_id,
        } = &user.credential
        {
            self.by_external_id
                .insert((*provider, external_id.clone()), user.id);
        }
        self.rows.insert(user.id, (user.clone(), digest));
        user
    }

    fn get(&self, id: Option<&Uuid>) -> Option<&(User, Option<PasswordDigest>)> {
        id.and_then(|id| self.rows.get(id))
    }
}

fn new_user(username: &str, display_name: Option<&str>, credential: Credential) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        display_name: display_name.map(str::to_string),
        credential,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

/// In-memory CredentialStore for testing and the development backend.
///
/// Every operation runs under one lock, which makes find-or-create atomic.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    users: Arc<Mutex<Users>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Users>, AuthError> {
        self.users
            .lock()
            .map_err(|_| AuthError::StoreUnavailable("memory store lock poisoned".to_string()))
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.users.lock().map(|u| u.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn remove(&self, id: Uuid) {
        let mut users = self.users.lock().unwrap();
        if let Some((user, _)) = users.rows.remove(&id) {
            users.by_username.remove(&user.username);
            users.by_external_id.retain(|_, v| *v != id);
        }
    }

    #[cfg(test)]
    pub(crate) fn set_active(&self, id: Uuid, active: bool) {
        let mut users = self.users.lock().unwrap();
        if let Some((user, _)) = users.rows.get_mut(&id) {
            user.active = active;
            user.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_local(
        &self,
        username: &str,
        digest: &PasswordDigest,
    ) -> Result<User, AuthError> {
        let mut users = self.lock()?;
        if users.by_username.contains_key(username) {
            return Err(AuthError::DuplicateUsername);
        }
        let user = new_user(username, None, Credential::Local);
        Ok(users.insert(user, Some(digest.clone())))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let users = self.lock()?;
        Ok(users
            .get(users.by_username.get(username))
            .map(|(u, _)| u.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.lock()?.rows.get(&id).map(|(u, _)| u.clone()))
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, AuthError> {
        let users = self.lock()?;
        let id = users
            .by_external_id
            .get(&(provider, external_id.to_string()));
        Ok(users.get(id).map(|(u, _)| u.clone()))
    }

    async fn find_or_create_federated(
        &self,
        provider: Provider,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let mut users = self.lock()?;

        let key = (provider, external_id.to_string());
        if let Some((user, _)) = users.get(users.by_external_id.get(&key)) {
            return Ok(user.clone());
        }
        let username = provider.federated_username(external_id);
        if users.by_username.contains_key(&username) {
            return Err(AuthError::ResolutionConflict(format!(
                "username {} is held by another account",
                username
            )));
        }

        let user = new_user(
            &username,
            display_name,
            Credential::Federated {
                provider,
                external_id: external_id.to_string(),
            },
        );
        Ok(users.insert(user, None))
    }

    async fn local_credential(
        &self,
        username: &str,
    ) -> Result<Option<(User, PasswordDigest)>, AuthError> {
        let users = self.lock()?;
        Ok(users
            .get(users.by_username.get(username))
            .and_then(|(user, digest)| digest.clone().map(|d| (user.clone(), d))))
    }
}

/// In-memory SecretStore for testing and the development backend.
#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore {
    secrets: Arc<Mutex<Vec<Secret>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored secrets across all users.
    pub fn len(&self) -> usize {
        self.secrets.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn insert(&self, user_id: Uuid, body: &str) -> Result<Secret, AuthError> {
        let secret = Secret {
            id: Uuid::new_v4(),
            user_id,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        self.secrets
            .lock()
            .map_err(|_| AuthError::StoreUnavailable("memory store lock poisoned".to_string()))?
            .push(secret.clone());
        Ok(secret)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Secret>, AuthError> {
        Ok(self
            .secrets
            .lock()
            .map_err(|_| AuthError::StoreUnavailable("memory store lock poisoned".to_string()))?
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest() -> PasswordDigest {
        PasswordDigest::from_stored("$argon2id$stub".to_string())
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let store = MemoryCredentialStore::new();

        let alice = store.create_local("alice", &digest()).await.unwrap();
        assert_eq!(alice.credential, Credential::Local);
        assert!(alice.active);

        let err = store.create_local("alice", &digest()).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
        assert_eq!(store.len(), 1);

        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
    }

    #[tokio::test]
    async fn test_lookups() {
        let store = MemoryCredentialStore::new();
        let user = store
            .find_or_create_federated(Provider::Google, "g-123", Some("Alice"))
            .await
            .unwrap();

        assert_eq!(user.username, "google:g-123");
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
        assert_eq!(
            store.find_by_id(user.id).await.unwrap().unwrap().id,
            user.id
        );
        assert!(store
            .find_by_external_id(Provider::Google, "g-123")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_external_id(Provider::Facebook, "g-123")
            .await
            .unwrap()
            .is_none());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
        assert!(store.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_or_create_returns_existing_row() {
        let store = MemoryCredentialStore::new();
        let first = store
            .find_or_create_federated(Provider::Google, "g-123", Some("Alice"))
            .await
            .unwrap();
        let second = store
            .find_or_create_federated(Provider::Google, "g-123", Some("Renamed"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name.as_deref(), Some("Alice"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_external_id_on_two_providers() {
        let store = MemoryCredentialStore::new();
        let google = store
            .find_or_create_federated(Provider::Google, "12345", None)
            .await
            .unwrap();
        let facebook = store
            .find_or_create_federated(Provider::Facebook, "12345", None)
            .await
            .unwrap();

        assert_ne!(google.id, facebook.id);
        assert_eq!(facebook.username, "facebook:12345");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_federated_username_collision_is_a_conflict() {
        let store = MemoryCredentialStore::new();
        store.create_local("google:12345", &digest()).await.unwrap();

        let err = store
            .find_or_create_federated(Provider::Google, "12345", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ResolutionConflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_local_credential_only_for_local_accounts() {
        let store = MemoryCredentialStore::new();
        store.create_local("alice", &digest()).await.unwrap();
        store
            .find_or_create_federated(Provider::Facebook, "fb-1", None)
            .await
            .unwrap();

        let (user, d) = store.local_credential("alice").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(d, digest());
        assert!(store.local_credential("fb-1").await.unwrap().is_none());
        assert!(store.local_credential("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_secrets_are_scoped_to_owner() {
        let store = MemorySecretStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.insert(alice, "first").await.unwrap();
        store.insert(bob, "bob's").await.unwrap();
        store.insert(alice, "second").await.unwrap();

        let mine = store.list_for_user(alice).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].body, "first");
        assert_eq!(mine[1].body, "second");
        assert!(mine.iter().all(|s| s.user_id == alice));
        assert_eq!(store.len(), 3);
    }
}
