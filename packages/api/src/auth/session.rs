//! # Session management
//!
//! Sessions are `tower-sessions` records. The cookie carries only the opaque session
//! id, and the server-side payload is just the user id under [`SESSION_USER_ID_KEY`].
//!
//! - [`SessionManager::create`] cycles the session id before binding the user, so an
//!   id handed out while anonymous is never promoted to an authenticated one.
//! - [`SessionManager::resolve`] re-reads the user on every call. A user that has
//!   disappeared or been deactivated fails closed as [`AuthError::Unauthenticated`].
//! - [`SessionManager::destroy`] flushes the record and clears the cookie, and is safe
//!   to call on an already-empty session.
//!
//! [`session_layer`] applies the fixed cookie attributes for the deployment.

use std::sync::Arc;

use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::SameSite;
use tower_sessions::session::Id;
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};
use uuid::Uuid;

use crate::config::SessionSettings;
use crate::error::AuthError;
use crate::models::User;
use crate::store::CredentialStore;

/// Key for storing user ID in session.
pub const SESSION_USER_ID_KEY: &str = "user_id";

/// Key for the OAuth authorization in flight, see [`super::PendingAuthorization`].
pub const OAUTH_PENDING_KEY: &str = "oauth_pending";

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Bind `user` to a freshly minted session id and return that id.
    pub async fn create(&self, session: &Session, user: &User) -> Result<Id, AuthError> {
        session.cycle_id().await?;
        session.insert(SESSION_USER_ID_KEY, user.id).await?;
        session.save().await?;

        let id = session
            .id()
            .ok_or_else(|| AuthError::StoreUnavailable("session store assigned no id".into()))?;
        tracing::info!(user_id = %user.id, "Session created");
        Ok(id)
    }

    /// The live user behind `session`.
    pub async fn resolve(&self, session: &Session) -> Result<User, AuthError> {
        let Some(user_id) = session.get::<Uuid>(SESSION_USER_ID_KEY).await? else {
            return Err(AuthError::Unauthenticated);
        };

        match self.store.find_by_id(user_id).await? {
            Some(user) if user.active => Ok(user),
            _ => {
                tracing::info!(%user_id, "Session refers to a missing or inactive user");
                session.remove::<Uuid>(SESSION_USER_ID_KEY).await?;
                Err(AuthError::Unauthenticated)
            }
        }
    }

    pub async fn destroy(&self, session: &Session) -> Result<(), AuthError> {
        session.flush().await?;
        tracing::info!("Session destroyed");
        Ok(())
    }
}

/// Session middleware with this deployment's cookie attributes.
pub fn session_layer<S>(store: S, settings: &SessionSettings) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(settings.cookie_name.clone())
        .with_http_only(true)
        .with_secure(settings.production)
        .with_path("/")
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(settings.ttl_secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordDigest;
    use crate::models::Provider;
    use crate::store::MemoryCredentialStore;
    use tower_sessions::MemoryStore;

    struct Fixture {
        users: MemoryCredentialStore,
        sessions: Arc<MemoryStore>,
        manager: SessionManager,
    }

    fn fixture() -> Fixture {
        let users = MemoryCredentialStore::new();
        Fixture {
            manager: SessionManager::new(Arc::new(users.clone())),
            users,
            sessions: Arc::new(MemoryStore::default()),
        }
    }

    impl Fixture {
        /// A session as the next request carrying cookie `id` would see it.
        fn session(&self, id: Option<Id>) -> Session {
            Session::new(id, self.sessions.clone(), None)
        }

        async fn user(&self) -> User {
            self.users
                .find_or_create_federated(Provider::Google, "g-123", Some("Alice"))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_then_resolve() {
        let f = fixture();
        let user = f.user().await;

        let id = f.manager.create(&f.session(None), &user).await.unwrap();
        let resolved = f.manager.resolve(&f.session(Some(id))).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn test_anonymous_session_is_unauthenticated() {
        let f = fixture();
        assert!(matches!(
            f.manager.resolve(&f.session(None)).await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            f.manager.resolve(&f.session(Some(Id::default()))).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_login_regenerates_session_id() {
        let f = fixture();
        let user = f.user().await;

        let anonymous = f.session(None);
        anonymous.insert("visited", true).await.unwrap();
        anonymous.save().await.unwrap();
        let anonymous_id = anonymous.id().unwrap();

        let session = f.session(Some(anonymous_id));
        let id = f.manager.create(&session, &user).await.unwrap();
        assert_ne!(id, anonymous_id);

        // The pre-login id no longer carries anything, let alone the user.
        assert!(matches!(
            f.manager.resolve(&f.session(Some(anonymous_id))).await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(f.manager.resolve(&f.session(Some(id))).await.is_ok());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let f = fixture();
        let user = f.user().await;
        let id = f.manager.create(&f.session(None), &user).await.unwrap();

        f.manager.destroy(&f.session(Some(id))).await.unwrap();
        assert!(matches!(
            f.manager.resolve(&f.session(Some(id))).await,
            Err(AuthError::Unauthenticated)
        ));

        f.manager.destroy(&f.session(Some(id))).await.unwrap();
        f.manager.destroy(&f.session(None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_removed_user_fails_closed() {
        let f = fixture();
        let user = f.user().await;
        let id = f.manager.create(&f.session(None), &user).await.unwrap();

        f.users.remove(user.id);
        assert!(matches!(
            f.manager.resolve(&f.session(Some(id))).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_inactive_user_fails_closed() {
        let f = fixture();
        let digest = PasswordDigest::from_stored("$argon2id$stub".into());
        let user = f.users.create_local("bob", &digest).await.unwrap();
        let id = f.manager.create(&f.session(None), &user).await.unwrap();

        f.users.set_active(user.id, false);
        assert!(matches!(
            f.manager.resolve(&f.session(Some(id))).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_payload_is_only_the_user_id() {
        let f = fixture();
        let user = f.user().await;
        let session = f.session(None);
        f.manager.create(&session, &user).await.unwrap();

        let stored: Uuid = session.get(SESSION_USER_ID_KEY).await.unwrap().unwrap();
        assert_eq!(stored, user.id);
        assert!(session.get::<String>(OAUTH_PENDING_KEY).await.unwrap().is_none());
    }
}
