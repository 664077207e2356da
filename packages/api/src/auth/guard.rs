//! Access guard for protected routes.
//!
//! Taking [`AuthUser`] as a handler argument is the whole guard: the handler only runs
//! when the request's session resolves to a live user. Anything else redirects to
//! `/login`, except a store outage, which is a plain 500.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use tower_sessions::Session;

use crate::error::AuthError;
use crate::models::User;
use crate::state::AppState;

/// The authenticated user behind the current request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let state = AppState::from_ref(state);

        match state.sessions.resolve(&session).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(AuthError::StoreUnavailable(e)) => {
                tracing::error!("Session lookup failed: {}", e);
                Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response())
            }
            Err(_) => Err(Redirect::to("/login").into_response()),
        }
    }
}
