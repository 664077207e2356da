//! # HTTP surface
//!
//! [`app`] assembles the axum router over an [`AppState`] and a session store.
//!
//! | Method | Path | Guarded | Handler |
//! |--------|------|---------|---------|
//! | GET | `/` | no | `home` |
//! | GET, POST | `/register` | no | `register_page`, `register` |
//! | GET, POST | `/login` | no | `login_page`, `login` |
//! | GET | `/auth/{provider}` | no | `oauth_start` |
//! | GET | `/auth/{provider}/callback` | no | `oauth_callback` |
//! | GET | `/logout` | yes | `logout` |
//! | GET | `/secrets` | yes | `secrets` |
//! | GET, POST | `/submit` | yes | `submit_page`, `submit` |
//!
//! Authentication failures come back as 303 redirects carrying an `?error=` code from
//! [`AuthError::error_code`]. A store outage is a 500 with a generic body and the detail
//! only in the log.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::{Session, SessionStore};

use crate::auth::{
    session_layer, AuthUser, AuthorizationResult, Identity, PendingAuthorization,
    OAUTH_PENDING_KEY,
};
use crate::error::AuthError;
use crate::models::{Provider, Secret, UserInfo};
use crate::state::AppState;

/// Build the application router with the session layer over `session_store`.
pub fn app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let sessions = session_layer(session_store, &state.settings.session);

    Router::new()
        .route("/", get(home))
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/auth/{provider}", get(oauth_start))
        .route("/auth/{provider}/callback", get(oauth_callback))
        .route("/logout", get(logout))
        .route("/secrets", get(secrets))
        .route("/submit", get(submit_page).post(submit))
        .with_state(state)
        .layer(sessions)
}

#[derive(Debug, Deserialize)]
struct CredentialsForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct SecretForm {
    #[serde(default)]
    secret: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorQuery {
    error: Option<String>,
}

/// Body of `GET /secrets`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SecretsPage {
    pub user: UserInfo,
    pub secrets: Vec<Secret>,
}

fn server_error(e: AuthError) -> Response {
    tracing::error!("Request failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

/// Redirect back to `path` with the error's code, or 500 if the store is down.
fn fail_to(path: &str, e: AuthError) -> Response {
    match e {
        AuthError::StoreUnavailable(_) | AuthError::Configuration(_) | AuthError::Cipher(_) => {
            server_error(e)
        }
        e => Redirect::to(&format!("{}?error={}", path, e.error_code())).into_response(),
    }
}

/// Human-readable text for the `?error=` codes this app emits. Unknown codes are not
/// echoed back.
fn error_message(query: &ErrorQuery) -> Option<&'static str> {
    let message = match query.error.as_deref()? {
        "duplicate_username" => "That username is already taken.",
        "invalid_credentials" => "Invalid username or password.",
        "invalid_input" => "Username and password are required.",
        "oauth_error" => "Sign-in with the provider failed. Please try again.",
        "empty_secret" => "A secret cannot be empty.",
        _ => "Something went wrong. Please try again.",
    };
    Some(message)
}

fn page(title: &str, error: Option<&str>, body: &str) -> Html<String> {
    let error = error
        .map(|e| format!("<p class=\"error\">{}</p>", e))
        .unwrap_or_default();
    Html(format!(
        "<!doctype html><html><head><title>{title} | Secrets</title></head>\
         <body><h1>{title}</h1>{error}{body}</body></html>"
    ))
}

const PROVIDER_LINKS: &str = "<p><a href=\"/auth/google\">Sign in with Google</a></p>\
     <p><a href=\"/auth/facebook\">Sign in with Facebook</a></p>";

async fn home() -> Html<String> {
    page(
        "Secrets",
        None,
        "<p>Don't keep your secrets, share them anonymously!</p>\
         <p><a href=\"/register\">Register</a> or <a href=\"/login\">Login</a></p>",
    )
}

async fn register_page(Query(query): Query<ErrorQuery>) -> Html<String> {
    page(
        "Register",
        error_message(&query),
        &format!(
            "<form action=\"/register\" method=\"post\">\
             <input name=\"username\" placeholder=\"Username\">\
             <input type=\"password\" name=\"password\" placeholder=\"Password\">\
             <button type=\"submit\">Register</button></form>{PROVIDER_LINKS}"
        ),
    )
}

async fn login_page(Query(query): Query<ErrorQuery>) -> Html<String> {
    page(
        "Login",
        error_message(&query),
        &format!(
            "<form action=\"/login\" method=\"post\">\
             <input name=\"username\" placeholder=\"Username\">\
             <input type=\"password\" name=\"password\" placeholder=\"Password\">\
             <button type=\"submit\">Login</button></form>{PROVIDER_LINKS}"
        ),
    )
}

async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let identity = Identity::Local {
        username: form.username,
        password: form.password,
    };
    let user = match state.resolver.resolve(identity).await {
        Ok(user) => user,
        Err(e) => return fail_to("/register", e),
    };

    match state.sessions.create(&session, &user).await {
        Ok(_) => Redirect::to("/secrets").into_response(),
        Err(e) => server_error(e),
    }
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let user = match state
        .resolver
        .authenticate_local(&form.username, &form.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::info!("Local login rejected: {}", e);
            return fail_to("/login", e);
        }
    };

    match state.sessions.create(&session, &user).await {
        Ok(_) => Redirect::to("/secrets").into_response(),
        Err(e) => server_error(e),
    }
}

/// Start an authorization-code flow with `provider`.
async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    session: Session,
) -> Response {
    let Some(handler) = provider
        .parse::<Provider>()
        .ok()
        .and_then(|p| state.providers.get(p))
    else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let request = handler.initiate();
    if let Err(e) = session.insert(OAUTH_PENDING_KEY, &request.pending).await {
        return server_error(e.into());
    }

    Redirect::to(&request.url).into_response()
}

async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(result): Query<AuthorizationResult>,
    session: Session,
) -> Response {
    let Some(handler) = provider
        .parse::<Provider>()
        .ok()
        .and_then(|p| state.providers.get(p))
    else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Single use: a replayed redirect finds nothing pending.
    let pending = match session
        .remove::<PendingAuthorization>(OAUTH_PENDING_KEY)
        .await
    {
        Ok(pending) => pending,
        Err(e) => return server_error(e.into()),
    };

    let user = match handler
        .callback(state.providers.http(), result, pending, &state.resolver)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            match &e {
                AuthError::ResolutionConflict(_) => tracing::warn!(%provider, "{}", e),
                _ => tracing::error!(%provider, "OAuth callback failed: {}", e),
            }
            return fail_to("/login", e);
        }
    };

    match state.sessions.create(&session, &user).await {
        Ok(_) => Redirect::to("/secrets").into_response(),
        Err(e) => server_error(e),
    }
}

async fn logout(State(state): State<AppState>, _user: AuthUser, session: Session) -> Response {
    match state.sessions.destroy(&session).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => server_error(e),
    }
}

async fn secrets(State(state): State<AppState>, AuthUser(user): AuthUser) -> Response {
    match state.secrets.list_for_user(user.id).await {
        Ok(secrets) => Json(SecretsPage {
            user: user.to_info(),
            secrets,
        })
        .into_response(),
        Err(e) => server_error(e),
    }
}

async fn submit_page(_user: AuthUser) -> Html<String> {
    page(
        "Submit a secret",
        None,
        "<form action=\"/submit\" method=\"post\">\
         <input name=\"secret\" placeholder=\"What's your secret?\">\
         <button type=\"submit\">Submit</button></form>",
    )
}

async fn submit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Form(form): Form<SecretForm>,
) -> Response {
    let body = form.secret.trim();
    if body.is_empty() {
        return Redirect::to("/secrets?error=empty_secret").into_response();
    }

    match state.secrets.insert(user.id, body).await {
        Ok(_) => Redirect::to("/secrets").into_response(),
        Err(e) => server_error(e),
    }
}
