//! # Secrets: authentication and session service
//!
//! This crate holds everything behind the `web` binary: the credential and secret
//! stores, local and federated authentication, server-side sessions and the HTTP
//! surface that ties them together.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Password hashing, credential protection, account resolution, OAuth (Google, Facebook), sessions, access guard |
//! | [`config`] | Layered [`config::Settings`] (defaults, `config.toml`, `SECRETS_*` environment) |
//! | [`crypto`] | Legacy AES-256-GCM field encryption for stored credentials |
//! | [`db`] | PostgreSQL pool and embedded migrations |
//! | [`error`] | [`AuthError`] taxonomy |
//! | [`models`] | `User`, `Credential`, `Provider`, `Secret` and the client-safe `UserInfo` |
//! | [`routes`] | The axum [`Router`](axum::Router) |
//! | [`state`] | [`AppState`] shared by all handlers |
//! | [`store`] | `CredentialStore` / `SecretStore` traits with Postgres and in-memory backends |

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use error::AuthError;
pub use models::UserInfo;
pub use state::AppState;
