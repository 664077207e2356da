//! Data models for the application.

mod secret;
mod user;

pub use secret::Secret;
pub use user::{Credential, Provider, User, UserInfo, USERNAME_SEPARATOR};
