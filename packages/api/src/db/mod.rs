//! # Database module: PostgreSQL connection pool and migrations
//!
//! The pool is created once at startup from [`DatabaseSettings`](crate::config::DatabaseSettings)
//! and passed to the stores that need it. There is no process-wide singleton.
//!
//! ## Re-exports
//!
//! - [`connect`]: opens a pool sized by `database.max_connections`.
//! - [`migrate`]: applies the embedded migrations from `packages/api/migrations`.

mod pool;

pub use pool::{connect, migrate};
