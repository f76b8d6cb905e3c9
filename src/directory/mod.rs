//! User directory: the identity store the auth core reads from.
//!
//! `MemoryDirectory` backs dev mode and tests; `PgDirectory` is used whenever
//! `DATABASE_URL` is configured.

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Identity;

pub mod memory;
pub mod password;
pub mod postgres;

pub use memory::MemoryDirectory;
pub use postgres::PgDirectory;

/// Scope assigned to self-registered users.
pub const DEFAULT_SCOPE: &str = "user";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("username already exists")]
    UsernameTaken,
    #[error("user not found")]
    UnknownUser,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Check a username/password pair. `None` on unknown user or wrong password.
    async fn verify(&self, username: &str, password: &str) -> Result<Option<Identity>, DirectoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, DirectoryError>;

    async fn register(&self, username: &str, password: &str, scope: &str) -> Result<Identity, DirectoryError>;

    async fn set_active(&self, username: &str, active: bool) -> Result<(), DirectoryError>;

    async fn list(&self) -> Result<Vec<Identity>, DirectoryError>;
}
