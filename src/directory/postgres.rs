use async_trait::async_trait;
use sqlx::PgPool;

use super::password::{hash_password, verify_password};
use super::{DirectoryError, UserDirectory};
use crate::auth::Identity;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    scope: String,
    is_active: bool,
}

impl From<UserRow> for Identity {
    fn from(row: UserRow) -> Self {
        Identity {
            id: row.id,
            username: row.username,
            scope: row.scope,
            is_active: row.is_active,
        }
    }
}

#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn verify(&self, username: &str, password: &str) -> Result<Option<Identity>, DirectoryError> {
        let row = sqlx::query_as::<_, (i64, String, String, bool, String)>(
            "SELECT id, username, scope, is_active, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(id, username, scope, is_active, hash)| {
            verify_password(password, &hash).then_some(Identity {
                id,
                username,
                scope,
                is_active,
            })
        }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, scope, is_active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Identity::from))
    }

    async fn register(&self, username: &str, password: &str, scope: &str) -> Result<Identity, DirectoryError> {
        let password_hash = hash_password(password)?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"INSERT INTO users (username, password_hash, scope)
               VALUES ($1, $2, $3)
               ON CONFLICT (username) DO NOTHING
               RETURNING id, username, scope, is_active"#,
        )
        .bind(username)
        .bind(&password_hash)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Identity::from).ok_or(DirectoryError::UsernameTaken)
    }

    async fn set_active(&self, username: &str, active: bool) -> Result<(), DirectoryError> {
        let result = sqlx::query("UPDATE users SET is_active = $1 WHERE username = $2")
            .bind(active)
            .bind(username)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DirectoryError::UnknownUser);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Identity>, DirectoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, scope, is_active FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Identity::from).collect())
    }
}
