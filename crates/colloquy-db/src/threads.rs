//! Chat threads, messages and mirrored users.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use colloquy_core::{new_v7, ChatRole, Error, Result, ThreadRepository, User, UserRepository};

/// PostgreSQL implementation of [`ThreadRepository`].
#[derive(Clone)]
pub struct PgThreadRepository {
    pool: Pool<Postgres>,
}

impl PgThreadRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThreadRepository for PgThreadRepository {
    async fn ensure_thread(
        &self,
        owner: &str,
        thread_id: Option<Uuid>,
        title: &str,
    ) -> Result<Uuid> {
        if let Some(id) = thread_id {
            let existing: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM threads WHERE id = $1 AND owner = $2")
                    .bind(id)
                    .bind(owner)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(Error::Database)?;
            if let Some(id) = existing {
                return Ok(id);
            }
        }

        let id = new_v7();
        sqlx::query("INSERT INTO threads (id, owner, title) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(owner)
            .bind(title)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(id)
    }

    async fn append_message(
        &self,
        thread_id: Uuid,
        role: ChatRole,
        content: &str,
        model: Option<&str>,
    ) -> Result<Uuid> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO messages (id, thread_id, role, content, model)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(thread_id)
        .bind(role.as_str())
        .bind(content)
        .bind(model)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE threads SET updated_at = now() WHERE id = $1")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(id)
    }
}

/// PostgreSQL implementation of [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn upsert(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, display_name)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE
             SET email = EXCLUDED.email, display_name = EXCLUDED.display_name, updated_at = now()",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
