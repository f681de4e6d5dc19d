//! User activity log and learned pattern repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};

use colloquy_core::{
    new_v7, ActivityRepository, Error, PatternRepository, Result, UserActivity, UserPattern,
};

/// PostgreSQL implementation of [`ActivityRepository`].
#[derive(Clone)]
pub struct PgActivityRepository {
    pool: Pool<Postgres>,
}

impl PgActivityRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for PgActivityRepository {
    async fn record(&self, owner: &str, activity_type: &str, metadata: JsonValue) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_activity (id, owner, activity_type, metadata)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(new_v7())
        .bind(owner)
        .bind(activity_type)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_since(&self, owner: &str, since: DateTime<Utc>) -> Result<Vec<UserActivity>> {
        let rows = sqlx::query(
            "SELECT id, owner, activity_type, metadata, occurred_at
             FROM user_activity
             WHERE owner = $1 AND occurred_at >= $2
             ORDER BY occurred_at ASC",
        )
        .bind(owner)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| UserActivity {
                id: r.get("id"),
                owner: r.get("owner"),
                activity_type: r.get("activity_type"),
                metadata: r.get("metadata"),
                occurred_at: r.get("occurred_at"),
            })
            .collect())
    }
}

/// PostgreSQL implementation of [`PatternRepository`].
#[derive(Clone)]
pub struct PgPatternRepository {
    pool: Pool<Postgres>,
}

impl PgPatternRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatternRepository for PgPatternRepository {
    async fn get(&self, owner: &str, pattern_type: &str) -> Result<Option<UserPattern>> {
        let row = sqlx::query(
            "SELECT owner, pattern_type, pattern_data, updated_at
             FROM user_patterns WHERE owner = $1 AND pattern_type = $2",
        )
        .bind(owner)
        .bind(pattern_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| UserPattern {
            owner: r.get("owner"),
            pattern_type: r.get("pattern_type"),
            pattern_data: r.get("pattern_data"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn upsert(&self, owner: &str, pattern_type: &str, data: JsonValue) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_patterns (owner, pattern_type, pattern_data, updated_at)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (owner, pattern_type) DO UPDATE
             SET pattern_data = EXCLUDED.pattern_data, updated_at = now()",
        )
        .bind(owner)
        .bind(pattern_type)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
