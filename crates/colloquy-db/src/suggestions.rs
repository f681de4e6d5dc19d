//! Proactive suggestion repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use colloquy_core::{
    Error, Priority, ProactiveSuggestion, Result, SuggestionRepository, SuggestionType,
};

const SUGGESTION_COLUMNS: &str = "id, owner, suggestion_type, title, description, confidence, \
                                  priority, metadata, actions, created_at, expires_at, shown, dismissed";

/// PostgreSQL implementation of [`SuggestionRepository`].
#[derive(Clone)]
pub struct PgSuggestionRepository {
    pool: Pool<Postgres>,
}

impl PgSuggestionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<ProactiveSuggestion> {
        let suggestion_type: String = r.get("suggestion_type");
        let priority: String = r.get("priority");
        let metadata: serde_json::Value = r.get("metadata");
        let actions: serde_json::Value = r.get("actions");

        Ok(ProactiveSuggestion {
            id: r.get("id"),
            owner: r.get("owner"),
            suggestion_type: suggestion_type.parse().unwrap_or(SuggestionType::Insight),
            title: r.get("title"),
            description: r.get("description"),
            confidence: r.get("confidence"),
            priority: priority.parse().unwrap_or(Priority::Medium),
            metadata: serde_json::from_value(metadata)?,
            actions: serde_json::from_value(actions)?,
            created_at: r.get("created_at"),
            expires_at: r.get("expires_at"),
            shown: r.get("shown"),
            dismissed: r.get("dismissed"),
        })
    }
}

#[async_trait]
impl SuggestionRepository for PgSuggestionRepository {
    async fn insert(&self, s: &ProactiveSuggestion) -> Result<()> {
        sqlx::query(
            "INSERT INTO proactive_suggestions
                (id, owner, suggestion_type, title, description, confidence, priority,
                 metadata, actions, created_at, expires_at, shown, dismissed)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(s.id)
        .bind(&s.owner)
        .bind(s.suggestion_type.as_str())
        .bind(&s.title)
        .bind(&s.description)
        .bind(s.confidence)
        .bind(s.priority.as_str())
        .bind(serde_json::to_value(&s.metadata)?)
        .bind(serde_json::to_value(&s.actions)?)
        .bind(s.created_at)
        .bind(s.expires_at)
        .bind(s.shown)
        .bind(s.dismissed)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<ProactiveSuggestion>> {
        let row = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM proactive_suggestions WHERE id = $1 AND owner = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn list_active(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProactiveSuggestion>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM proactive_suggestions
             WHERE owner = $1 AND NOT dismissed AND (expires_at IS NULL OR expires_at > $2)
             ORDER BY created_at DESC"
        ))
        .bind(owner)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn mark_shown(&self, id: Uuid, owner: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE proactive_suggestions SET shown = true WHERE id = $1 AND owner = $2")
                .bind(id)
                .bind(owner)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn dismiss(&self, id: Uuid, owner: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE proactive_suggestions SET dismissed = true WHERE id = $1 AND owner = $2",
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
