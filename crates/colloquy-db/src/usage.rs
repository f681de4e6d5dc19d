//! Usage ledger and subscription repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use colloquy_core::{
    Error, Result, SubscriptionRepository, Tier, UsageEvent, UsageKind, UsageRepository,
    UsageSummary,
};

/// PostgreSQL implementation of [`UsageRepository`].
#[derive(Clone)]
pub struct PgUsageRepository {
    pool: Pool<Postgres>,
}

impl PgUsageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    async fn record(&self, event: &UsageEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_events
                (id, owner, kind, resource, quantity, metadata, cost_cents, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.id)
        .bind(&event.owner)
        .bind(event.kind.as_str())
        .bind(&event.resource)
        .bind(event.quantity)
        .bind(&event.metadata)
        .bind(event.cost_cents)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn summarize_since(&self, owner: &str, since: DateTime<Utc>) -> Result<UsageSummary> {
        let rows = sqlx::query(
            "SELECT kind,
                    COALESCE(SUM(quantity), 0)::BIGINT AS quantity,
                    COALESCE(SUM(cost_cents), 0)::BIGINT AS cost_cents
             FROM usage_events
             WHERE owner = $1 AND created_at >= $2
             GROUP BY kind",
        )
        .bind(owner)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut summary = UsageSummary::default();
        for row in rows {
            let kind: String = row.get("kind");
            // Unknown kinds come from rows written by a newer schema; skip them.
            let Ok(kind) = kind.parse::<UsageKind>() else {
                continue;
            };
            let quantity: i64 = row.get("quantity");
            let cost_cents: i64 = row.get("cost_cents");
            summary.add(kind, quantity.max(0) as u64, cost_cents);
        }
        Ok(summary)
    }
}

/// PostgreSQL implementation of [`SubscriptionRepository`].
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: Pool<Postgres>,
}

impl PgSubscriptionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn active_tier(&self, owner: &str) -> Result<Option<Tier>> {
        let row = sqlx::query("SELECT tier FROM subscriptions WHERE owner = $1 AND status = 'active'")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.and_then(|r| r.get::<String, _>("tier").parse().ok()))
    }

    async fn set_tier(&self, owner: &str, tier: Tier) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscriptions (owner, tier, status)
             VALUES ($1, $2, 'active')
             ON CONFLICT (owner) DO UPDATE
             SET tier = EXCLUDED.tier, status = 'active', updated_at = now()",
        )
        .bind(owner)
        .bind(tier.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
