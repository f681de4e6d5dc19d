//! Repository and collaborator traits.
//!
//! PostgreSQL implementations live in `colloquy-db`; in-memory versions for
//! tests live in [`crate::mock`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Storage for scheduled tasks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert every task atomically. Used for both single tasks and
    /// expanded recurring series.
    async fn insert_series(&self, tasks: &[ScheduledTask]) -> Result<()>;

    /// Fetch a task owned by `owner`.
    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<ScheduledTask>>;

    /// Set the status of an owned task. Returns false when no row matched.
    async fn update_status(&self, id: Uuid, owner: &str, status: TaskStatus) -> Result<bool>;

    /// Move the due time, mark the task snoozed and clear its notification
    /// marker.
    async fn snooze(&self, id: Uuid, owner: &str, until: DateTime<Utc>) -> Result<bool>;

    /// Open (pending or snoozed) tasks for `owner`, ascending due time.
    async fn list_open(&self, owner: &str) -> Result<Vec<ScheduledTask>>;

    /// Open tasks due in `[from, to]`, ascending due time.
    async fn list_between(
        &self,
        owner: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledTask>>;

    /// Open suggestion-type tasks, ascending due time.
    async fn list_suggestions(&self, owner: &str) -> Result<Vec<ScheduledTask>>;

    /// Claim up to `limit` open tasks across all owners that are due and not
    /// yet notified, marking them notified at `now`. Snoozed tasks revert to
    /// pending. Concurrent callers never claim the same task.
    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledTask>>;

    /// Undo a claim whose notification failed so a later sweep retries it.
    async fn release_claim(&self, id: Uuid) -> Result<()>;
}

/// Append-only usage ledger.
#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn record(&self, event: &UsageEvent) -> Result<()>;

    /// Sum quantity and cost by kind for events at or after `since`.
    async fn summarize_since(&self, owner: &str, since: DateTime<Utc>) -> Result<UsageSummary>;
}

/// Subscription lookup.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Tier of the owner's active subscription, if any.
    async fn active_tier(&self, owner: &str) -> Result<Option<Tier>>;

    async fn set_tier(&self, owner: &str, tier: Tier) -> Result<()>;
}

#[async_trait]
pub trait SuggestionRepository: Send + Sync {
    async fn insert(&self, suggestion: &ProactiveSuggestion) -> Result<()>;

    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<ProactiveSuggestion>>;

    /// Not dismissed and not expired at `now`, newest first.
    async fn list_active(&self, owner: &str, now: DateTime<Utc>)
        -> Result<Vec<ProactiveSuggestion>>;

    async fn mark_shown(&self, id: Uuid, owner: &str) -> Result<bool>;

    async fn dismiss(&self, id: Uuid, owner: &str) -> Result<bool>;
}

#[async_trait]
pub trait PersonaRepository: Send + Sync {
    async fn list(&self, owner: &str) -> Result<Vec<Persona>>;

    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<Persona>>;

    async fn get_default(&self, owner: &str) -> Result<Option<Persona>>;

    /// Create a persona. When `is_default` is set, every other persona of
    /// the owner loses its default flag in the same transaction.
    async fn create(&self, owner: &str, persona: NewPersona) -> Result<Persona>;

    async fn update(&self, id: Uuid, owner: &str, update: UpdatePersona)
        -> Result<Option<Persona>>;

    async fn delete(&self, id: Uuid, owner: &str) -> Result<bool>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn record(&self, owner: &str, activity_type: &str, metadata: JsonValue) -> Result<()>;

    async fn list_since(&self, owner: &str, since: DateTime<Utc>) -> Result<Vec<UserActivity>>;
}

#[async_trait]
pub trait PatternRepository: Send + Sync {
    async fn get(&self, owner: &str, pattern_type: &str) -> Result<Option<UserPattern>>;

    async fn upsert(&self, owner: &str, pattern_type: &str, data: JsonValue) -> Result<()>;
}

/// Chat thread persistence.
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Return `thread_id` when it exists for `owner`, otherwise create a
    /// thread titled `title`.
    async fn ensure_thread(&self, owner: &str, thread_id: Option<Uuid>, title: &str)
        -> Result<Uuid>;

    async fn append_message(
        &self,
        thread_id: Uuid,
        role: ChatRole,
        content: &str,
        model: Option<&str>,
    ) -> Result<Uuid>;
}

/// Users mirrored from the identity provider.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn upsert(&self, user: &User) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Delivery channel for due-task notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, task: &ScheduledTask) -> Result<()>;
}
