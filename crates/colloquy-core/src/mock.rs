//! In-memory repository implementations.
//!
//! Compiled for this crate's tests and for downstream crates that enable the
//! `mock` feature in their dev-dependencies.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::*;
use crate::uuid_utils::new_v7;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn sorted_by_due(mut tasks: Vec<ScheduledTask>) -> Vec<ScheduledTask> {
    tasks.sort_by_key(|t| t.scheduled_for);
    tasks
}

/// In-memory [`TaskRepository`]. `fail_reads` makes every read return an
/// error, for exercising degraded read paths.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<Vec<ScheduledTask>>,
    fail_reads: Mutex<bool>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *lock(&self.fail_reads) = fail;
    }

    /// Snapshot of every stored task.
    pub fn all(&self) -> Vec<ScheduledTask> {
        lock(&self.tasks).clone()
    }

    fn check_reads(&self) -> Result<()> {
        if *lock(&self.fail_reads) {
            return Err(Error::Internal("simulated read failure".into()));
        }
        Ok(())
    }

    fn open_for(&self, owner: &str) -> Vec<ScheduledTask> {
        lock(&self.tasks)
            .iter()
            .filter(|t| t.owner == owner && t.status.is_open())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert_series(&self, tasks: &[ScheduledTask]) -> Result<()> {
        let mut store = lock(&self.tasks);
        if tasks.iter().any(|t| store.iter().any(|s| s.id == t.id)) {
            return Err(Error::InvalidInput("duplicate task id".into()));
        }
        store.extend(tasks.iter().cloned());
        Ok(())
    }

    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<ScheduledTask>> {
        self.check_reads()?;
        Ok(lock(&self.tasks)
            .iter()
            .find(|t| t.id == id && t.owner == owner)
            .cloned())
    }

    async fn update_status(&self, id: Uuid, owner: &str, status: TaskStatus) -> Result<bool> {
        let mut store = lock(&self.tasks);
        match store.iter_mut().find(|t| t.id == id && t.owner == owner) {
            Some(task) => {
                task.status = status;
                task.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn snooze(&self, id: Uuid, owner: &str, until: DateTime<Utc>) -> Result<bool> {
        let mut store = lock(&self.tasks);
        match store.iter_mut().find(|t| t.id == id && t.owner == owner) {
            Some(task) => {
                task.scheduled_for = until;
                task.status = TaskStatus::Snoozed;
                task.notified_at = None;
                task.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_open(&self, owner: &str) -> Result<Vec<ScheduledTask>> {
        self.check_reads()?;
        Ok(sorted_by_due(self.open_for(owner)))
    }

    async fn list_between(
        &self,
        owner: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledTask>> {
        self.check_reads()?;
        Ok(sorted_by_due(
            self.open_for(owner)
                .into_iter()
                .filter(|t| t.scheduled_for >= from && t.scheduled_for <= to)
                .collect(),
        ))
    }

    async fn list_suggestions(&self, owner: &str) -> Result<Vec<ScheduledTask>> {
        self.check_reads()?;
        Ok(sorted_by_due(
            self.open_for(owner)
                .into_iter()
                .filter(|t| t.task_type == TaskType::Suggestion)
                .collect(),
        ))
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledTask>> {
        self.check_reads()?;
        let mut store = lock(&self.tasks);
        let due: Vec<ScheduledTask> = store
            .iter()
            .filter(|t| t.status.is_open() && t.scheduled_for <= now && t.notified_at.is_none())
            .cloned()
            .collect();
        let mut due = sorted_by_due(due);
        due.truncate(limit.max(0) as usize);
        for claimed in &mut due {
            claimed.notified_at = Some(now);
            if claimed.status == TaskStatus::Snoozed {
                claimed.status = TaskStatus::Pending;
            }
            claimed.updated_at = now;
            if let Some(task) = store.iter_mut().find(|t| t.id == claimed.id) {
                *task = claimed.clone();
            }
        }
        Ok(due)
    }

    async fn release_claim(&self, id: Uuid) -> Result<()> {
        if let Some(task) = lock(&self.tasks).iter_mut().find(|t| t.id == id) {
            task.notified_at = None;
        }
        Ok(())
    }
}

/// In-memory [`UsageRepository`]. `fail_writes` makes `record` error.
#[derive(Default)]
pub struct InMemoryUsageRepository {
    events: Mutex<Vec<UsageEvent>>,
    fail_writes: Mutex<bool>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    pub fn events(&self) -> Vec<UsageEvent> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn record(&self, event: &UsageEvent) -> Result<()> {
        if *lock(&self.fail_writes) {
            return Err(Error::Internal("simulated write failure".into()));
        }
        lock(&self.events).push(event.clone());
        Ok(())
    }

    async fn summarize_since(&self, owner: &str, since: DateTime<Utc>) -> Result<UsageSummary> {
        let mut summary = UsageSummary::default();
        for e in lock(&self.events)
            .iter()
            .filter(|e| e.owner == owner && e.created_at >= since)
        {
            summary.add(e.kind, e.quantity.max(0) as u64, e.cost_cents);
        }
        Ok(summary)
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    tiers: Mutex<HashMap<String, Tier>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn active_tier(&self, owner: &str) -> Result<Option<Tier>> {
        Ok(lock(&self.tiers).get(owner).copied())
    }

    async fn set_tier(&self, owner: &str, tier: Tier) -> Result<()> {
        lock(&self.tiers).insert(owner.to_string(), tier);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySuggestionRepository {
    suggestions: Mutex<Vec<ProactiveSuggestion>>,
}

impl InMemorySuggestionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ProactiveSuggestion> {
        lock(&self.suggestions).clone()
    }
}

#[async_trait]
impl SuggestionRepository for InMemorySuggestionRepository {
    async fn insert(&self, suggestion: &ProactiveSuggestion) -> Result<()> {
        lock(&self.suggestions).push(suggestion.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<ProactiveSuggestion>> {
        Ok(lock(&self.suggestions)
            .iter()
            .find(|s| s.id == id && s.owner == owner)
            .cloned())
    }

    async fn list_active(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProactiveSuggestion>> {
        let mut active: Vec<ProactiveSuggestion> = lock(&self.suggestions)
            .iter()
            .filter(|s| s.owner == owner && s.is_active(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn mark_shown(&self, id: Uuid, owner: &str) -> Result<bool> {
        let mut store = lock(&self.suggestions);
        match store.iter_mut().find(|s| s.id == id && s.owner == owner) {
            Some(s) => {
                s.shown = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn dismiss(&self, id: Uuid, owner: &str) -> Result<bool> {
        let mut store = lock(&self.suggestions);
        match store.iter_mut().find(|s| s.id == id && s.owner == owner) {
            Some(s) => {
                s.dismissed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryPersonaRepository {
    personas: Mutex<Vec<Persona>>,
}

impl InMemoryPersonaRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersonaRepository for InMemoryPersonaRepository {
    async fn list(&self, owner: &str) -> Result<Vec<Persona>> {
        Ok(lock(&self.personas)
            .iter()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid, owner: &str) -> Result<Option<Persona>> {
        Ok(lock(&self.personas)
            .iter()
            .find(|p| p.id == id && p.owner == owner)
            .cloned())
    }

    async fn get_default(&self, owner: &str) -> Result<Option<Persona>> {
        Ok(lock(&self.personas)
            .iter()
            .find(|p| p.owner == owner && p.is_default)
            .cloned())
    }

    async fn create(&self, owner: &str, persona: NewPersona) -> Result<Persona> {
        let now = Utc::now();
        let created = Persona {
            id: new_v7(),
            owner: owner.to_string(),
            name: persona.name,
            description: persona.description,
            system_prompt: persona.system_prompt,
            traits: persona.traits.unwrap_or_else(|| JsonValue::Object(Default::default())),
            preferred_model: persona.preferred_model,
            is_default: persona.is_default,
            created_at: now,
            updated_at: now,
        };
        let mut store = lock(&self.personas);
        if created.is_default {
            for p in store.iter_mut().filter(|p| p.owner == owner) {
                p.is_default = false;
            }
        }
        store.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        owner: &str,
        update: UpdatePersona,
    ) -> Result<Option<Persona>> {
        let mut store = lock(&self.personas);
        if update.is_default == Some(true) {
            for p in store.iter_mut().filter(|p| p.owner == owner && p.id != id) {
                p.is_default = false;
            }
        }
        let Some(p) = store.iter_mut().find(|p| p.id == id && p.owner == owner) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            p.name = name;
        }
        if let Some(description) = update.description {
            p.description = Some(description);
        }
        if let Some(prompt) = update.system_prompt {
            p.system_prompt = prompt;
        }
        if let Some(traits) = update.traits {
            p.traits = traits;
        }
        if let Some(model) = update.preferred_model {
            p.preferred_model = Some(model);
        }
        if let Some(is_default) = update.is_default {
            p.is_default = is_default;
        }
        p.updated_at = Utc::now();
        Ok(Some(p.clone()))
    }

    async fn delete(&self, id: Uuid, owner: &str) -> Result<bool> {
        let mut store = lock(&self.personas);
        let before = store.len();
        store.retain(|p| !(p.id == id && p.owner == owner));
        Ok(store.len() != before)
    }
}

#[derive(Default)]
pub struct InMemoryActivityRepository {
    activity: Mutex<Vec<UserActivity>>,
}

impl InMemoryActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<UserActivity> {
        lock(&self.activity).clone()
    }
}

#[async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn record(&self, owner: &str, activity_type: &str, metadata: JsonValue) -> Result<()> {
        lock(&self.activity).push(UserActivity {
            id: new_v7(),
            owner: owner.to_string(),
            activity_type: activity_type.to_string(),
            metadata,
            occurred_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_since(&self, owner: &str, since: DateTime<Utc>) -> Result<Vec<UserActivity>> {
        Ok(lock(&self.activity)
            .iter()
            .filter(|a| a.owner == owner && a.occurred_at >= since)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryPatternRepository {
    patterns: Mutex<HashMap<(String, String), UserPattern>>,
}

impl InMemoryPatternRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternRepository for InMemoryPatternRepository {
    async fn get(&self, owner: &str, pattern_type: &str) -> Result<Option<UserPattern>> {
        Ok(lock(&self.patterns)
            .get(&(owner.to_string(), pattern_type.to_string()))
            .cloned())
    }

    async fn upsert(&self, owner: &str, pattern_type: &str, data: JsonValue) -> Result<()> {
        lock(&self.patterns).insert(
            (owner.to_string(), pattern_type.to_string()),
            UserPattern {
                owner: owner.to_string(),
                pattern_type: pattern_type.to_string(),
                pattern_data: data,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

/// Thread store that keeps `(thread_id, role, content)` triples.
#[derive(Default)]
pub struct InMemoryThreadRepository {
    threads: Mutex<HashMap<Uuid, String>>,
    messages: Mutex<Vec<(Uuid, ChatRole, String)>>,
}

impl InMemoryThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Uuid, ChatRole, String)> {
        lock(&self.messages).clone()
    }
}

#[async_trait]
impl ThreadRepository for InMemoryThreadRepository {
    async fn ensure_thread(
        &self,
        owner: &str,
        thread_id: Option<Uuid>,
        _title: &str,
    ) -> Result<Uuid> {
        let mut threads = lock(&self.threads);
        if let Some(id) = thread_id {
            if threads.get(&id).map(String::as_str) == Some(owner) {
                return Ok(id);
            }
        }
        let id = new_v7();
        threads.insert(id, owner.to_string());
        Ok(id)
    }

    async fn append_message(
        &self,
        thread_id: Uuid,
        role: ChatRole,
        content: &str,
        _model: Option<&str>,
    ) -> Result<Uuid> {
        lock(&self.messages).push((thread_id, role, content.to_string()));
        Ok(new_v7())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<User> {
        lock(&self.users).get(id).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn upsert(&self, user: &User) -> Result<()> {
        lock(&self.users).insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(lock(&self.users).remove(id).is_some())
    }
}

/// Notifier that records the ids of notified tasks.
#[derive(Default)]
pub struct RecordingNotifier {
    notified: Mutex<Vec<Uuid>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }

    pub fn notified(&self) -> Vec<Uuid> {
        lock(&self.notified).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, task: &ScheduledTask) -> Result<()> {
        if *lock(&self.fail) {
            return Err(Error::Internal("simulated notify failure".into()));
        }
        lock(&self.notified).push(task.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(owner: &str, due: DateTime<Utc>) -> ScheduledTask {
        let now = Utc::now();
        ScheduledTask {
            id: new_v7(),
            owner: owner.to_string(),
            title: "t".into(),
            description: None,
            task_type: TaskType::Reminder,
            scheduled_for: due,
            recurrence: None,
            status: TaskStatus::Pending,
            metadata: TaskMetadata::default(),
            series_id: None,
            notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_task_repo_scopes_by_owner() {
        let repo = InMemoryTaskRepository::new();
        let t = task("alice", Utc::now());
        repo.insert_series(&[t.clone()]).await.unwrap();
        assert!(repo.get(t.id, "alice").await.unwrap().is_some());
        assert!(repo.get(t.id, "bob").await.unwrap().is_none());
        assert!(!repo
            .update_status(t.id, "bob", TaskStatus::Cancelled)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_task_repo_rejects_duplicate_batch() {
        let repo = InMemoryTaskRepository::new();
        let t = task("alice", Utc::now());
        repo.insert_series(&[t.clone()]).await.unwrap();
        assert!(repo.insert_series(&[t]).await.is_err());
        assert_eq!(repo.all().len(), 1);
    }

    #[tokio::test]
    async fn test_persona_single_default() {
        let repo = InMemoryPersonaRepository::new();
        let a = repo
            .create(
                "alice",
                NewPersona {
                    name: "A".into(),
                    system_prompt: "a".into(),
                    is_default: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let b = repo
            .create(
                "alice",
                NewPersona {
                    name: "B".into(),
                    system_prompt: "b".into(),
                    is_default: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let default = repo.get_default("alice").await.unwrap().unwrap();
        assert_eq!(default.id, b.id);
        assert!(!repo.get(a.id, "alice").await.unwrap().unwrap().is_default);
    }
}
