//! Proactive suggestion generation.
//!
//! A batch pass reads the owner's usage, open tasks and recent activity and
//! turns each rule that fires into a [`ProactiveSuggestion`]. Suggestions are
//! advisory; a failed read only removes the rules that depend on it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use colloquy_core::defaults::{
    SUGGESTION_ACTIVITY_WINDOW_DAYS, SUGGESTION_QUOTA_PRESSURE, SUGGESTION_TTL_DAYS,
};
use colloquy_core::{
    billing_period_start, new_v7, ActionKind, ActivityRepository, Error, Priority,
    ProactiveSuggestion, Result, ScheduledTask, SubscriptionRepository, SuggestionAction,
    SuggestionBasis, SuggestionMetadata, SuggestionRepository, SuggestionType, SuggestionUpdate,
    TaskRepository, Tier, TierLimits, UsageKind, UsageRepository, UsageSummary, UserActivity,
    ACTIVITY_CHAT_MESSAGE, ACTIVITY_PERSONA_CREATED, ACTIVITY_SUGGESTION_COMPLETE,
    ACTIVITY_SUGGESTION_INTERACT,
};
use colloquy_db::Database;

/// API calls this month before a usage insight is offered.
const INSIGHT_MIN_API_CALLS: u64 = 25;

/// Tasks due in the next day that make it a busy day.
const BUSY_DAY_TASKS: usize = 5;

/// Repetitions of one activity before automation is suggested.
const WORKFLOW_MIN_REPEATS: usize = 5;

/// Chat messages in the window before a persona is suggested.
const LEARNING_MIN_CHATS: usize = 10;

/// Inputs the rules read.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    pub tier: Tier,
    pub usage: UsageSummary,
    pub open_tasks: Vec<ScheduledTask>,
    pub activity: Vec<UserActivity>,
}

fn kind_label(kind: UsageKind) -> &'static str {
    match kind {
        UsageKind::ApiCall => "API call",
        UsageKind::TokenUsage => "token",
        UsageKind::FileUpload => "file upload",
        UsageKind::AttachmentProcessing => "attachment",
        UsageKind::ToolExecution => "tool execution",
    }
}

struct Draft {
    suggestion_type: SuggestionType,
    title: String,
    description: String,
    confidence: f64,
    priority: Priority,
    basis: SuggestionBasis,
    action_required: bool,
    tags: Vec<String>,
    actions: Vec<SuggestionAction>,
}

impl Draft {
    fn into_suggestion(self, owner: &str, now: DateTime<Utc>) -> ProactiveSuggestion {
        ProactiveSuggestion {
            id: new_v7(),
            owner: owner.to_string(),
            suggestion_type: self.suggestion_type,
            title: self.title,
            description: self.description,
            confidence: self.confidence.clamp(0.0, 1.0),
            priority: self.priority,
            metadata: SuggestionMetadata {
                category: self.suggestion_type.as_str().to_string(),
                basis: self.basis,
                action_required: self.action_required,
                tags: self.tags,
            },
            actions: self.actions,
            created_at: now,
            expires_at: Some(now + Duration::days(SUGGESTION_TTL_DAYS)),
            shown: false,
            dismissed: false,
        }
    }
}

/// Apply every rule to `signals`. Pure; nothing is persisted.
pub fn derive_suggestions(
    owner: &str,
    now: DateTime<Utc>,
    signals: &Signals,
) -> Vec<ProactiveSuggestion> {
    let mut drafts = Vec::new();

    // Optimization: the kind closest to its quota, once past the pressure mark.
    let limits = TierLimits::for_tier(signals.tier);
    let pressured = UsageKind::ALL
        .iter()
        .filter_map(|kind| {
            limits
                .limit_for(*kind)
                .utilization(signals.usage.quantity(*kind))
                .map(|u| (*kind, u))
        })
        .filter(|(_, u)| *u >= SUGGESTION_QUOTA_PRESSURE)
        .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((kind, utilization)) = pressured {
        drafts.push(Draft {
            suggestion_type: SuggestionType::Optimization,
            title: format!("Approaching your monthly {} limit", kind_label(kind)),
            description: format!(
                "You have used {:.0}% of your {} {} allowance this month.",
                utilization * 100.0,
                signals.tier,
                kind_label(kind)
            ),
            confidence: 0.9,
            priority: Priority::High,
            basis: SuggestionBasis::Usage,
            action_required: true,
            tags: vec!["usage".into(), kind.as_str().into()],
            actions: vec![
                SuggestionAction::new("Review plans", ActionKind::Link, json!({"href": "/settings/billing"})),
                SuggestionAction::dismiss(),
            ],
        });
    }

    // Insight: a summary once usage is meaningful.
    let calls = signals.usage.quantity(UsageKind::ApiCall);
    if calls >= INSIGHT_MIN_API_CALLS {
        drafts.push(Draft {
            suggestion_type: SuggestionType::Insight,
            title: "Your usage this month".into(),
            description: format!(
                "{} requests and {} tokens so far this month, {} cents in total.",
                calls,
                signals.usage.quantity(UsageKind::TokenUsage),
                signals.usage.total_cost_cents()
            ),
            confidence: 0.7,
            priority: Priority::Low,
            basis: SuggestionBasis::Usage,
            action_required: false,
            tags: vec!["usage".into()],
            actions: vec![SuggestionAction::dismiss()],
        });
    }

    // Reminder: overdue open tasks.
    let overdue: Vec<&ScheduledTask> = signals
        .open_tasks
        .iter()
        .filter(|t| t.scheduled_for < now)
        .collect();
    if let Some(oldest) = overdue.iter().min_by_key(|t| t.scheduled_for) {
        let priority = if overdue.iter().any(|t| t.metadata.priority == Priority::High) {
            Priority::High
        } else {
            Priority::Medium
        };
        let title = if overdue.len() == 1 {
            "You have 1 overdue task".to_string()
        } else {
            format!("You have {} overdue tasks", overdue.len())
        };
        drafts.push(Draft {
            suggestion_type: SuggestionType::Reminder,
            title,
            description: format!("Oldest: \"{}\".", oldest.title),
            confidence: 0.85,
            priority,
            basis: SuggestionBasis::Calendar,
            action_required: true,
            tags: vec!["tasks".into()],
            actions: vec![
                SuggestionAction::new("Review tasks", ActionKind::Task, json!({"view": "pending"})),
                SuggestionAction::dismiss(),
            ],
        });
    }

    // Productivity: a crowded next 24 hours.
    let horizon = now + Duration::days(1);
    let due_soon = signals
        .open_tasks
        .iter()
        .filter(|t| t.scheduled_for >= now && t.scheduled_for <= horizon)
        .count();
    if due_soon >= BUSY_DAY_TASKS {
        drafts.push(Draft {
            suggestion_type: SuggestionType::Productivity,
            title: format!("Busy day ahead: {} tasks due in the next 24 hours", due_soon),
            description: "Consider snoozing what can wait and blocking focus time.".into(),
            confidence: 0.75,
            priority: Priority::Medium,
            basis: SuggestionBasis::Context,
            action_required: false,
            tags: vec!["tasks".into(), "planning".into()],
            actions: vec![
                SuggestionAction::new("Plan my day", ActionKind::Task, json!({"view": "upcoming", "days": 1})),
                SuggestionAction::dismiss(),
            ],
        });
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for a in &signals.activity {
        *counts.entry(a.activity_type.as_str()).or_default() += 1;
    }

    // Workflow: the most repeated non-chat activity.
    let repeated = counts
        .iter()
        .filter(|(t, _)| **t != ACTIVITY_CHAT_MESSAGE && !t.starts_with("suggestion_"))
        .filter(|(_, n)| **n >= WORKFLOW_MIN_REPEATS)
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)));
    if let Some((activity_type, n)) = repeated {
        drafts.push(Draft {
            suggestion_type: SuggestionType::Workflow,
            title: format!("Automate your {} routine", activity_type.replace('_', " ")),
            description: format!(
                "You did this {} times in the last {} days.",
                n, SUGGESTION_ACTIVITY_WINDOW_DAYS
            ),
            confidence: 0.5 + (*n as f64) * 0.05,
            priority: Priority::Medium,
            basis: SuggestionBasis::Pattern,
            action_required: false,
            tags: vec!["automation".into()],
            actions: vec![
                SuggestionAction::new("Create workflow", ActionKind::Workflow, json!({"activityType": activity_type})),
                SuggestionAction::dismiss(),
            ],
        });
    }

    // Learning: frequent chat without any persona.
    let chats = counts.get(ACTIVITY_CHAT_MESSAGE).copied().unwrap_or(0);
    if chats >= LEARNING_MIN_CHATS && !counts.contains_key(ACTIVITY_PERSONA_CREATED) {
        drafts.push(Draft {
            suggestion_type: SuggestionType::Learning,
            title: "Tailor the assistant with a persona".into(),
            description: "A persona keeps your preferred tone, instructions and model for every chat."
                .into(),
            confidence: 0.6,
            priority: Priority::Low,
            basis: SuggestionBasis::Conversation,
            action_required: false,
            tags: vec!["personas".into()],
            actions: vec![
                SuggestionAction::new("Create persona", ActionKind::Link, json!({"href": "/personas"})),
                SuggestionAction::dismiss(),
            ],
        });
    }

    drafts
        .into_iter()
        .map(|d| d.into_suggestion(owner, now))
        .collect()
}

/// Generates, lists and updates proactive suggestions.
#[derive(Clone)]
pub struct SuggestionEngine {
    suggestions: Arc<dyn SuggestionRepository>,
    usage: Arc<dyn UsageRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    tasks: Arc<dyn TaskRepository>,
    activity: Arc<dyn ActivityRepository>,
}

impl SuggestionEngine {
    pub fn new(
        suggestions: Arc<dyn SuggestionRepository>,
        usage: Arc<dyn UsageRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        tasks: Arc<dyn TaskRepository>,
        activity: Arc<dyn ActivityRepository>,
    ) -> Self {
        Self {
            suggestions,
            usage,
            subscriptions,
            tasks,
            activity,
        }
    }

    pub fn from_database(db: &Database) -> Self {
        Self::new(
            Arc::new(db.suggestions.clone()),
            Arc::new(db.usage.clone()),
            Arc::new(db.subscriptions.clone()),
            Arc::new(db.tasks.clone()),
            Arc::new(db.activity.clone()),
        )
    }

    async fn signals(&self, owner: &str, now: DateTime<Utc>) -> Signals {
        let tier = self
            .subscriptions
            .active_tier(owner)
            .await
            .unwrap_or_else(|e| {
                warn_read(owner, "tier", &e);
                None
            })
            .unwrap_or_default();
        let usage = self
            .usage
            .summarize_since(owner, billing_period_start(now))
            .await
            .unwrap_or_else(|e| {
                warn_read(owner, "usage", &e);
                UsageSummary::default()
            });
        let open_tasks = self.tasks.list_open(owner).await.unwrap_or_else(|e| {
            warn_read(owner, "tasks", &e);
            Vec::new()
        });
        let activity = self
            .activity
            .list_since(owner, now - Duration::days(SUGGESTION_ACTIVITY_WINDOW_DAYS))
            .await
            .unwrap_or_else(|e| {
                warn_read(owner, "activity", &e);
                Vec::new()
            });
        Signals {
            tier,
            usage,
            open_tasks,
            activity,
        }
    }

    /// Run every rule for `owner` and persist the suggestions whose title is
    /// not already active. Returns the newly stored suggestions.
    pub async fn generate(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<ProactiveSuggestion>> {
        let active = self.suggestions.list_active(owner, now).await?;
        let signals = self.signals(owner, now).await;

        let mut created = Vec::new();
        for suggestion in derive_suggestions(owner, now, &signals) {
            if active.iter().any(|a| a.title == suggestion.title) {
                continue;
            }
            match self.suggestions.insert(&suggestion).await {
                Ok(()) => created.push(suggestion),
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "suggestions",
                    op = "generate",
                    owner = %owner,
                    error = %e,
                    "Failed to store suggestion"
                ),
            }
        }

        info!(
            subsystem = "jobs",
            component = "suggestions",
            op = "generate",
            owner = %owner,
            result_count = created.len(),
            "Suggestions generated"
        );
        Ok(created)
    }

    /// Not dismissed, not expired, newest first.
    pub async fn active(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<ProactiveSuggestion>> {
        self.suggestions.list_active(owner, now).await
    }

    pub async fn apply_action(&self, id: Uuid, owner: &str, action: SuggestionUpdate) -> Result<()> {
        let suggestion = self
            .suggestions
            .get(id, owner)
            .await?
            .ok_or_else(|| Error::NotFound(format!("suggestion {}", id)))?;

        match action {
            SuggestionUpdate::MarkShown => {
                self.suggestions.mark_shown(id, owner).await?;
            }
            SuggestionUpdate::Dismiss => {
                self.suggestions.dismiss(id, owner).await?;
            }
            SuggestionUpdate::Interact => {
                self.suggestions.mark_shown(id, owner).await?;
                self.record(owner, ACTIVITY_SUGGESTION_INTERACT, &suggestion).await;
            }
            SuggestionUpdate::Complete => {
                self.suggestions.dismiss(id, owner).await?;
                self.record(owner, ACTIVITY_SUGGESTION_COMPLETE, &suggestion).await;
            }
        }

        debug!(
            subsystem = "jobs",
            component = "suggestions",
            op = "apply_action",
            owner = %owner,
            suggestion_id = %id,
            action = ?action,
            "Suggestion updated"
        );
        Ok(())
    }

    async fn record(&self, owner: &str, activity_type: &str, suggestion: &ProactiveSuggestion) {
        let metadata = json!({
            "suggestionId": suggestion.id,
            "suggestionType": suggestion.suggestion_type.as_str(),
        });
        if let Err(e) = self.activity.record(owner, activity_type, metadata).await {
            warn!(
                subsystem = "jobs",
                component = "suggestions",
                owner = %owner,
                error = %e,
                "Failed to record suggestion activity"
            );
        }
    }
}

fn warn_read(owner: &str, source: &str, e: &Error) {
    warn!(
        subsystem = "jobs",
        component = "suggestions",
        owner = %owner,
        source,
        error = %e,
        "Signal lookup failed, rule skipped"
    );
}
