//! Core data models for colloquy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Error;

/// Implements `as_str`, `Display` and `FromStr` for a unit enum from a
/// single variant/name table so the database and API agree on spelling.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Stable lowercase name used in storage and on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

// =============================================================================
// SUBSCRIPTION TIERS
// =============================================================================

/// Subscription level. Ordered: `Free < Starter < Professional < Enterprise`.
///
/// Gates both catalog access and monthly usage quotas.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Starter,
    Professional,
    Enterprise,
}

string_enum!(Tier {
    Free => "free",
    Starter => "starter",
    Professional => "professional",
    Enterprise => "enterprise",
});

// =============================================================================
// USAGE
// =============================================================================

/// Kind of billable action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    ApiCall,
    TokenUsage,
    FileUpload,
    AttachmentProcessing,
    ToolExecution,
}

string_enum!(UsageKind {
    ApiCall => "api_call",
    TokenUsage => "token_usage",
    FileUpload => "file_upload",
    AttachmentProcessing => "attachment_processing",
    ToolExecution => "tool_execution",
});

/// One billable action recorded against a user. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub id: Uuid,
    pub owner: String,
    pub kind: UsageKind,
    /// Free-form resource label (model id, endpoint, file name).
    pub resource: String,
    pub quantity: i64,
    pub metadata: Option<JsonValue>,
    /// Cost in integer cents.
    pub cost_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A usage event before cost and identity are assigned.
#[derive(Debug, Clone)]
pub struct NewUsageEvent {
    pub owner: String,
    pub kind: UsageKind,
    pub resource: String,
    pub quantity: u64,
    pub metadata: Option<JsonValue>,
}

impl NewUsageEvent {
    pub fn new(owner: impl Into<String>, kind: UsageKind, resource: impl Into<String>, quantity: u64) -> Self {
        Self {
            owner: owner.into(),
            kind,
            resource: resource.into(),
            quantity,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Aggregate of one usage kind over a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindUsage {
    pub quantity: u64,
    pub cost_cents: i64,
}

/// Usage summed by kind over a period (normally the current month).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub by_kind: BTreeMap<UsageKind, KindUsage>,
}

impl UsageSummary {
    /// Quantity consumed for `kind`; zero when nothing was recorded.
    pub fn quantity(&self, kind: UsageKind) -> u64 {
        self.by_kind.get(&kind).map(|k| k.quantity).unwrap_or(0)
    }

    pub fn total_cost_cents(&self) -> i64 {
        self.by_kind.values().map(|k| k.cost_cents).sum()
    }

    /// Fold one more aggregate into the summary.
    pub fn add(&mut self, kind: UsageKind, quantity: u64, cost_cents: i64) {
        let entry = self.by_kind.entry(kind).or_default();
        entry.quantity += quantity;
        entry.cost_cents += cost_cents;
    }
}

// =============================================================================
// SCHEDULED TASKS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Reminder,
    Followup,
    Recurring,
    Suggestion,
}

string_enum!(TaskType {
    Reminder => "reminder",
    Followup => "followup",
    Recurring => "recurring",
    Suggestion => "suggestion",
});

/// Task lifecycle state.
///
/// `Pending → Completed | Cancelled` are terminal; `Snoozed` reverts to
/// `Pending` when the sweep fires the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Cancelled,
    Snoozed,
}

string_enum!(TaskStatus {
    Pending => "pending",
    Completed => "completed",
    Cancelled => "cancelled",
    Snoozed => "snoozed",
});

impl TaskStatus {
    /// Whether the task can still fire or be transitioned.
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Snoozed)
    }
}

/// Priority shared by tasks and suggestions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

string_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

string_enum!(RecurrencePattern {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
    Custom => "custom",
});

/// Unit of a custom recurrence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

/// Recurrence rule attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    /// Interval count for `Custom`; ignored otherwise.
    #[serde(default)]
    pub interval: Option<u32>,
    /// Interval unit for `Custom`; ignored otherwise.
    #[serde(default)]
    pub unit: Option<IntervalUnit>,
    /// Total occurrences including the original. Defaults to
    /// [`crate::defaults::RECURRENCE_MAX_OCCURRENCES`].
    #[serde(default)]
    pub max_occurrences: Option<u32>,
    /// No occurrence is scheduled after this instant.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Recurrence {
    pub fn new(pattern: RecurrencePattern) -> Self {
        Self {
            pattern,
            interval: None,
            unit: None,
            max_occurrences: None,
            end_date: None,
        }
    }

    pub fn custom(interval: u32, unit: IntervalUnit) -> Self {
        Self {
            interval: Some(interval),
            unit: Some(unit),
            ..Self::new(RecurrencePattern::Custom)
        }
    }

    pub fn with_max_occurrences(mut self, n: u32) -> Self {
        self.max_occurrences = Some(n);
        self
    }

    pub fn with_end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Push,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_channels() -> Vec<NotificationChannel> {
    vec![NotificationChannel::InApp]
}

/// Task metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub related_thread_id: Option<Uuid>,
    #[serde(default)]
    pub reminder_type: Option<String>,
    #[serde(default = "default_channels")]
    pub notification_channels: Vec<NotificationChannel>,
}

impl Default for TaskMetadata {
    fn default() -> Self {
        Self {
            priority: Priority::default(),
            category: default_category(),
            related_thread_id: None,
            reminder_type: None,
            notification_channels: default_channels(),
        }
    }
}

impl TaskMetadata {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn is_meeting(&self) -> bool {
        self.category.eq_ignore_ascii_case("meeting")
    }
}

/// A persisted reminder, follow-up, recurring instance or suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub scheduled_for: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    pub status: TaskStatus,
    pub metadata: TaskMetadata,
    /// Id of the first task of a recurring series.
    pub series_id: Option<Uuid>,
    /// Set when the sweep has fired the task for its current due time.
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some() || self.series_id.is_some()
    }
}

/// Request to schedule a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub owner: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub task_type: TaskType,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

impl NewTask {
    pub fn new(
        owner: impl Into<String>,
        title: impl Into<String>,
        task_type: TaskType,
        scheduled_for: DateTime<Utc>,
    ) -> Self {
        Self {
            owner: owner.into(),
            title: title.into(),
            description: None,
            task_type,
            scheduled_for,
            recurrence: None,
            metadata: TaskMetadata::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn with_metadata(mut self, metadata: TaskMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// =============================================================================
// PROACTIVE SUGGESTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Workflow,
    Learning,
    Productivity,
    Reminder,
    Optimization,
    Insight,
}

string_enum!(SuggestionType {
    Workflow => "workflow",
    Learning => "learning",
    Productivity => "productivity",
    Reminder => "reminder",
    Optimization => "optimization",
    Insight => "insight",
});

/// What a suggestion was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionBasis {
    Pattern,
    Calendar,
    Usage,
    Conversation,
    Context,
    Goal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Task,
    Reminder,
    Link,
    Workflow,
    Dismiss,
}

/// One button offered with a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionAction {
    pub label: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub payload: JsonValue,
}

impl SuggestionAction {
    pub fn new(label: impl Into<String>, kind: ActionKind, payload: JsonValue) -> Self {
        Self {
            label: label.into(),
            kind,
            payload,
        }
    }

    pub fn dismiss() -> Self {
        Self::new("Dismiss", ActionKind::Dismiss, JsonValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionMetadata {
    pub category: String,
    pub basis: SuggestionBasis,
    pub action_required: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProactiveSuggestion {
    pub id: Uuid,
    pub owner: String,
    pub suggestion_type: SuggestionType,
    pub title: String,
    pub description: String,
    /// In `0.0..=1.0`.
    pub confidence: f64,
    pub priority: Priority,
    pub metadata: SuggestionMetadata,
    pub actions: Vec<SuggestionAction>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub shown: bool,
    pub dismissed: bool,
}

impl ProactiveSuggestion {
    /// Not dismissed and not past its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.dismissed && self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// Mutation requested on a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionUpdate {
    MarkShown,
    Dismiss,
    Interact,
    Complete,
}

// =============================================================================
// PERSONAS
// =============================================================================

/// A user-defined assistant persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    pub traits: JsonValue,
    pub preferred_model: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPersona {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub system_prompt: String,
    #[serde(default)]
    pub traits: Option<JsonValue>,
    #[serde(default)]
    pub preferred_model: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Partial persona update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePersona {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub traits: Option<JsonValue>,
    #[serde(default)]
    pub preferred_model: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

// =============================================================================
// ACTIVITY AND PATTERNS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    pub id: Uuid,
    pub owner: String,
    pub activity_type: String,
    pub metadata: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

// Activity types recorded in `user_activity`.
pub const ACTIVITY_CHAT_MESSAGE: &str = "chat_message";
pub const ACTIVITY_TASK_CREATED: &str = "task_created";
pub const ACTIVITY_PERSONA_CREATED: &str = "persona_created";
pub const ACTIVITY_SUGGESTION_INTERACT: &str = "suggestion_interact";
pub const ACTIVITY_SUGGESTION_COMPLETE: &str = "suggestion_complete";

/// Pattern type holding recurring meeting slots.
pub const PATTERN_MEETING_TIMES: &str = "meeting_times";

/// Pattern type holding a work intensity score.
pub const PATTERN_WORK_INTENSITY: &str = "work_intensity";

/// A learned behavioural pattern, stored as opaque JSON per type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPattern {
    pub owner: String,
    pub pattern_type: String,
    pub pattern_data: JsonValue,
    pub updated_at: DateTime<Utc>,
}

/// One weekly meeting slot. `weekday` counts from Monday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSlot {
    pub weekday: u32,
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

/// `meeting_times` pattern payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingTimes {
    #[serde(default)]
    pub slots: Vec<MeetingSlot>,
}

/// `work_intensity` pattern payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkIntensity {
    pub score: f64,
}

// =============================================================================
// USERS, THREADS, MESSAGES
// =============================================================================

/// A user as known from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

string_enum!(ChatRole {
    System => "system",
    User => "user",
    Assistant => "assistant",
});

/// One chat turn as sent by the client or persisted in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}
