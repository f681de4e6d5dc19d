//! Structured logging schema and field name constants for colloquy.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "optimizer", "scheduler", "usage", "pool", "sweep"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "recommend", "schedule_task", "track", "process_due"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owner (user identifier) of the entity being operated on.
pub const OWNER: &str = "owner";

/// Scheduled task UUID.
pub const TASK_ID: &str = "task_id";

/// Suggestion UUID.
pub const SUGGESTION_ID: &str = "suggestion_id";

/// Catalog model identifier.
pub const MODEL: &str = "model";

/// Model provider name.
pub const PROVIDER: &str = "provider";

/// Subscription tier.
pub const TIER: &str = "tier";

/// Usage event kind.
pub const USAGE_KIND: &str = "usage_kind";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of tasks touched by a sweep or expansion.
pub const TASK_COUNT: &str = "task_count";

/// Estimated or measured token count.
pub const TOKEN_COUNT: &str = "token_count";

/// Cost in integer cents.
pub const COST_CENTS: &str = "cost_cents";

// ─── Error fields ──────────────────────────────────────────────────────────

/// Error message (when logging failures).
pub const ERROR: &str = "error";

/// Provider failure classification.
pub const FAILURE_KIND: &str = "failure_kind";
