//! Centralized default constants for colloquy.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// MODEL SELECTION
// =============================================================================

/// Inputs shorter than this (in characters) are routed by cost under the
/// balanced strategy.
pub const BALANCED_SHORT_INPUT_CHARS: usize = 500;

/// Inputs longer than this (in characters) are routed by quality under the
/// balanced strategy.
pub const BALANCED_LONG_INPUT_CHARS: usize = 5000;

/// Maximum number of fallback models attached to a recommendation.
pub const MAX_FALLBACKS: usize = 3;

/// Expected output tokens for a short answer.
pub const OUTPUT_TOKENS_SHORT: u64 = 100;

/// Expected output tokens for a medium answer.
pub const OUTPUT_TOKENS_MEDIUM: u64 = 500;

/// Expected output tokens for a long answer.
pub const OUTPUT_TOKENS_LONG: u64 = 1500;

/// Provider preferred by the speed strategy when no lightweight model exists.
pub const SPEED_PREFERRED_PROVIDER: &str = "groq";

// =============================================================================
// TASK SCHEDULING
// =============================================================================

/// Default total occurrences of a recurring series (original included).
pub const RECURRENCE_MAX_OCCURRENCES: u32 = 10;

/// Largest series a caller may request with `maxOccurrences`.
pub const RECURRENCE_MAX_OCCURRENCES_LIMIT: u32 = 366;

/// Longest snooze a caller may request (one year).
pub const SNOOZE_MAX_MINUTES: i64 = 525_600;

/// Default snooze delay in minutes.
pub const SNOOZE_MINUTES: i64 = 60;

/// Delay before the follow-up created when a meeting task completes.
pub const MEETING_FOLLOWUP_MINUTES: i64 = 30;

/// Delay before the follow-up created when a high-priority task fires.
pub const HIGH_PRIORITY_FOLLOWUP_HOURS: i64 = 4;

/// Delay before the follow-up suggested for an overdue high-priority task.
pub const OVERDUE_FOLLOWUP_HOURS: i64 = 2;

/// Lead time of a meeting-pattern reminder.
pub const MEETING_REMINDER_LEAD_MINUTES: i64 = 15;

/// Delay before a suggested break.
pub const BREAK_SUGGESTION_MINUTES: i64 = 30;

/// Work intensity above which a break is suggested.
pub const WORK_INTENSITY_BREAK_THRESHOLD: f64 = 0.8;

/// Default look-ahead window for the upcoming-tasks query.
pub const UPCOMING_DAYS: i64 = 7;

/// Maximum look-ahead window for the upcoming-tasks query.
pub const UPCOMING_DAYS_MAX: i64 = 90;

// =============================================================================
// SWEEP WORKER
// =============================================================================

/// Seconds between due-task sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Upper bound on a single sweep before it is abandoned.
pub const SWEEP_TIMEOUT_SECS: u64 = 30;

/// Maximum due tasks fired by one sweep; the rest wait for the next one.
pub const SWEEP_BATCH_SIZE: i64 = 500;

/// Broadcast channel capacity for worker events.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// SUGGESTIONS
// =============================================================================

/// Days a generated suggestion stays active.
pub const SUGGESTION_TTL_DAYS: i64 = 7;

/// Days of activity history inspected by the suggestion pass.
pub const SUGGESTION_ACTIVITY_WINDOW_DAYS: i64 = 14;

/// Fraction of a monthly quota at which an optimization suggestion fires.
pub const SUGGESTION_QUOTA_PRESSURE: f64 = 0.8;

// =============================================================================
// HTTP
// =============================================================================

/// Default bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const SERVER_PORT: u16 = 3000;

/// Maximum request body size in bytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Global requests per second when rate limiting is enabled.
pub const RATE_LIMIT_PER_SECOND: u32 = 50;

/// Burst size for the global rate limiter.
pub const RATE_LIMIT_BURST: u32 = 100;

/// Timeout for a single provider chat request.
pub const PROVIDER_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_token_ordering() {
        assert!(OUTPUT_TOKENS_SHORT < OUTPUT_TOKENS_MEDIUM);
        assert!(OUTPUT_TOKENS_MEDIUM < OUTPUT_TOKENS_LONG);
    }

    #[test]
    fn test_balanced_thresholds_ordered() {
        assert!(BALANCED_SHORT_INPUT_CHARS < BALANCED_LONG_INPUT_CHARS);
    }

    #[test]
    fn test_break_threshold_is_fraction() {
        assert!(WORK_INTENSITY_BREAK_THRESHOLD > 0.0 && WORK_INTENSITY_BREAK_THRESHOLD < 1.0);
    }
}
