//! Service layer for business logic.

pub mod usage;

pub use usage::{denial_reason, LimitCheck, RequestDecision, UsageTracker};
