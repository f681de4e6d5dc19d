//! HTTP handlers for colloquy-api.

pub mod chat;
pub mod health;
pub mod models;
pub mod personas;
pub mod suggestions;
pub mod tasks;
pub mod usage;
pub mod webhooks;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::AppState;

/// Record a user activity without blocking the request.
pub(crate) fn record_activity_detached(
    state: &AppState,
    owner: &str,
    activity_type: &'static str,
    metadata: JsonValue,
) {
    let activity = state.activity.clone();
    let owner = owner.to_string();
    tokio::spawn(async move {
        if let Err(e) = activity.record(&owner, activity_type, metadata).await {
            warn!(
                subsystem = "api",
                component = "activity",
                owner = %owner,
                activity_type,
                error = %e,
                "Failed to record activity"
            );
        }
    });
}
