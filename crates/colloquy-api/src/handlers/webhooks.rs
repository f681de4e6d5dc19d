//! Identity provider webhook.
//!
//! Mirrors user lifecycle events into the `users` table. The signature is
//! checked over the raw body before anything is parsed.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use colloquy_core::User;

use crate::auth::verify_webhook_signature;
use crate::{ApiError, AppState};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize)]
struct IdentityEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: JsonValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "display_name", alias = "name")]
    display_name: Option<String>,
}

impl From<IdentityUser> for User {
    fn from(u: IdentityUser) -> Self {
        User {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
        }
    }
}

#[utoipa::path(post, path = "/api/v1/webhooks/identity", tag = "Webhooks",
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Missing or invalid signature"),
    )
)]
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, ApiError> {
    let Some(secret) = state.webhook_secret.as_deref() else {
        warn!(
            subsystem = "api",
            component = "webhooks",
            "Identity webhook received but WEBHOOK_SECRET is not configured"
        );
        return Err(ApiError::Unauthorized(
            "Webhook verification is not configured".to_string(),
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook signature".to_string()))?;
    if !verify_webhook_signature(secret, &body, signature) {
        return Err(ApiError::Unauthorized("Invalid webhook signature".to_string()));
    }

    let event: IdentityEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {}", e)))?;

    match event.kind.as_str() {
        "user.created" | "user.updated" => {
            let user: User = serde_json::from_value::<IdentityUser>(event.data)
                .map_err(|e| ApiError::BadRequest(format!("invalid user payload: {}", e)))?
                .into();
            state.users.upsert(&user).await?;
            info!(
                subsystem = "api",
                component = "webhooks",
                event_type = %event.kind,
                owner = %user.id,
                "User synced"
            );
        }
        "user.deleted" => {
            let id = event
                .data
                .get("id")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| ApiError::BadRequest("user id is required".to_string()))?;
            let removed = state.users.delete(id).await?;
            info!(
                subsystem = "api",
                component = "webhooks",
                owner = %id,
                removed,
                "User deleted"
            );
        }
        other => {
            debug!(
                subsystem = "api",
                component = "webhooks",
                event_type = other,
                "Ignoring identity event"
            );
            return Ok(Json(json!({ "received": true, "handled": false })));
        }
    }

    Ok(Json(json!({ "received": true, "handled": true })))
}
