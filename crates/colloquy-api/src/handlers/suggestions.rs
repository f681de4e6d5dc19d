//! Proactive suggestion endpoints.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use colloquy_core::{ProactiveSuggestion, SuggestionUpdate};

use crate::{ApiError, AppState, RequireAuth};

#[derive(Debug, Deserialize)]
pub struct SuggestionActionBody {
    pub action: SuggestionUpdate,
}

#[utoipa::path(get, path = "/api/v1/suggestions", tag = "Suggestions",
    responses((status = 200, description = "Active suggestions, newest first"))
)]
pub async fn list_suggestions(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<Vec<ProactiveSuggestion>>, ApiError> {
    Ok(Json(
        state.suggestions.active(&auth.user_id, Utc::now()).await?,
    ))
}

#[utoipa::path(post, path = "/api/v1/suggestions", tag = "Suggestions",
    responses((status = 200, description = "Suggestions created by this run"))
)]
pub async fn generate_suggestions(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<serde_json::Value>, ApiError> {
    let created = state
        .suggestions
        .generate(&auth.user_id, Utc::now())
        .await?;
    Ok(Json(json!({ "generated": created.len(), "suggestions": created })))
}

#[utoipa::path(patch, path = "/api/v1/suggestions/{id}", tag = "Suggestions",
    params(("id" = Uuid, Path, description = "Suggestion id")),
    responses(
        (status = 200, description = "Action applied"),
        (status = 404, description = "Suggestion not found"),
    )
)]
pub async fn update_suggestion(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<SuggestionActionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .suggestions
        .apply_action(id, &auth.user_id, body.action)
        .await?;
    Ok(Json(json!({ "success": true })))
}
