//! Persona CRUD.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use colloquy_core::{NewPersona, Persona, UpdatePersona, ACTIVITY_PERSONA_CREATED};

use super::record_activity_detached;
use crate::{ApiError, AppState, RequireAuth};

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    Ok(())
}

#[utoipa::path(get, path = "/api/v1/personas", tag = "Personas",
    responses((status = 200, description = "The caller's personas"))
)]
pub async fn list_personas(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<Vec<Persona>>, ApiError> {
    Ok(Json(state.personas.list(&auth.user_id).await?))
}

#[utoipa::path(post, path = "/api/v1/personas", tag = "Personas",
    responses(
        (status = 201, description = "Persona created"),
        (status = 400, description = "Missing name or system prompt"),
    )
)]
pub async fn create_persona(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(body): Json<NewPersona>,
) -> Result<(StatusCode, Json<Persona>), ApiError> {
    validate_name(&body.name)?;
    if body.system_prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("systemPrompt is required".to_string()));
    }

    let persona = state.personas.create(&auth.user_id, body).await?;
    record_activity_detached(
        &state,
        &auth.user_id,
        ACTIVITY_PERSONA_CREATED,
        json!({ "personaId": persona.id }),
    );
    Ok((StatusCode::CREATED, Json(persona)))
}

#[utoipa::path(patch, path = "/api/v1/personas/{id}", tag = "Personas",
    params(("id" = Uuid, Path, description = "Persona id")),
    responses(
        (status = 200, description = "Persona updated"),
        (status = 404, description = "Persona not found"),
    )
)]
pub async fn update_persona(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePersona>,
) -> Result<Json<Persona>, ApiError> {
    if let Some(name) = &body.name {
        validate_name(name)?;
    }
    state
        .personas
        .update(id, &auth.user_id, body)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("persona {}", id)))
}

#[utoipa::path(delete, path = "/api/v1/personas/{id}", tag = "Personas",
    params(("id" = Uuid, Path, description = "Persona id")),
    responses(
        (status = 200, description = "Persona deleted"),
        (status = 404, description = "Persona not found"),
    )
)]
pub async fn delete_persona(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.personas.delete(id, &auth.user_id).await? {
        return Err(ApiError::NotFound(format!("persona {}", id)));
    }
    Ok(Json(json!({ "success": true })))
}
