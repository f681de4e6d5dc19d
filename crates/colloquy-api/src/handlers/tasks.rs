//! Scheduled task endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use colloquy_core::defaults::UPCOMING_DAYS;
use colloquy_core::{
    NewTask, Recurrence, RecurrencePattern, TaskMetadata, TaskType, ACTIVITY_TASK_CREATED,
};

use super::record_activity_detached;
use crate::{ApiError, AppState, RequireAuth};

const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub days: Option<i64>,
}

/// Body of `POST /api/v1/tasks`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub task_type: TaskType,
    pub scheduled_for: DateTime<Utc>,
    /// Shorthand for a plain daily/weekly/monthly rule.
    #[serde(default)]
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Full rule; wins over `recurrencePattern`.
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateTaskResponse {
    pub id: Uuid,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Complete,
    Snooze,
    Cancel,
}

/// Body of `PATCH /api/v1/tasks/:id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskBody {
    pub action: TaskAction,
    #[serde(default)]
    pub snooze_minutes: Option<i64>,
}

#[utoipa::path(get, path = "/api/v1/tasks", tag = "Tasks",
    params(
        ("type" = Option<String>, Query, description = "pending (default), upcoming or suggestions"),
        ("days" = Option<i64>, Query, description = "Window for upcoming tasks"),
    ),
    responses(
        (status = 200, description = "Task list"),
        (status = 400, description = "Unknown list type"),
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = auth.user_id.as_str();
    let now = Utc::now();

    let body = match query.kind.as_deref().unwrap_or("pending") {
        "pending" => json!({ "tasks": state.scheduler.pending_tasks(owner).await }),
        "upcoming" => {
            let days = query.days.unwrap_or(UPCOMING_DAYS);
            json!({ "tasks": state.scheduler.upcoming_tasks(owner, days, now).await })
        }
        "suggestions" => {
            let tasks = state.scheduler.suggestion_tasks(owner).await;
            let suggested = state.scheduler.generate_smart_suggestions(owner, now).await;
            json!({ "tasks": tasks, "suggested": suggested })
        }
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown task list type '{}'",
                other
            )))
        }
    };

    Ok(Json(body))
}

#[utoipa::path(post, path = "/api/v1/tasks", tag = "Tasks",
    responses(
        (status = 201, description = "Task scheduled", body = CreateTaskResponse),
        (status = 400, description = "Invalid task"),
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<CreateTaskResponse>), ApiError> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "title exceeds {} characters",
            MAX_TITLE_CHARS
        )));
    }

    let recurrence = body
        .recurrence
        .or_else(|| body.recurrence_pattern.map(Recurrence::new));

    let mut new = NewTask::new(&auth.user_id, title, body.task_type, body.scheduled_for)
        .with_metadata(body.metadata);
    if let Some(description) = body.description.filter(|d| !d.trim().is_empty()) {
        new = new.with_description(description);
    }
    if let Some(recurrence) = recurrence {
        new = new.with_recurrence(recurrence);
    }

    let task_type = new.task_type;
    let id = state.scheduler.schedule_task(new).await?;
    info!(
        subsystem = "api",
        component = "tasks",
        op = "create",
        owner = %auth.user_id,
        task_id = %id,
        task_type = %task_type,
        "Task scheduled"
    );

    record_activity_detached(
        &state,
        &auth.user_id,
        ACTIVITY_TASK_CREATED,
        json!({ "taskId": id, "taskType": task_type }),
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateTaskResponse { id, success: true }),
    ))
}

#[utoipa::path(patch, path = "/api/v1/tasks/{id}", tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task updated"),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Task already closed"),
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTaskBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = auth.user_id.as_str();
    match body.action {
        TaskAction::Complete => {
            state.scheduler.complete_task(id, owner).await?;
            Ok(Json(json!({ "success": true })))
        }
        TaskAction::Cancel => {
            state.scheduler.cancel_task(id, owner).await?;
            Ok(Json(json!({ "success": true })))
        }
        TaskAction::Snooze => {
            let until = state
                .scheduler
                .snooze_task(id, owner, body.snooze_minutes)
                .await?;
            Ok(Json(json!({ "success": true, "scheduledFor": until })))
        }
    }
}
