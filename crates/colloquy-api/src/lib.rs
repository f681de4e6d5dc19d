//! # colloquy-api
//!
//! HTTP surface of the colloquy assistant backend: task scheduling,
//! streaming chat with model routing, personas, proactive suggestions,
//! usage reporting and the identity-provider webhook.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

use axum::routing::{get, patch, post};
use axum::{Json, Router};
use utoipa::OpenApi;

pub use auth::{RequireAuth, SessionVerifier};
pub use error::ApiError;
pub use state::{AppState, GlobalRateLimiter};

use handlers::{chat, health, models, personas, suggestions, tasks, usage, webhooks};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Colloquy API",
        description = "Assistant backend: scheduling, model routing and usage metering"
    ),
    paths(
        health::health_check,
        tasks::list_tasks,
        tasks::create_task,
        tasks::update_task,
        chat::chat,
        personas::list_personas,
        personas::create_persona,
        personas::update_persona,
        personas::delete_persona,
        suggestions::list_suggestions,
        suggestions::generate_suggestions,
        suggestions::update_suggestion,
        usage::get_usage,
        models::list_models,
        webhooks::identity_webhook,
    ),
    components(schemas(tasks::CreateTaskResponse)),
    tags(
        (name = "Tasks", description = "Reminders, follow-ups and recurring tasks"),
        (name = "Chat", description = "Streaming chat with model routing"),
        (name = "Personas", description = "Assistant personas"),
        (name = "Suggestions", description = "Proactive suggestions"),
        (name = "Usage", description = "Usage metering and quotas"),
        (name = "Models", description = "Model catalog"),
        (name = "Webhooks", description = "Identity provider callbacks"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

/// All routes with the global rate limiter applied. Transport layers
/// (tracing, CORS, request ids) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/v1/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route(
            "/api/v1/tasks",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route("/api/v1/tasks/:id", patch(tasks::update_task))
        .route("/api/v1/chat", post(chat::chat))
        .route(
            "/api/v1/personas",
            get(personas::list_personas).post(personas::create_persona),
        )
        .route(
            "/api/v1/personas/:id",
            patch(personas::update_persona).delete(personas::delete_persona),
        )
        .route(
            "/api/v1/suggestions",
            get(suggestions::list_suggestions).post(suggestions::generate_suggestions),
        )
        .route(
            "/api/v1/suggestions/:id",
            patch(suggestions::update_suggestion),
        )
        .route("/api/v1/usage", get(usage::get_usage))
        .route("/api/v1/models", get(models::list_models))
        .route(
            "/api/v1/webhooks/identity",
            post(webhooks::identity_webhook),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .with_state(state)
}
