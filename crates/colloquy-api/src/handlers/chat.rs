//! Streaming chat endpoint.
//!
//! Order of work for one request: quota check, model selection (explicit
//! model, then `X-Model`, then the default persona's preference), provider
//! stream with fallback, then best-effort bookkeeping. Tokens are relayed as
//! SSE `token` events followed by a single `done` event.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::Json;
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use colloquy_core::{
    ChatRole, ChatTurn, NewUsageEvent, Persona, UsageKind,
    ACTIVITY_CHAT_MESSAGE,
};
use colloquy_inference::{
    open_stream_with_fallback, ExpectedOutput, ModelRecommendation, Strategy, TokenStream,
};

use super::record_activity_detached;
use crate::{ApiError, AppState, RequireAuth};

/// Header naming the requested model, and on responses the serving model.
pub const MODEL_HEADER: &str = "x-model";

const THREAD_TITLE_CHARS: usize = 60;

/// Body of `POST /api/v1/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub thread_id: Option<Uuid>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub expected_output: Option<ExpectedOutput>,
    #[serde(default)]
    pub has_attachments: bool,
}

#[utoipa::path(post, path = "/api/v1/chat", tag = "Chat",
    responses(
        (status = 200, description = "SSE token stream"),
        (status = 400, description = "Invalid request or unknown model"),
        (status = 403, description = "Requested model needs a higher tier"),
        (status = 429, description = "Monthly quota exhausted"),
        (status = 502, description = "Every candidate model failed"),
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    auth: RequireAuth,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let owner = auth.user_id.clone();
    let now = Utc::now();

    let user_text = body
        .messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("a non-empty user message is required".to_string()))?;

    let decision = state
        .usage
        .can_make_request(UsageKind::ApiCall, 1, &owner, now)
        .await?;
    if !decision.allowed {
        info!(
            subsystem = "api",
            component = "chat",
            owner = %owner,
            reason = decision.reason.as_deref().unwrap_or(""),
            "Chat request denied by quota"
        );
        return Err(ApiError::TooManyRequests {
            message: decision
                .reason
                .unwrap_or_else(|| "Monthly usage limit exceeded".to_string()),
            reset_time: decision.reset_time,
        });
    }

    let tier = state.usage.tier(&owner).await;
    let persona = match state.personas.get_default(&owner).await {
        Ok(p) => p,
        Err(e) => {
            warn!(
                subsystem = "api",
                component = "chat",
                owner = %owner,
                error = %e,
                "Default persona lookup failed, continuing without persona"
            );
            None
        }
    };

    let requested = body.model.clone().or_else(|| {
        headers
            .get(MODEL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });
    let recommendation = select_model(
        &state,
        &body,
        &user_text,
        tier,
        requested.as_deref().map(str::trim).filter(|m| !m.is_empty()),
        persona.as_ref(),
    )?;

    let mut messages = Vec::with_capacity(body.messages.len() + 1);
    if let Some(persona) = &persona {
        messages.push(ChatTurn::new(ChatRole::System, persona.system_prompt.clone()));
    }
    messages.extend(body.messages.iter().cloned());

    let (model, stream) = open_stream_with_fallback(
        state.chat.as_ref(),
        &state.optimizer,
        &recommendation,
        &messages,
    )
    .await?;
    debug!(
        subsystem = "api",
        component = "chat",
        owner = %owner,
        model = %model.id,
        estimated_cost_cents = recommendation.estimated_cost_cents,
        "Stream opened"
    );

    if let Some(intent) = state.intents.parse(&user_text, now) {
        let scheduler = state.scheduler.clone();
        let owner = owner.clone();
        tokio::spawn(async move {
            if let Err(e) = scheduler.schedule_from_intent(&owner, &intent).await {
                warn!(
                    subsystem = "api",
                    component = "chat",
                    owner = %owner,
                    error = %e,
                    "Failed to schedule task from chat intent"
                );
            }
        });
    }

    let thread_id = persist_user_turn(&state, &owner, body.thread_id, &user_text).await;

    record_activity_detached(
        &state,
        &owner,
        ACTIVITY_CHAT_MESSAGE,
        json!({ "model": model.id, "threadId": thread_id }),
    );
    state.usage.track_detached(
        NewUsageEvent::new(&owner, UsageKind::ApiCall, "chat", 1)
            .with_metadata(json!({ "model": model.id })),
    );

    let input_tokens: usize = messages
        .iter()
        .map(|m| state.tokenizer.count_tokens(&m.content))
        .sum();
    let rx = relay(state, owner, model.id.clone(), thread_id, input_tokens, stream);

    let mut response = Sse::new(ReceiverStream::new(rx))
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keepalive"),
        )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&model.id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(MODEL_HEADER), value);
    }
    Ok(response)
}

fn select_model(
    state: &AppState,
    body: &ChatRequest,
    user_text: &str,
    tier: colloquy_core::Tier,
    requested: Option<&str>,
    persona: Option<&Persona>,
) -> Result<ModelRecommendation, ApiError> {
    let optimizer = &state.optimizer;
    let expected = body.expected_output.unwrap_or_default();
    let base = optimizer.recommend_for_input(
        user_text,
        body.has_attachments,
        expected,
        tier,
        body.strategy.unwrap_or(optimizer.config().default_strategy),
    )?;

    if let Some(model_id) = requested {
        return Ok(optimizer.pin_model(model_id, user_text, body.has_attachments, expected, tier, base)?);
    }

    if let Some(preferred) = persona.and_then(|p| p.preferred_model.as_deref()) {
        return match optimizer.pin_model(
            preferred,
            user_text,
            body.has_attachments,
            expected,
            tier,
            base.clone(),
        ) {
            Ok(rec) => Ok(rec),
            Err(e) => {
                warn!(
                    subsystem = "api",
                    component = "chat",
                    model = preferred,
                    error = %e,
                    "Persona model unavailable, using recommendation"
                );
                Ok(base)
            }
        };
    }

    Ok(base)
}

/// Attach the user's message to a thread. Failures are logged and leave the
/// exchange unthreaded.
async fn persist_user_turn(
    state: &AppState,
    owner: &str,
    thread_id: Option<Uuid>,
    text: &str,
) -> Option<Uuid> {
    let title: String = text.chars().take(THREAD_TITLE_CHARS).collect();
    let thread_id = match state.threads.ensure_thread(owner, thread_id, &title).await {
        Ok(id) => id,
        Err(e) => {
            warn!(
                subsystem = "api",
                component = "chat",
                owner = %owner,
                error = %e,
                "Failed to open chat thread"
            );
            return None;
        }
    };
    if let Err(e) = state
        .threads
        .append_message(thread_id, ChatRole::User, text, None)
        .await
    {
        warn!(
            subsystem = "api",
            component = "chat",
            thread_id = %thread_id,
            error = %e,
            "Failed to store user message"
        );
    }
    Some(thread_id)
}

/// Forward provider tokens to the client. After the stream ends, token usage
/// is tracked and the assistant reply stored, even if the client has gone.
fn relay(
    state: AppState,
    owner: String,
    model_id: String,
    thread_id: Option<Uuid>,
    input_tokens: usize,
    mut stream: TokenStream,
) -> mpsc::Receiver<Result<Event, Infallible>> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut reply = String::new();
        let mut client_open = true;

        while let Some(item) = stream.next().await {
            match item {
                Ok(token) => {
                    reply.push_str(&token);
                    if client_open {
                        let event = Event::default()
                            .event("token")
                            .data(json!({ "content": token }).to_string());
                        client_open = tx.send(Ok(event)).await.is_ok();
                    }
                }
                Err(e) => {
                    warn!(
                        subsystem = "api",
                        component = "chat",
                        model = %model_id,
                        error = %e,
                        "Provider stream failed mid-response"
                    );
                    if client_open {
                        let event = Event::default()
                            .event("error")
                            .data(json!({ "error": e.to_string() }).to_string());
                        client_open = tx.send(Ok(event)).await.is_ok();
                    }
                    break;
                }
            }
        }

        if client_open {
            let done = Event::default()
                .event("done")
                .data(json!({ "model": model_id, "threadId": thread_id }).to_string());
            let _ = tx.send(Ok(done)).await;
        }
        drop(tx);

        let output_tokens = state.tokenizer.count_tokens(&reply);
        state
            .usage
            .track(
                NewUsageEvent::new(
                    &owner,
                    UsageKind::TokenUsage,
                    "chat",
                    (input_tokens + output_tokens) as u64,
                )
                .with_metadata(json!({
                    "model": model_id,
                    "inputTokens": input_tokens,
                    "outputTokens": output_tokens,
                })),
            )
            .await;

        if let (Some(thread_id), false) = (thread_id, reply.is_empty()) {
            if let Err(e) = state
                .threads
                .append_message(thread_id, ChatRole::Assistant, &reply, Some(&model_id))
                .await
            {
                warn!(
                    subsystem = "api",
                    component = "chat",
                    thread_id = %thread_id,
                    error = %e,
                    "Failed to store assistant message"
                );
            }
        }
    });

    rx
}
