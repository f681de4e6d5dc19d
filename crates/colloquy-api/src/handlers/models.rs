//! Model catalog endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use colloquy_core::Tier;
use colloquy_inference::ModelInfo;

use crate::{ApiError, AppState, RequireAuth};

#[derive(Debug, Serialize)]
pub struct ListModelsResponse {
    pub tier: Tier,
    /// Models usable at `tier` from providers with credentials configured.
    pub models: Vec<ModelInfo>,
}

#[utoipa::path(get, path = "/api/v1/models", tag = "Models",
    responses((status = 200, description = "Models available to the caller's tier"))
)]
pub async fn list_models(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<ListModelsResponse>, ApiError> {
    let tier = state.usage.tier(&auth.user_id).await;
    let models = state
        .optimizer
        .catalog()
        .get_models_for_tier(tier)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(ListModelsResponse { tier, models }))
}
