//! Usage summary endpoint.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use colloquy_core::{billing_period_start, next_billing_period_start};

use crate::services::LimitCheck;
use crate::{ApiError, AppState, RequireAuth};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    #[serde(flatten)]
    pub check: LimitCheck,
    pub period_start: DateTime<Utc>,
    pub reset_time: DateTime<Utc>,
}

#[utoipa::path(get, path = "/api/v1/usage", tag = "Usage",
    responses((status = 200, description = "Usage this billing month against tier limits"))
)]
pub async fn get_usage(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<UsageResponse>, ApiError> {
    let now = Utc::now();
    let check = state.usage.check_limits(&auth.user_id, now).await?;
    Ok(Json(UsageResponse {
        check,
        period_start: billing_period_start(now),
        reset_time: next_billing_period_start(now),
    }))
}
