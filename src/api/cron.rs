use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::error::{ AppError, Result };
use crate::executor::TickSummary;
use crate::services::RecurrenceSummary;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct CronResponse {
    #[serde(flatten)]
    pub tick: TickSummary,
    pub recurrence: RecurrenceSummary,
}

/// Tick entry point for the external scheduler. Guarded by a shared
/// bearer secret; re-triggering is always safe.
pub async fn execute(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CronResponse>> {
    authorize(&headers, &state.cron_secret)?;

    let now = Utc::now();
    // Materialize recurring boundaries first so a row due this tick can
    // execute this tick.
    let recurrence = state.recurrence.run(now).await?;
    let tick = state.executor.run(now).await?;

    Ok(Json(CronResponse { tick, recurrence }))
}

fn authorize(headers: &HeaderMap, secret: &str) -> Result<()> {
    let provided = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == secret => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}
