use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use issuebot_core::sweep::{sweep_all, SweepFailure};
use serde::Serialize;
use tracing::info;

use crate::auth::bearer_matches;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub examined: usize,
    pub actions: usize,
    pub failed: usize,
    pub failures: Vec<SweepFailure>,
}

/// POST /cron/stale: sweep every repo with issue cleanup configured and
/// apply the resulting actions.
pub async fn stale(State(app): State<AppState>, headers: HeaderMap) -> Result<Json<SweepResponse>, AppError> {
    if let Some(token) = &app.cron_token {
        if !bearer_matches(&headers, token) {
            return Err(AppError::unauthorized("missing or invalid bearer token"));
        }
    }

    let report = sweep_all(&app.config, app.reader.clone(), Utc::now()).await;
    let records = app.dispatcher.dispatch_all(report.actions).await;
    app.record(&records);

    let failed = records.iter().filter(|r| r.outcome.is_failure()).count();
    info!(
        examined = report.examined,
        actions = records.len(),
        failed,
        sweep_failures = report.failures.len(),
        "stale sweep complete"
    );

    Ok(Json(SweepResponse {
        examined: report.examined,
        actions: records.len(),
        failed,
        failures: report.failures,
    }))
}
