use axum::{extract::State, response::IntoResponse, response::Response, Json};
use chrono::Utc;

use crate::db::DbPool;
use crate::error::Result;
use crate::sweepers;

#[derive(Clone)]
pub struct SweepState {
    pub pool: DbPool,
}

/// Run all expiry sweeps once, outside the timer. Returns per-sweep counts.
pub async fn run(State(state): State<SweepState>) -> Result<Response> {
    let outcome = sweepers::run_all(&state.pool, Utc::now()).await?;
    Ok(Json(outcome).into_response())
}
