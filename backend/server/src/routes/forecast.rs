use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::Local;

use crate::{error::AppError, planner::plan_next_shift, state::State as AppState};

/// Served at `/predict` and `/api/optimization`.
pub async fn predict_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let plan = plan_next_shift(&*state.store, &state.config, Local::now().naive_local()).await?;

    Ok(Json(plan).into_response())
}
