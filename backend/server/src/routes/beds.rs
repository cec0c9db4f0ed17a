use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use census::{Bed, BedStatus, StoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::AppError,
    planner::ward_snapshot,
    state::State as AppState,
    utils::{message, require},
};

#[derive(Deserialize, Debug)]
pub struct NewBed {
    pub bed_id: Option<String>,
    pub ward_id: Option<String>,
    #[serde(default)]
    pub bed_type: String,
    #[serde(default)]
    pub ward_name: String,
}

#[derive(Deserialize, Debug)]
pub struct StatusChange {
    pub bed_id: Option<String>,
    pub status: BedStatus,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct WardStatus {
    pub ward_id: String,
    pub capacity: u32,
    pub available: u32,
    pub occupied: u32,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add-bed", post(add_bed_handler))
        .route("/get-beds", get(list_beds_handler))
        .route("/update-bed-status", put(update_status_handler))
        .route("/ward-status/{ward_id}", get(ward_status_handler))
}

async fn add_bed_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewBed>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let bed_id = require(request.bed_id.as_deref(), "bed_id")?;
    let ward_id = require(request.ward_id.as_deref(), "ward_id")?;

    let bed = Bed::new(bed_id, &request.bed_type, ward_id, &request.ward_name);

    match state.store.insert_bed(&bed).await {
        Ok(()) => {}
        Err(StoreError::Duplicate(_)) => {
            return Err(AppError::Conflict(format!("Bed ID '{}' exists!", bed.bed_id)));
        }
        Err(e) => return Err(e.into()),
    }

    info!("Added bed {} to {}", bed.bed_id, bed.ward_id);
    Ok(message(StatusCode::CREATED, "Bed added!"))
}

async fn list_beds_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let beds = state.store.list_beds().await?;

    Ok(Json(beds).into_response())
}

async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(change) = payload?;
    let bed_id = require(change.bed_id.as_deref(), "bed_id")?;

    if !state
        .store
        .set_bed_status(bed_id, change.status, Utc::now())
        .await?
    {
        return Err(AppError::not_found("Bed not found"));
    }

    Ok(message(StatusCode::OK, "Updated!"))
}

async fn ward_status_handler(
    State(state): State<Arc<AppState>>,
    Path(ward_id): Path<String>,
) -> Result<Response, AppError> {
    let beds = state.store.list_beds().await?;
    let snapshot = ward_snapshot(&*state.store, &beds, &ward_id).await?;
    let available = snapshot.available();

    Ok(Json(WardStatus {
        ward_id: snapshot.ward_id,
        capacity: snapshot.capacity,
        available,
        occupied: snapshot.capacity - available,
    })
    .into_response())
}
