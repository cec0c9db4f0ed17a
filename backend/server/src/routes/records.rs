use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use census::{
    CensusEntry, ETU_WARD, EventFilter, EventKind, ForecastRecord, ShiftId,
    events::{CENSUS_EVENT, SURGE_EVENT},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::AppError,
    state::State as AppState,
    utils::{message, require},
};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 200;
const TREND_POINTS: usize = 10;

#[derive(Deserialize, Debug)]
pub struct HistoryQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub ward: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurgeStatus {
    pub count: u32,
    pub last_updated: Option<NaiveDate>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub name: String,
    #[serde(rename = "Observed", skip_serializing_if = "Option::is_none")]
    pub observed: Option<u32>,
    #[serde(rename = "Predicted", skip_serializing_if = "Option::is_none")]
    pub predicted: Option<u32>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add-record", post(add_record_handler))
        .route("/get-history", get(history_handler))
        .route("/get-trend-data", get(trend_handler))
}

async fn add_record_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;

    let event = EventKind::from_payload(payload)
        .map_err(|e| AppError::bad_request(format!("Invalid record: {e}")))?;

    if let EventKind::SurgeUpdate(update) = &event {
        require(Some(update.ward_id.as_str()), "Ward_ID")?;
    }

    let stored = state.store.append_event(event).await?;
    debug!(
        "Saved {} record #{} for {}",
        stored.event.date(),
        stored.seq,
        stored.event.ward_id()
    );

    Ok(message(StatusCode::OK, "Saved successfully!"))
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;

    match query.kind.as_deref().unwrap_or(CENSUS_EVENT) {
        SURGE_EVENT => {
            let ward = require(query.ward.as_deref(), "ward")?;
            let latest = state
                .store
                .list_events(&EventFilter::surge(ward))
                .await?
                .into_iter()
                .rev()
                .find_map(|event| event.surge().cloned());

            let status = match latest {
                Some(update) => SurgeStatus {
                    count: update.surge_capacity,
                    last_updated: Some(update.date),
                },
                None => SurgeStatus {
                    count: 0,
                    last_updated: None,
                },
            };

            Ok(Json(status).into_response())
        }
        CENSUS_EVENT => {
            let ward = query.ward.as_deref().unwrap_or(ETU_WARD);
            let limit = clamp_limit(query.limit);

            let entries: Vec<CensusEntry> = state
                .store
                .list_events(&EventFilter::census(ward))
                .await?
                .iter()
                .rev()
                .filter_map(|event| event.census().cloned())
                .take(limit)
                .collect();

            Ok(Json(entries).into_response())
        }
        other => Err(AppError::bad_request(format!(
            "Unknown history type '{other}'"
        ))),
    }
}

async fn trend_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let observed: Vec<CensusEntry> = state
        .store
        .list_events(&EventFilter::census(ETU_WARD))
        .await?
        .iter()
        .filter_map(|event| event.census().cloned())
        .collect();
    let forecasts = state.store.list_forecasts().await?;

    Ok(Json(merge_trend(&observed, &forecasts)).into_response())
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

/// `"Feb 13 (D)"` style chart label.
pub fn trend_label(date: NaiveDate, shift: ShiftId) -> String {
    let initial = match shift {
        ShiftId::Day => 'D',
        ShiftId::Night => 'N',
    };

    format!("{} ({initial})", date.format("%b %d"))
}

/// Last observed shifts and last forecasts on one axis, oldest first. Both inputs are sorted ascending.
pub fn merge_trend(observed: &[CensusEntry], forecasts: &[ForecastRecord]) -> Vec<TrendPoint> {
    let mut points: BTreeMap<(NaiveDate, ShiftId), TrendPoint> = BTreeMap::new();

    for entry in observed.iter().rev().take(TREND_POINTS) {
        points
            .entry((entry.date, entry.shift))
            .or_insert_with(|| empty_point(entry.date, entry.shift))
            .observed = Some(entry.admissions);
    }

    for record in forecasts.iter().rev().take(TREND_POINTS) {
        points
            .entry((record.target_date, record.target_shift))
            .or_insert_with(|| empty_point(record.target_date, record.target_shift))
            .predicted = Some(record.predicted_arrivals);
    }

    points.into_values().collect()
}

fn empty_point(date: NaiveDate, shift: ShiftId) -> TrendPoint {
    TrendPoint {
        name: trend_label(date, shift),
        observed: None,
        predicted: None,
    }
}
