//! # Shift Planner
//!
//! Answers "how many patients will reach the ETU next shift, and where do they go".
//!
//! ## Forecast
//!
//! - The next shift is picked from the local clock: during the day shift we plan
//!   tonight, after 19:00 tomorrow's day shift, before 07:00 today's day shift.
//! - Arrivals are the mean admissions of the last [`FORECAST_WINDOW`] shifts of the
//!   same kind (day or night), with an 80% band of `mean ± 1.2816σ`.
//! - At least [`MIN_HISTORY`] ETU entries are required before anything is predicted.
//!
//! ## Allocation
//!
//! Each arrival costs 1 kept in the ETU, 2 moved to a free ward bed, 10 on a
//! surge bed, 100 sent to another hospital. The costs are strictly tiered so
//! filling the cheapest slots first is the minimum-cost plan. Inside a tier
//! Ward A fills before Ward B before General.
//!
//! ## Inputs
//!
//! | Input | Source |
//! |---|---|
//! | ETU capacity | functional ETU beds, `ETU_DEFAULT_CAPACITY` when none are registered |
//! | Starting occupancy | ETU census of the previous shift, else the latest, else 0 |
//! | Ward free beds | functional beds minus the ward's latest `OccupiedBeds` |
//! | Surge limits | the ward's latest surge update, else 10 / 0 / 12 |
use census::{
    AllocationPlan, Bed, CensusEntry, ETU_WARD, EventFilter, ForecastRecord, ShiftId, Store,
    StoreError, beds::functional_count,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::{config::Config, error::AppError};

pub const MIN_HISTORY: usize = 50;
pub const FORECAST_WINDOW: usize = 14;
const Z_80: f64 = 1.2816;

pub const WARD_A: &str = "WARD-A";
pub const WARD_B: &str = "WARD-B";
pub const GENERAL_WARD: &str = "GEN";

const DEFAULT_SURGE_A: u32 = 10;
const DEFAULT_SURGE_B: u32 = 0;
const DEFAULT_SURGE_GENERAL: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WardSnapshot {
    pub ward_id: String,
    pub capacity: u32,
    pub occupied: u32,
}

impl WardSnapshot {
    pub fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.occupied)
    }
}

/// Capacity from the bed inventory, occupancy from the ward's latest census.
pub async fn ward_snapshot(
    store: &dyn Store,
    beds: &[Bed],
    ward_id: &str,
) -> Result<WardSnapshot, StoreError> {
    let occupied = store
        .list_events(&EventFilter::census(ward_id))
        .await?
        .iter()
        .rev()
        .find_map(|event| event.census().map(|entry| entry.occupied_beds))
        .unwrap_or(0);

    Ok(WardSnapshot {
        ward_id: ward_id.to_string(),
        capacity: functional_count(beds, ward_id),
        occupied,
    })
}

async fn surge_limit(store: &dyn Store, ward_id: &str, default: u32) -> Result<u32, StoreError> {
    let latest = store
        .list_events(&EventFilter::surge(ward_id))
        .await?
        .iter()
        .rev()
        .find_map(|event| event.surge().map(|update| update.surge_capacity));

    Ok(latest.unwrap_or(default))
}

pub fn target_shift(now: NaiveDateTime) -> (NaiveDate, ShiftId) {
    let today = now.date();

    match now.hour() {
        7..=18 => (today, ShiftId::Night),
        19.. => (today + Duration::days(1), ShiftId::Day),
        _ => (today, ShiftId::Day),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecast {
    pub predicted: u32,
    pub low: u32,
    pub high: u32,
}

/// Falls back to every shift when none of `shift`'s kind exist.
pub fn forecast_arrivals(history: &[CensusEntry], shift: ShiftId) -> Forecast {
    let same_shift: Vec<f64> = history
        .iter()
        .rev()
        .filter(|entry| entry.shift == shift)
        .take(FORECAST_WINDOW)
        .map(|entry| f64::from(entry.admissions))
        .collect();

    let window = if same_shift.is_empty() {
        history
            .iter()
            .rev()
            .take(FORECAST_WINDOW)
            .map(|entry| f64::from(entry.admissions))
            .collect()
    } else {
        same_shift
    };

    if window.is_empty() {
        return Forecast {
            predicted: 0,
            low: 0,
            high: 0,
        };
    }

    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let spread = Z_80 * variance.sqrt();

    Forecast {
        predicted: mean.round() as u32,
        low: (mean - spread).max(0.0).floor() as u32,
        high: (mean + spread).max(0.0).floor() as u32,
    }
}

/// `OccupiedBeds` of the shift right before the target one.
pub fn starting_occupancy(history: &[CensusEntry], date: NaiveDate, shift: ShiftId) -> u32 {
    let (prior_date, prior_shift) = shift.previous(date);

    history
        .iter()
        .find(|entry| entry.date == prior_date && entry.shift == prior_shift)
        .or_else(|| history.last())
        .map(|entry| entry.occupied_beds)
        .unwrap_or(0)
}

/// Upper bounds for each destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slots {
    pub keep: u32,
    pub ward_a: u32,
    pub ward_b: u32,
    pub general: u32,
    pub surge_a: u32,
    pub surge_b: u32,
    pub surge_general: u32,
}

pub fn allocate(arrivals: u32, slots: &Slots) -> AllocationPlan {
    let mut remaining = arrivals;
    let mut take = |limit: u32| {
        let taken = remaining.min(limit);
        remaining -= taken;
        taken
    };

    let direct_admit = take(slots.keep);
    let transfer_a = take(slots.ward_a);
    let transfer_b = take(slots.ward_b);
    let transfer_gen = take(slots.general);
    let surge_beds = take(slots.surge_a) + take(slots.surge_b) + take(slots.surge_general);

    AllocationPlan {
        direct_admit,
        transfer_a,
        transfer_b,
        transfer_gen,
        surge_beds,
        external_transfer: remaining,
    }
}

/// Occupancy counts come straight from the census forms, so the product is taken in `u64`.
pub fn occupancy_percentage(occupancy: u32, capacity: u32) -> u32 {
    if capacity == 0 {
        return 100;
    }

    let percent = u64::from(occupancy) * 100 / u64::from(capacity);
    u32::try_from(percent).unwrap_or(u32::MAX)
}

pub fn risk_level(predicted: u32) -> &'static str {
    match predicted {
        31.. => "Critical",
        16..=30 => "High",
        _ => "Normal",
    }
}

pub fn recommendation(plan: &AllocationPlan, risk: &str) -> &'static str {
    if plan.surge_beds > 0 {
        "CRITICAL: Activate Corridor C Protocols immediately."
    } else if risk == "High" {
        "High load expected. Approve overtime."
    } else {
        "Standard operation."
    }
}

fn primary_driver(latest: Option<&CensusEntry>) -> &'static str {
    let Some(entry) = latest else {
        return "Standard Load";
    };

    if entry.outbreak_alert.as_deref() == Some("Yes") {
        "Outbreak Alert"
    } else if entry.weather.as_deref() == Some("Rainy") {
        "Weather-Driven Surge"
    } else {
        "Standard Load"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRow {
    pub period: String,
    pub prediction: u32,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transfers {
    pub ward_a: u32,
    pub ward_b: u32,
    pub general: u32,
}

/// Dashboard payload, field names are what the frontend charts read.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftPlan {
    pub current_occupancy: u32,
    pub total_capacity: u32,
    pub occupancy_percentage: u32,
    pub predicted_arrivals: u32,
    pub system_status: &'static str,
    pub primary_driver: &'static str,
    pub timeframe_label: &'static str,
    pub graph_labels: Vec<String>,
    pub observed_history: Vec<Option<u32>>,
    pub ai_prediction: Vec<Option<u32>>,
    pub capacity_line: u32,
    pub heatmap_risk_levels: Vec<&'static str>,
    pub model_used: &'static str,
    pub forecast_table_rows: Vec<ForecastRow>,
    pub optimization_status: &'static str,
    pub shortage_count: u32,
    pub action_plan_keep_etu: u32,
    pub action_plan_transfers: Transfers,
    pub action_plan_surge: u32,
    pub action_plan_external: u32,
    pub recommendation_text: &'static str,
}

/// ETU census entries dated today or earlier, oldest first.
async fn etu_history(store: &dyn Store, today: NaiveDate) -> Result<Vec<CensusEntry>, StoreError> {
    Ok(store
        .list_events(&EventFilter::census(ETU_WARD))
        .await?
        .iter()
        .filter_map(|event| event.census())
        .filter(|entry| entry.date <= today)
        .cloned()
        .collect())
}

/// Forecasts the next shift, allocates its arrivals and records the plan.
pub async fn plan_next_shift(
    store: &dyn Store,
    config: &Config,
    now: NaiveDateTime,
) -> Result<ShiftPlan, AppError> {
    let history = etu_history(store, now.date()).await?;
    if history.len() < MIN_HISTORY {
        return Err(AppError::InsufficientHistory(history.len()));
    }

    let (target_date, shift) = target_shift(now);
    let forecast = forecast_arrivals(&history, shift);
    info!(
        "Predicting {target_date} ({shift}): {} arrivals",
        forecast.predicted
    );

    let occupancy = starting_occupancy(&history, target_date, shift);
    let beds = store.list_beds().await?;
    let etu_capacity = match functional_count(&beds, ETU_WARD) {
        0 => config.etu_default_capacity,
        count => count,
    };

    let ward_a = ward_snapshot(store, &beds, WARD_A).await?;
    let ward_b = ward_snapshot(store, &beds, WARD_B).await?;
    let general = ward_snapshot(store, &beds, GENERAL_WARD).await?;

    let slots = Slots {
        keep: etu_capacity.saturating_sub(occupancy),
        ward_a: ward_a.available(),
        ward_b: ward_b.available(),
        general: general.available(),
        surge_a: surge_limit(store, WARD_A, DEFAULT_SURGE_A).await?,
        surge_b: surge_limit(store, WARD_B, DEFAULT_SURGE_B).await?,
        surge_general: surge_limit(store, GENERAL_WARD, DEFAULT_SURGE_GENERAL).await?,
    };
    let plan = allocate(forecast.predicted, &slots);

    let record = ForecastRecord {
        generated_at: Utc::now(),
        target_date,
        target_shift: shift,
        predicted_arrivals: forecast.predicted,
        etu_capacity_used: etu_capacity,
        starting_occupancy: occupancy,
        optimization_plan: plan,
    };
    if let Err(e) = store.upsert_forecast(&record).await {
        warn!("Failed to save forecast {}: {e}", record.key());
    }

    Ok(shift_plan(&history, target_date, shift, forecast, occupancy, etu_capacity, plan))
}

fn shift_plan(
    history: &[CensusEntry],
    target_date: NaiveDate,
    shift: ShiftId,
    forecast: Forecast,
    occupancy: u32,
    etu_capacity: u32,
    plan: AllocationPlan,
) -> ShiftPlan {
    let day_label = |days_before: i64| {
        (target_date - Duration::days(days_before))
            .format("%b %d")
            .to_string()
    };
    let graph_labels = vec![
        day_label(3),
        day_label(2),
        day_label(1),
        format!("{} (Pred)", day_label(0)),
    ];

    let mut observed_history: Vec<Option<u32>> = history
        .iter()
        .rev()
        .take(3)
        .rev()
        .map(|entry| Some(entry.admissions))
        .collect();
    observed_history.push(None);

    let occupancy_percentage = occupancy_percentage(occupancy, etu_capacity);
    let risk = risk_level(forecast.predicted);

    ShiftPlan {
        current_occupancy: occupancy,
        total_capacity: etu_capacity,
        occupancy_percentage,
        predicted_arrivals: forecast.predicted,
        system_status: if occupancy_percentage > 90 {
            "CRITICAL"
        } else {
            "NORMAL"
        },
        primary_driver: primary_driver(history.last()),
        timeframe_label: "Next Shift",
        graph_labels,
        observed_history,
        ai_prediction: vec![None, None, None, Some(forecast.predicted)],
        capacity_line: etu_capacity,
        heatmap_risk_levels: vec!["Low", "Medium", "High", risk],
        model_used: "Seasonal Moving Average",
        forecast_table_rows: vec![ForecastRow {
            period: format!("{} ({shift})", target_date.format("%b %d")),
            prediction: forecast.predicted,
            min: forecast.low,
            max: forecast.high,
        }],
        optimization_status: "Allocation Ready",
        shortage_count: forecast.predicted.saturating_sub(plan.direct_admit),
        action_plan_keep_etu: plan.direct_admit,
        action_plan_transfers: Transfers {
            ward_a: plan.transfer_a,
            ward_b: plan.transfer_b,
            general: plan.transfer_gen,
        },
        action_plan_surge: plan.surge_beds,
        action_plan_external: plan.external_transfer,
        recommendation_text: recommendation(&plan, risk),
    }
}
