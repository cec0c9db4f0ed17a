use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::events::ShiftId;

/// Where the predicted ETU arrivals of one shift should go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub direct_admit: u32,
    #[serde(rename = "transfer_A")]
    pub transfer_a: u32,
    #[serde(rename = "transfer_B")]
    pub transfer_b: u32,
    #[serde(rename = "transfer_Gen")]
    pub transfer_gen: u32,
    pub surge_beds: u32,
    pub external_transfer: u32,
}

impl AllocationPlan {
    pub fn total(&self) -> u32 {
        self.direct_admit
            + self.transfer_a
            + self.transfer_b
            + self.transfer_gen
            + self.surge_beds
            + self.external_transfer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub generated_at: DateTime<Utc>,
    pub target_date: NaiveDate,
    pub target_shift: ShiftId,
    pub predicted_arrivals: u32,
    pub etu_capacity_used: u32,
    pub starting_occupancy: u32,
    pub optimization_plan: AllocationPlan,
}

impl ForecastRecord {
    /// Upsert key, one record per target shift.
    pub fn key(&self) -> String {
        format!("{}_{}", self.target_date, self.target_shift)
    }
}
