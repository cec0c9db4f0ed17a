use census::{CensusEntry, ETU_WARD, ShiftId, utils::parse_date};
use serde::Deserialize;

/// One row of the historical ETU dataset export.
#[derive(Debug, Deserialize)]
pub struct HistoryRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Shift_ID")]
    pub shift: ShiftId,
    #[serde(rename = "ETU_Admissions", default)]
    pub admissions: f64,
    #[serde(rename = "ETU_Discharges", default)]
    pub discharges: f64,
    #[serde(rename = "ETU_OccupiedBeds", default)]
    pub occupied_beds: f64,
    #[serde(rename = "ETU_BedCapacity", default)]
    pub bed_capacity: f64,
    #[serde(rename = "Weather", default)]
    pub weather: Option<String>,
    #[serde(rename = "SpecialEvent", default)]
    pub special_event: Option<String>,
    #[serde(rename = "IsHoliday", default)]
    pub is_holiday: Option<String>,
    #[serde(rename = "DayOfWeek", default)]
    pub day_of_week: Option<String>,
    #[serde(rename = "PublicTransportStatus", default)]
    pub public_transport_status: Option<String>,
    #[serde(rename = "OutbreakAlert", default)]
    pub outbreak_alert: Option<String>,
}

impl HistoryRow {
    /// `None` when the date cannot be read. Counts are exported as floats, negatives clamp to zero.
    pub fn into_entry(self, ward_id: &str) -> Option<CensusEntry> {
        let date = parse_date(&self.date)?;

        Some(CensusEntry {
            date,
            shift: self.shift,
            ward_id: (ward_id != ETU_WARD).then(|| ward_id.to_string()),
            ward_name: None,
            admissions: count(self.admissions),
            discharges: count(self.discharges),
            occupied_beds: count(self.occupied_beds),
            bed_capacity: count(self.bed_capacity),
            transfers_out: 0,
            deaths: 0,
            weather: non_empty(self.weather),
            special_event: non_empty(self.special_event),
            is_holiday: non_empty(self.is_holiday),
            day_of_week: non_empty(self.day_of_week),
            public_transport_status: non_empty(self.public_transport_status),
            outbreak_alert: non_empty(self.outbreak_alert),
        })
    }
}

fn count(value: f64) -> u32 {
    if value.is_finite() {
        value.round().max(0.0) as u32
    } else {
        0
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str) -> HistoryRow {
        HistoryRow {
            date: date.to_string(),
            shift: ShiftId::Night,
            admissions: 11.6,
            discharges: -1.0,
            occupied_beds: 22.0,
            bed_capacity: f64::NAN,
            weather: Some("Rainy".to_string()),
            special_event: Some(" ".to_string()),
            is_holiday: None,
            day_of_week: Some("Monday".to_string()),
            public_transport_status: None,
            outbreak_alert: None,
        }
    }

    #[test]
    fn test_row_to_etu_entry() {
        let entry = row("2024-01-15 00:00:00").into_entry(ETU_WARD).unwrap();

        assert_eq!(entry.date.to_string(), "2024-01-15");
        assert!(entry.ward_id.is_none());
        assert_eq!(entry.admissions, 12);
        assert_eq!(entry.discharges, 0);
        assert_eq!(entry.bed_capacity, 0);
        assert_eq!(entry.weather.as_deref(), Some("Rainy"));
        assert!(entry.special_event.is_none());
    }

    #[test]
    fn test_row_for_other_ward() {
        let entry = row("2024-01-15").into_entry("WARD-A").unwrap();

        assert_eq!(entry.ward_id(), "WARD-A");
    }

    #[test]
    fn test_bad_date_skipped() {
        assert!(row("not a date").into_entry(ETU_WARD).is_none());
    }
}
