//! # Ward Events
//!
//! Append-only log of what nurses enter from the daily input screens.
//!
//! - Census entry: one ward, one date, one shift (`Day`/`Night`), admission and bed counts.
//! - Surge update: how many extra beds a ward can open from a given date.
//!
//! The ETU form predates multi-ward support, its rows carry no `Ward_ID` and use
//! `ETU_` prefixed count names. Both shapes land in [`CensusEntry`].
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::count_from_any;

pub const ETU_WARD: &str = "ETU";
pub const EVENT_TYPE: &str = "EventType";
pub const CENSUS_EVENT: &str = "Census";
pub const SURGE_EVENT: &str = "SurgeUpdate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShiftId {
    Day,
    Night,
}

impl ShiftId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftId::Day => "Day",
            ShiftId::Night => "Night",
        }
    }

    /// The shift whose closing census opens this one, with its date.
    pub fn previous(&self, date: NaiveDate) -> (NaiveDate, ShiftId) {
        match self {
            ShiftId::Day => (date.pred_opt().unwrap_or(date), ShiftId::Night),
            ShiftId::Night => (date, ShiftId::Day),
        }
    }
}

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusEntry {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Shift_ID")]
    pub shift: ShiftId,
    #[serde(rename = "Ward_ID", default, skip_serializing_if = "Option::is_none")]
    pub ward_id: Option<String>,
    #[serde(rename = "Ward_Name", default, skip_serializing_if = "Option::is_none")]
    pub ward_name: Option<String>,
    #[serde(
        rename = "Admissions",
        alias = "ETU_Admissions",
        default,
        deserialize_with = "count_from_any"
    )]
    pub admissions: u32,
    #[serde(
        rename = "Discharges",
        alias = "ETU_Discharges",
        default,
        deserialize_with = "count_from_any"
    )]
    pub discharges: u32,
    #[serde(
        rename = "OccupiedBeds",
        alias = "ETU_OccupiedBeds",
        default,
        deserialize_with = "count_from_any"
    )]
    pub occupied_beds: u32,
    #[serde(
        rename = "BedCapacity",
        alias = "ETU_BedCapacity",
        default,
        deserialize_with = "count_from_any"
    )]
    pub bed_capacity: u32,
    #[serde(rename = "transfersOut", default, deserialize_with = "count_from_any")]
    pub transfers_out: u32,
    #[serde(rename = "deaths", default, deserialize_with = "count_from_any")]
    pub deaths: u32,
    #[serde(rename = "Weather", default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(rename = "SpecialEvent", default, skip_serializing_if = "Option::is_none")]
    pub special_event: Option<String>,
    #[serde(rename = "IsHoliday", default, skip_serializing_if = "Option::is_none")]
    pub is_holiday: Option<String>,
    #[serde(rename = "DayOfWeek", default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    #[serde(
        rename = "PublicTransportStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_transport_status: Option<String>,
    #[serde(rename = "OutbreakAlert", default, skip_serializing_if = "Option::is_none")]
    pub outbreak_alert: Option<String>,
}

impl CensusEntry {
    /// Rows without a ward id are ETU rows.
    pub fn ward_id(&self) -> &str {
        self.ward_id.as_deref().unwrap_or(ETU_WARD)
    }

    pub fn is_etu(&self) -> bool {
        self.ward_id() == ETU_WARD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurgeUpdate {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Ward_ID")]
    pub ward_id: String,
    #[serde(rename = "Ward_Name", default, skip_serializing_if = "Option::is_none")]
    pub ward_name: Option<String>,
    #[serde(rename = "Surge_Capacity_Available", deserialize_with = "count_from_any")]
    pub surge_capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "EventType")]
pub enum EventKind {
    Census(CensusEntry),
    SurgeUpdate(SurgeUpdate),
}

impl EventKind {
    /// Reads a form payload. Census forms send no `EventType`, so a missing tag means census.
    pub fn from_payload(mut payload: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(map) = &mut payload {
            map.entry(EVENT_TYPE)
                .or_insert_with(|| Value::String(CENSUS_EVENT.to_string()));
        }

        serde_json::from_value(payload)
    }

    pub fn ward_id(&self) -> &str {
        match self {
            EventKind::Census(entry) => entry.ward_id(),
            EventKind::SurgeUpdate(update) => &update.ward_id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            EventKind::Census(entry) => entry.date,
            EventKind::SurgeUpdate(update) => update.date,
        }
    }

    pub fn tag(&self) -> KindFilter {
        match self {
            EventKind::Census(_) => KindFilter::Census,
            EventKind::SurgeUpdate(_) => KindFilter::Surge,
        }
    }
}

/// A stored event with its store-assigned sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardEvent {
    pub seq: u64,
    #[serde(rename = "recordedAt")]
    pub recorded_at: DateTime<Utc>,
    pub event: EventKind,
}

impl WardEvent {
    pub fn new(seq: u64, event: EventKind) -> Self {
        Self {
            seq,
            recorded_at: Utc::now(),
            event,
        }
    }

    /// Chronological order: date, then shift (surge updates sort before the day shift), then arrival.
    pub fn sort_key(&self) -> (NaiveDate, u8, u64) {
        let shift_rank = match &self.event {
            EventKind::Census(entry) => match entry.shift {
                ShiftId::Day => 1,
                ShiftId::Night => 2,
            },
            EventKind::SurgeUpdate(_) => 0,
        };

        (self.event.date(), shift_rank, self.seq)
    }

    pub fn census(&self) -> Option<&CensusEntry> {
        match &self.event {
            EventKind::Census(entry) => Some(entry),
            EventKind::SurgeUpdate(_) => None,
        }
    }

    pub fn surge(&self) -> Option<&SurgeUpdate> {
        match &self.event {
            EventKind::SurgeUpdate(update) => Some(update),
            EventKind::Census(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Census,
    Surge,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub ward: Option<String>,
    pub kind: Option<KindFilter>,
}

impl EventFilter {
    pub fn census(ward: &str) -> Self {
        Self {
            ward: Some(ward.to_string()),
            kind: Some(KindFilter::Census),
        }
    }

    pub fn surge(ward: &str) -> Self {
        Self {
            ward: Some(ward.to_string()),
            kind: Some(KindFilter::Surge),
        }
    }

    pub fn matches(&self, event: &WardEvent) -> bool {
        let ward_ok = self
            .ward
            .as_deref()
            .is_none_or(|ward| event.event.ward_id() == ward);
        let kind_ok = self.kind.is_none_or(|kind| event.event.tag() == kind);

        ward_ok && kind_ok
    }
}

/// Sorts in place and keeps the filter's matches.
pub fn select_events(mut events: Vec<WardEvent>, filter: &EventFilter) -> Vec<WardEvent> {
    events.retain(|event| filter.matches(event));
    events.sort_by_key(WardEvent::sort_key);
    events
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_etu_payload_without_ward() {
        let payload = json!({
            "Date": "2025-02-13",
            "Shift_ID": "Day",
            "ETU_Admissions": 12,
            "ETU_Discharges": 4,
            "ETU_OccupiedBeds": 20,
            "ETU_BedCapacity": 25,
            "transfersOut": 1,
            "deaths": 0,
            "Weather": "Sunny",
            "IsHoliday": "No"
        });

        let EventKind::Census(entry) = EventKind::from_payload(payload).unwrap() else {
            panic!("expected census entry");
        };

        assert!(entry.is_etu());
        assert_eq!(entry.date, date(2025, 2, 13));
        assert_eq!(entry.admissions, 12);
        assert_eq!(entry.occupied_beds, 20);
        assert_eq!(entry.bed_capacity, 25);
        assert_eq!(entry.weather.as_deref(), Some("Sunny"));
    }

    #[test]
    fn test_ward_payload() {
        let payload = json!({
            "Date": "2025-02-13",
            "Shift_ID": "Night",
            "Ward_ID": "WARD-B",
            "Ward_Name": "Ward B (Surgical)",
            "Admissions": 3,
            "Discharges": 2,
            "OccupiedBeds": 14,
            "BedCapacity": 18
        });

        let event = EventKind::from_payload(payload).unwrap();
        assert_eq!(event.ward_id(), "WARD-B");
        assert_eq!(event.tag(), KindFilter::Census);
    }

    #[test]
    fn test_surge_payload_with_text_count() {
        let payload = json!({
            "Date": "2025-02-13",
            "Ward_ID": "WARD-A",
            "Ward_Name": "Ward A",
            "Surge_Capacity_Available": "6",
            "EventType": "SurgeUpdate"
        });

        let EventKind::SurgeUpdate(update) = EventKind::from_payload(payload).unwrap() else {
            panic!("expected surge update");
        };

        assert_eq!(update.ward_id, "WARD-A");
        assert_eq!(update.surge_capacity, 6);
    }

    #[test]
    fn test_census_counts_as_text() {
        let payload = json!({
            "Date": "2025-02-13",
            "Shift_ID": "Day",
            "Ward_ID": "WARD-A",
            "Admissions": "5",
            "OccupiedBeds": " 12 ",
            "Discharges": "",
            "deaths": 1
        });

        let EventKind::Census(entry) = EventKind::from_payload(payload).unwrap() else {
            panic!("expected census entry");
        };

        assert_eq!(entry.admissions, 5);
        assert_eq!(entry.occupied_beds, 12);
        assert_eq!(entry.discharges, 0);
        assert_eq!(entry.deaths, 1);
        assert_eq!(entry.bed_capacity, 0);

        let legacy = json!({"Date": "2025-02-13", "Shift_ID": "Night", "ETU_Admissions": "7"});
        let EventKind::Census(entry) = EventKind::from_payload(legacy).unwrap() else {
            panic!("expected census entry");
        };
        assert_eq!(entry.admissions, 7);

        let garbage = json!({"Date": "2025-02-13", "Shift_ID": "Day", "Admissions": "many"});
        assert!(EventKind::from_payload(garbage).is_err());
    }

    #[test]
    fn test_rejects_bad_payloads() {
        let negative = json!({"Date": "2025-02-13", "Shift_ID": "Day", "Admissions": -2});
        let bad_shift = json!({"Date": "2025-02-13", "Shift_ID": "Evening"});
        let bad_date = json!({"Date": "yesterday", "Shift_ID": "Day"});
        let unknown_type = json!({"Date": "2025-02-13", "EventType": "Nope"});

        assert!(EventKind::from_payload(negative).is_err());
        assert!(EventKind::from_payload(bad_shift).is_err());
        assert!(EventKind::from_payload(bad_date).is_err());
        assert!(EventKind::from_payload(unknown_type).is_err());
        assert!(EventKind::from_payload(json!([1, 2])).is_err());
    }

    #[test]
    fn test_previous_shift() {
        assert_eq!(
            ShiftId::Day.previous(date(2025, 3, 1)),
            (date(2025, 2, 28), ShiftId::Night)
        );
        assert_eq!(
            ShiftId::Night.previous(date(2025, 3, 1)),
            (date(2025, 3, 1), ShiftId::Day)
        );
    }

    fn census(seq: u64, ward: Option<&str>, day: u32, shift: ShiftId) -> WardEvent {
        WardEvent::new(
            seq,
            EventKind::Census(CensusEntry {
                date: date(2025, 1, day),
                shift,
                ward_id: ward.map(str::to_string),
                ward_name: None,
                admissions: seq as u32,
                discharges: 0,
                occupied_beds: 0,
                bed_capacity: 0,
                transfers_out: 0,
                deaths: 0,
                weather: None,
                special_event: None,
                is_holiday: None,
                day_of_week: None,
                public_transport_status: None,
                outbreak_alert: None,
            }),
        )
    }

    #[test]
    fn test_select_orders_and_filters() {
        let events = vec![
            census(1, None, 2, ShiftId::Night),
            census(2, Some("WARD-A"), 1, ShiftId::Day),
            census(3, Some("ETU"), 2, ShiftId::Day),
            census(4, None, 1, ShiftId::Night),
        ];

        let etu = select_events(events, &EventFilter::census(ETU_WARD));
        let seqs: Vec<u64> = etu.iter().map(|event| event.seq).collect();

        assert_eq!(seqs, vec![4, 3, 1]);
    }
}
