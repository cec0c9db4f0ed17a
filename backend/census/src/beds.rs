use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BedStatus {
    Functional,
    Broken,
}

/// One physical bed. Ward capacity is the count of its functional beds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    pub bed_id: String,
    #[serde(default)]
    pub bed_type: String,
    pub ward_id: String,
    #[serde(default)]
    pub ward_name: String,
    pub status: BedStatus,
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bed {
    pub fn new(bed_id: &str, bed_type: &str, ward_id: &str, ward_name: &str) -> Self {
        Self {
            bed_id: bed_id.trim().to_string(),
            bed_type: bed_type.to_string(),
            ward_id: ward_id.trim().to_string(),
            ward_name: ward_name.to_string(),
            status: BedStatus::Functional,
            added_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn is_functional(&self) -> bool {
        self.status == BedStatus::Functional
    }
}

/// Functional beds registered for `ward_id`.
pub fn functional_count(beds: &[Bed], ward_id: &str) -> u32 {
    beds.iter()
        .filter(|bed| bed.ward_id == ward_id && bed.is_functional())
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bed_is_functional() {
        let bed = Bed::new(" ETU-01 ", "ICU", "ETU", "Emergency");

        assert_eq!(bed.bed_id, "ETU-01");
        assert!(bed.is_functional());
        assert!(bed.updated_at.is_none());
    }

    #[test]
    fn test_functional_count_per_ward() {
        let mut broken = Bed::new("A-2", "General", "WARD-A", "Ward A");
        broken.status = BedStatus::Broken;

        let beds = vec![
            Bed::new("A-1", "General", "WARD-A", "Ward A"),
            broken,
            Bed::new("A-3", "General", "WARD-A", "Ward A"),
            Bed::new("B-1", "General", "WARD-B", "Ward B"),
        ];

        assert_eq!(functional_count(&beds, "WARD-A"), 2);
        assert_eq!(functional_count(&beds, "WARD-B"), 1);
        assert_eq!(functional_count(&beds, "GEN"), 0);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&BedStatus::Broken).unwrap(),
            "\"Broken\""
        );
        assert!(serde_json::from_str::<BedStatus>("\"broken\"").is_err());
    }
}
