//! # History Import
//!
//! Loads the historical ETU census export into the store so the forecast has
//! enough shifts to work with.
//!
//! 1. Read every row of the CSV, skipping rows whose date cannot be parsed.
//! 2. Unless asked to keep them, clear the ward's existing census entries.
//! 3. Append the rows in chunks, oldest first.
//!
//! Surge updates, beds and users are never touched.
use std::path::Path;

use anyhow::{Context, Result};
use census::{CensusEntry, EventFilter, EventKind, Store};
use indicatif::{ProgressBar, ProgressStyle};

pub mod models;

use models::HistoryRow;

const CHUNK_SIZE: usize = 500;

#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub read: usize,
    pub skipped: usize,
    pub cleared: usize,
    pub imported: usize,
}

pub fn read_history(path: &Path, ward_id: &str) -> Result<(Vec<CensusEntry>, usize)> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut entries = Vec::new();
    let mut skipped = 0;

    for (line, row) in reader.deserialize::<HistoryRow>().enumerate() {
        let row = row.with_context(|| format!("Malformed row {}", line + 2))?;

        match row.into_entry(ward_id) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }

    entries.sort_by_key(|entry| (entry.date, entry.shift));

    Ok((entries, skipped))
}

pub async fn load_history(
    store: &dyn Store,
    path: &Path,
    ward_id: &str,
    keep_existing: bool,
) -> Result<Summary> {
    let (entries, skipped) = read_history(path, ward_id)?;

    println!("Loaded Rows: {}", entries.len() + skipped);
    println!("Skipped Rows: {}\n", skipped);

    let cleared = if keep_existing {
        0
    } else {
        store
            .clear_events(&EventFilter::census(ward_id))
            .await
            .context("Failed to clear existing census entries")?
    };

    let imported = append_chunks(store, entries).await?;

    Ok(Summary {
        read: imported + skipped,
        skipped,
        cleared,
        imported,
    })
}

async fn append_chunks(store: &dyn Store, entries: Vec<CensusEntry>) -> Result<usize> {
    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .context("Invalid progress template")?
        .progress_chars("=> "),
    );

    let mut imported = 0;

    for chunk in entries.chunks(CHUNK_SIZE) {
        pb.set_message(format!("Appending from {}", chunk[0].date));

        let events = chunk.iter().cloned().map(EventKind::Census).collect();
        imported += store
            .append_events(events)
            .await
            .context("Failed to append census entries")?;

        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message("Done");
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use census::{ETU_WARD, MemoryStore, ShiftId};

    use super::*;

    const CSV: &str = "\
Date,Shift_ID,ETU_Admissions,ETU_Discharges,ETU_OccupiedBeds,ETU_BedCapacity,Weather,SpecialEvent,IsHoliday,DayOfWeek,PublicTransportStatus,OutbreakAlert
2024-01-02,Day,10,8,20,25,Sunny,,No,Tuesday,Normal,No
2024-01-01,Night,14,9,22,25,Rainy,,No,Monday,Normal,No
garbage,Day,1,1,1,25,Sunny,,No,Monday,Normal,No
2024-01-01,Day,12.0,7,19,25,Sunny,Festival,Yes,Monday,Normal,No
";

    fn write_csv(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.csv", std::process::id()));
        fs::write(&path, CSV).unwrap();
        path
    }

    #[test]
    fn test_read_history_sorts_and_skips() {
        let path = write_csv("read-history");
        let (entries, skipped) = read_history(&path, ETU_WARD).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(skipped, 1);
        let order: Vec<(String, ShiftId)> = entries
            .iter()
            .map(|entry| (entry.date.to_string(), entry.shift))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2024-01-01".to_string(), ShiftId::Day),
                ("2024-01-01".to_string(), ShiftId::Night),
                ("2024-01-02".to_string(), ShiftId::Day),
            ]
        );
        assert_eq!(entries[0].special_event.as_deref(), Some("Festival"));
    }

    #[tokio::test]
    async fn test_load_replaces_existing_history() {
        let path = write_csv("load-history");
        let store = MemoryStore::new();

        let first = load_history(&store, &path, ETU_WARD, false).await.unwrap();
        let second = load_history(&store, &path, ETU_WARD, false).await.unwrap();
        let kept = load_history(&store, &path, ETU_WARD, true).await.unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(
            first,
            Summary {
                read: 4,
                skipped: 1,
                cleared: 0,
                imported: 3
            }
        );
        assert_eq!(second.cleared, 3);
        assert_eq!(kept.cleared, 0);

        let stored = store
            .list_events(&EventFilter::census(ETU_WARD))
            .await
            .unwrap();
        assert_eq!(stored.len(), 6);
    }

    #[test]
    fn test_missing_file() {
        let path = PathBuf::from("/definitely/not/here.csv");

        assert!(read_history(&path, ETU_WARD).is_err());
    }
}
