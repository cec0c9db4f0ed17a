//! # Redis
//!
//! Document store on top of Redis hashes.
//!
//! ## Layout
//!
//! - `{prefix}:users` hash: user id to user JSON
//! - `{prefix}:users:username`, `{prefix}:users:email` hashes: unique key to user id
//! - `{prefix}:otp:{username}` string: pending OTP JSON, expires with the code
//! - `{prefix}:reset:{username}` string: reset session expiry, expires with the session
//! - `{prefix}:events` hash: sequence number to ward event JSON
//! - `{prefix}:events:seq` counter: last assigned sequence number
//! - `{prefix}:beds` hash: bed id to bed JSON
//! - `{prefix}:forecasts` hash: `{date}_{shift}` to forecast JSON
//!
//! ## Notes
//!
//! - Unique indexes are claimed with `HSETNX` before the document is written. A failed
//!   write only releases the entries it created, never ones the user already owned.
//! - Events are filtered and sorted client side, the log is small (a few rows per ward per day).
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use super::{Store, StoreError};
use crate::{
    beds::{Bed, BedStatus},
    events::{EventFilter, EventKind, WardEvent, select_events},
    forecast::ForecastRecord,
    users::{OtpEntry, User},
};

const USERNAME_INDEX: &str = "users:username";
const EMAIL_INDEX: &str = "users:email";

/// Outcome of an `HSETNX` on a unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    /// Created by this call, undo it if the write fails.
    New,
    /// Already pointed at the same document.
    Owned,
    Taken,
}

impl Claim {
    fn from_reply(inserted: bool, owner: Option<&str>, id: &str) -> Self {
        if inserted {
            Claim::New
        } else if owner == Some(id) {
            Claim::Owned
        } else {
            Claim::Taken
        }
    }
}

/// Index entry, duplicate field name, value.
fn user_keys(user: &User) -> [(&'static str, &'static str, &str); 2] {
    [
        (USERNAME_INDEX, "username", &user.username),
        (EMAIL_INDEX, "email", &user.email),
    ]
}

/// Entries still pointing at `current` after it was replaced by `next`.
fn stale_keys(current: &User, next: &User) -> Vec<(&'static str, String)> {
    user_keys(current)
        .into_iter()
        .zip(user_keys(next))
        .filter(|((_, _, old), (_, _, new))| old != new)
        .map(|((index, _, old), _)| (index, old.to_string()))
        .collect()
}

/// Sequence numbers handed out by an `INCRBY count` that returned `last`.
fn seq_range(last: u64, count: usize) -> std::ops::RangeInclusive<u64> {
    (last + 1 - count as u64)..=last
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        info!("Connected to Redis at {redis_url}");

        Ok(Self {
            connection,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{name}", self.prefix)
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }

    async fn get_doc<T: DeserializeOwned>(
        &self,
        hash: &str,
        field: &str,
    ) -> Result<Option<T>, StoreError> {
        let raw: Option<String> = self.conn().hget(self.key(hash), field).await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn all_docs<T: DeserializeOwned>(&self, hash: &str) -> Result<Vec<T>, StoreError> {
        let raw: Vec<String> = self.conn().hvals(self.key(hash)).await?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    async fn put_doc<T: Serialize>(
        &self,
        hash: &str,
        field: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(doc)?;
        let _: () = self.conn().hset(self.key(hash), field, json).await?;

        Ok(())
    }

    async fn claim(&self, index: &str, value: &str, id: &str) -> Result<Claim, StoreError> {
        let mut conn = self.conn();
        let index_key = self.key(index);

        let inserted: bool = conn.hset_nx(&index_key, value, id).await?;
        if inserted {
            return Ok(Claim::New);
        }

        let owner: Option<String> = conn.hget(&index_key, value).await?;
        Ok(Claim::from_reply(false, owner.as_deref(), id))
    }

    async fn release(&self, index: &str, value: &str) -> Result<(), StoreError> {
        let _: () = self.conn().hdel(self.key(index), value).await?;

        Ok(())
    }

    async fn release_all(&self, keys: &[(&'static str, String)]) -> Result<(), StoreError> {
        for (index, value) in keys {
            self.release(index, value).await?;
        }

        Ok(())
    }

    /// Undoes fresh claims after a failed write. The write's own error wins.
    async fn roll_back(
        &self,
        created: &[(&'static str, String)],
        error: StoreError,
    ) -> StoreError {
        if let Err(undo) = self.release_all(created).await {
            warn!("Failed to release user index entries: {undo}");
        }

        error
    }

    /// Returns the index entries this call created.
    async fn claim_user_keys(
        &self,
        user: &User,
    ) -> Result<Vec<(&'static str, String)>, StoreError> {
        let mut created = Vec::new();

        for (index, field, value) in user_keys(user) {
            let claim = match self.claim(index, value, &user.id).await {
                Ok(claim) => claim,
                Err(e) => return Err(self.roll_back(&created, e).await),
            };

            match claim {
                Claim::New => created.push((index, value.to_string())),
                Claim::Owned => {}
                Claim::Taken => {
                    return Err(self
                        .roll_back(&created, StoreError::Duplicate(field))
                        .await);
                }
            }
        }

        Ok(created)
    }

    async fn find_indexed(&self, index: &str, value: &str) -> Result<Option<User>, StoreError> {
        let id: Option<String> = self.conn().hget(self.key(index), value).await?;

        match id {
            Some(id) => self.get_doc("users", &id).await,
            None => Ok(None),
        }
    }

    fn ttl_secs(expires_at: DateTime<Utc>) -> u64 {
        (expires_at - Utc::now()).num_seconds().max(1) as u64
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let created = self.claim_user_keys(user).await?;

        if let Err(e) = self.put_doc("users", &user.id, user).await {
            return Err(self.roll_back(&created, e).await);
        }

        Ok(())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.get_doc("users", id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_indexed(USERNAME_INDEX, username).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_indexed(EMAIL_INDEX, email).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.all_docs("users").await?;
        users.sort_by_key(|user| user.created_at);

        Ok(users)
    }

    async fn replace_user(&self, user: &User) -> Result<bool, StoreError> {
        let Some(current) = self.find_user_by_id(&user.id).await? else {
            return Ok(false);
        };

        let created = self.claim_user_keys(user).await?;
        if let Err(e) = self.put_doc("users", &user.id, user).await {
            return Err(self.roll_back(&created, e).await);
        }

        self.release_all(&stale_keys(&current, user)).await?;

        Ok(true)
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let Some(user) = self.find_user_by_id(id).await? else {
            return Ok(None);
        };

        let _: () = self.conn().hdel(self.key("users"), id).await?;
        for (index, _, value) in user_keys(&user) {
            self.release(index, value).await?;
        }

        Ok(Some(user))
    }

    async fn put_otp(&self, username: &str, otp: &OtpEntry) -> Result<(), StoreError> {
        let json = serde_json::to_string(otp)?;
        let ttl = Self::ttl_secs(otp.expires_at);
        let _: () = self
            .conn()
            .set_ex(self.key(&format!("otp:{username}")), json, ttl)
            .await?;

        Ok(())
    }

    async fn get_otp(&self, username: &str) -> Result<Option<OtpEntry>, StoreError> {
        let raw: Option<String> = self.conn().get(self.key(&format!("otp:{username}"))).await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn clear_otp(&self, username: &str) -> Result<(), StoreError> {
        let _: () = self.conn().del(self.key(&format!("otp:{username}"))).await?;

        Ok(())
    }

    async fn put_reset_session(
        &self,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let ttl = Self::ttl_secs(expires_at);
        let _: () = self
            .conn()
            .set_ex(
                self.key(&format!("reset:{username}")),
                expires_at.to_rfc3339(),
                ttl,
            )
            .await?;

        Ok(())
    }

    async fn peek_reset_session(
        &self,
        username: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let raw: Option<String> = self
            .conn()
            .get(self.key(&format!("reset:{username}")))
            .await?;

        Ok(raw.and_then(|value| parse_expiry(&value)))
    }

    async fn take_reset_session(
        &self,
        username: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let raw: Option<String> = self
            .conn()
            .get_del(self.key(&format!("reset:{username}")))
            .await?;

        Ok(raw.and_then(|value| parse_expiry(&value)))
    }

    async fn append_event(&self, event: EventKind) -> Result<WardEvent, StoreError> {
        let seq: u64 = self.conn().incr(self.key("events:seq"), 1_u64).await?;
        let stored = WardEvent::new(seq, event);

        self.put_doc("events", &seq.to_string(), &stored).await?;
        debug!("Appended event {seq} for {}", stored.event.ward_id());

        Ok(stored)
    }

    async fn append_events(&self, events: Vec<EventKind>) -> Result<usize, StoreError> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let count = events.len();
        let last: u64 = conn.incr(self.key("events:seq"), count as u64).await?;

        let mut pipe = redis::pipe();
        for (seq, event) in seq_range(last, count).zip(events) {
            let json = serde_json::to_string(&WardEvent::new(seq, event))?;
            pipe.hset(self.key("events"), seq, json).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;

        Ok(count)
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<WardEvent>, StoreError> {
        let events: Vec<WardEvent> = self.all_docs("events").await?;

        Ok(select_events(events, filter))
    }

    async fn clear_events(&self, filter: &EventFilter) -> Result<usize, StoreError> {
        let doomed: Vec<u64> = self
            .list_events(filter)
            .await?
            .iter()
            .map(|event| event.seq)
            .collect();

        if doomed.is_empty() {
            return Ok(0);
        }

        let _: () = self.conn().hdel(self.key("events"), &doomed).await?;

        Ok(doomed.len())
    }

    async fn insert_bed(&self, bed: &Bed) -> Result<(), StoreError> {
        let json = serde_json::to_string(bed)?;
        let inserted: bool = self
            .conn()
            .hset_nx(self.key("beds"), &bed.bed_id, json)
            .await?;

        if !inserted {
            return Err(StoreError::Duplicate("bed_id"));
        }

        Ok(())
    }

    async fn list_beds(&self) -> Result<Vec<Bed>, StoreError> {
        let mut beds: Vec<Bed> = self.all_docs("beds").await?;
        beds.sort_by(|a, b| a.bed_id.cmp(&b.bed_id));

        Ok(beds)
    }

    async fn set_bed_status(
        &self,
        bed_id: &str,
        status: BedStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(mut bed) = self.get_doc::<Bed>("beds", bed_id).await? else {
            return Ok(false);
        };

        bed.status = status;
        bed.updated_at = Some(at);
        self.put_doc("beds", bed_id, &bed).await?;

        Ok(true)
    }

    async fn upsert_forecast(&self, record: &ForecastRecord) -> Result<(), StoreError> {
        self.put_doc("forecasts", &record.key(), record).await
    }

    async fn list_forecasts(&self) -> Result<Vec<ForecastRecord>, StoreError> {
        let mut forecasts: Vec<ForecastRecord> = self.all_docs("forecasts").await?;
        forecasts.sort_by_key(|record| (record.target_date, record.target_shift));

        Ok(forecasts)
    }
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as Span, NaiveDate};

    use super::*;
    use crate::{
        events::{CensusEntry, ETU_WARD, ShiftId},
        users::{Profile, Role},
    };

    fn user(username: &str, email: &str) -> User {
        User::new(
            username,
            email,
            "hash".to_string(),
            Role::Patient,
            Profile::default(),
        )
    }

    #[test]
    fn test_claim_from_reply() {
        assert_eq!(Claim::from_reply(true, None, "a"), Claim::New);
        assert_eq!(Claim::from_reply(false, Some("a"), "a"), Claim::Owned);
        assert_eq!(Claim::from_reply(false, Some("b"), "a"), Claim::Taken);
        // entry vanished between HSETNX and HGET
        assert_eq!(Claim::from_reply(false, None, "a"), Claim::Taken);
    }

    #[test]
    fn test_stale_keys_only_changed_fields() {
        let current = user("pharma", "pharma@hospital.lk");

        let mut renamed = current.clone();
        renamed.username = "pharmacy".to_string();
        assert_eq!(
            stale_keys(&current, &renamed),
            vec![(USERNAME_INDEX, "pharma".to_string())]
        );

        let mut moved = current.clone();
        moved.email = "new@hospital.lk".to_string();
        assert_eq!(
            stale_keys(&current, &moved),
            vec![(EMAIL_INDEX, "pharma@hospital.lk".to_string())]
        );

        assert!(stale_keys(&current, &current).is_empty());
    }

    #[test]
    fn test_seq_range() {
        assert_eq!(seq_range(3, 3).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(seq_range(10, 2).collect::<Vec<_>>(), vec![9, 10]);
        assert_eq!(seq_range(7, 1).collect::<Vec<_>>(), vec![7]);
    }

    // The tests below need a live Redis: `cargo test -p census -- --ignored`.

    async fn live_store() -> RedisStore {
        let url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let prefix = format!("census-test-{}", uuid::Uuid::new_v4());

        RedisStore::connect(&url, &prefix).await.expect("connect to redis")
    }

    async fn wipe(store: &RedisStore) {
        let mut conn = store.conn();
        let keys: Vec<String> = conn.keys(format!("{}:*", store.prefix)).await.unwrap();

        if !keys.is_empty() {
            let _: () = conn.del(keys).await.unwrap();
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_failed_email_change_keeps_username_index() {
        let store = live_store().await;
        let pharma = user("pharma", "pharma@hospital.lk");
        let nurse = user("nurse", "nurse@hospital.lk");
        store.insert_user(&pharma).await.unwrap();
        store.insert_user(&nurse).await.unwrap();

        let mut clash = pharma.clone();
        clash.email = nurse.email.clone();
        let result = store.replace_user(&clash).await;

        let found = store.find_user_by_username("pharma").await.unwrap();
        let by_email = store.find_user_by_email("pharma@hospital.lk").await.unwrap();
        let nurse_email = store.find_user_by_email("nurse@hospital.lk").await.unwrap();
        wipe(&store).await;

        assert!(matches!(result, Err(StoreError::Duplicate("email"))));
        assert_eq!(found.map(|user| user.id), Some(pharma.id.clone()));
        assert_eq!(by_email.map(|user| user.id), Some(pharma.id));
        assert_eq!(nurse_email.map(|user| user.id), Some(nurse.id));
    }

    #[tokio::test]
    #[ignore]
    async fn test_duplicate_insert_releases_fresh_claims() {
        let store = live_store().await;
        store
            .insert_user(&user("nurse", "nurse@hospital.lk"))
            .await
            .unwrap();

        // username is new, email is taken: the username claim must not linger
        let result = store
            .insert_user(&user("newcomer", "nurse@hospital.lk"))
            .await;
        let lingering: Option<String> = store
            .conn()
            .hget(store.key(USERNAME_INDEX), "newcomer")
            .await
            .unwrap();
        wipe(&store).await;

        assert!(matches!(result, Err(StoreError::Duplicate("email"))));
        assert_eq!(lingering, None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_rename_moves_index_entry() {
        let store = live_store().await;
        let pharma = user("pharma", "pharma@hospital.lk");
        store.insert_user(&pharma).await.unwrap();

        let mut renamed = pharma.clone();
        renamed.username = "pharmacy".to_string();
        assert!(store.replace_user(&renamed).await.unwrap());

        let old = store.find_user_by_username("pharma").await.unwrap();
        let new = store.find_user_by_username("pharmacy").await.unwrap();
        let deleted = store.delete_user(&pharma.id).await.unwrap();
        let after_delete = store.find_user_by_email("pharma@hospital.lk").await.unwrap();
        wipe(&store).await;

        assert!(old.is_none());
        assert_eq!(new.map(|user| user.id), Some(pharma.id));
        assert!(deleted.is_some());
        assert!(after_delete.is_none());
    }

    fn census(day: u32, shift: ShiftId) -> EventKind {
        EventKind::Census(CensusEntry {
            date: NaiveDate::from_ymd_opt(2025, 2, day).unwrap(),
            shift,
            ward_id: None,
            ward_name: None,
            admissions: day,
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
        })
    }

    #[tokio::test]
    #[ignore]
    async fn test_event_sequences_and_clear() {
        let store = live_store().await;

        let single = store.append_event(census(1, ShiftId::Day)).await.unwrap();
        let bulk = store
            .append_events(vec![census(2, ShiftId::Night), census(2, ShiftId::Day)])
            .await
            .unwrap();
        let events = store
            .list_events(&EventFilter::census(ETU_WARD))
            .await
            .unwrap();
        let cleared = store
            .clear_events(&EventFilter::census(ETU_WARD))
            .await
            .unwrap();
        let remaining = store.list_events(&EventFilter::default()).await.unwrap();
        wipe(&store).await;

        assert_eq!(single.seq, 1);
        assert_eq!(bulk, 2);
        let seqs: Vec<u64> = events.iter().map(|event| event.seq).collect();
        assert_eq!(seqs, vec![1, 3, 2]);
        assert_eq!(cleared, 3);
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn test_reset_session_is_single_use() {
        let store = live_store().await;
        let expires_at = Utc::now() + Span::minutes(10);
        store.put_reset_session("nurse", expires_at).await.unwrap();

        let peeked = store.peek_reset_session("nurse").await.unwrap();
        let taken = store.take_reset_session("nurse").await.unwrap();
        let again = store.take_reset_session("nurse").await.unwrap();
        wipe(&store).await;

        assert_eq!(peeked.map(|at| at.timestamp()), Some(expires_at.timestamp()));
        assert_eq!(taken.map(|at| at.timestamp()), Some(expires_at.timestamp()));
        assert_eq!(again, None);
    }
}
