use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{Store, StoreError};
use crate::{
    beds::{Bed, BedStatus},
    events::{EventFilter, EventKind, WardEvent, select_events},
    forecast::ForecastRecord,
    users::{OtpEntry, User},
};

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    otps: HashMap<String, OtpEntry>,
    reset_sessions: HashMap<String, DateTime<Utc>>,
    events: Vec<WardEvent>,
    next_seq: u64,
    beds: BTreeMap<String, Bed>,
    forecasts: BTreeMap<String, ForecastRecord>,
}

impl Collections {
    fn taken(&self, user: &User) -> Option<&'static str> {
        self.users
            .values()
            .filter(|other| other.id != user.id)
            .find_map(|other| {
                if other.username == user.username {
                    Some("username")
                } else if other.email == user.email {
                    Some("email")
                } else {
                    None
                }
            })
    }

    fn push_event(&mut self, event: EventKind) -> WardEvent {
        self.next_seq += 1;
        let stored = WardEvent::new(self.next_seq, event);
        self.events.push(stored.clone());

        stored
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        if let Some(field) = inner.taken(user) {
            return Err(StoreError::Duplicate(field));
        }
        inner.users.insert(user.id.clone(), user.clone());

        Ok(())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().users.get(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.inner.read().users.values().cloned().collect();
        users.sort_by_key(|user| user.created_at);

        Ok(users)
    }

    async fn replace_user(&self, user: &User) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();

        if !inner.users.contains_key(&user.id) {
            return Ok(false);
        }
        if let Some(field) = inner.taken(user) {
            return Err(StoreError::Duplicate(field));
        }
        inner.users.insert(user.id.clone(), user.clone());

        Ok(true)
    }

    async fn delete_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.write().users.remove(id))
    }

    async fn put_otp(&self, username: &str, otp: &OtpEntry) -> Result<(), StoreError> {
        self.inner
            .write()
            .otps
            .insert(username.to_string(), otp.clone());

        Ok(())
    }

    async fn get_otp(&self, username: &str) -> Result<Option<OtpEntry>, StoreError> {
        Ok(self.inner.read().otps.get(username).cloned())
    }

    async fn clear_otp(&self, username: &str) -> Result<(), StoreError> {
        self.inner.write().otps.remove(username);

        Ok(())
    }

    async fn put_reset_session(
        &self,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner
            .write()
            .reset_sessions
            .insert(username.to_string(), expires_at);

        Ok(())
    }

    async fn peek_reset_session(
        &self,
        username: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.inner.read().reset_sessions.get(username).copied())
    }

    async fn take_reset_session(
        &self,
        username: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.inner.write().reset_sessions.remove(username))
    }

    async fn append_event(&self, event: EventKind) -> Result<WardEvent, StoreError> {
        Ok(self.inner.write().push_event(event))
    }

    async fn append_events(&self, events: Vec<EventKind>) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        let count = events.len();

        for event in events {
            inner.push_event(event);
        }

        Ok(count)
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<WardEvent>, StoreError> {
        let events = self.inner.read().events.clone();

        Ok(select_events(events, filter))
    }

    async fn clear_events(&self, filter: &EventFilter) -> Result<usize, StoreError> {
        let mut inner = self.inner.write();
        let before = inner.events.len();
        inner.events.retain(|event| !filter.matches(event));

        Ok(before - inner.events.len())
    }

    async fn insert_bed(&self, bed: &Bed) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        if inner.beds.contains_key(&bed.bed_id) {
            return Err(StoreError::Duplicate("bed_id"));
        }
        inner.beds.insert(bed.bed_id.clone(), bed.clone());

        Ok(())
    }

    async fn list_beds(&self) -> Result<Vec<Bed>, StoreError> {
        Ok(self.inner.read().beds.values().cloned().collect())
    }

    async fn set_bed_status(
        &self,
        bed_id: &str,
        status: BedStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();

        let Some(bed) = inner.beds.get_mut(bed_id) else {
            return Ok(false);
        };
        bed.status = status;
        bed.updated_at = Some(at);

        Ok(true)
    }

    async fn upsert_forecast(&self, record: &ForecastRecord) -> Result<(), StoreError> {
        self.inner
            .write()
            .forecasts
            .insert(record.key(), record.clone());

        Ok(())
    }

    async fn list_forecasts(&self) -> Result<Vec<ForecastRecord>, StoreError> {
        let mut forecasts: Vec<ForecastRecord> =
            self.inner.read().forecasts.values().cloned().collect();
        forecasts.sort_by_key(|record| (record.target_date, record.target_shift));

        Ok(forecasts)
    }
}
