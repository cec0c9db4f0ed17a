//! # Document Store
//!
//! Every route maps onto one call here: find by field, insert, replace, delete,
//! append. Two backends implement it.
//!
//! - [`redis_backend::RedisStore`]: JSON documents in Redis hashes, the deployed backend.
//! - [`memory::MemoryStore`]: plain maps behind a lock, for tests and local runs.
//!
//! Uniqueness (usernames, emails, bed ids) is checked by the store, nothing else
//! is coordinated across calls.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    beds::{Bed, BedStatus},
    events::{EventFilter, EventKind, WardEvent},
    forecast::ForecastRecord,
    users::{OtpEntry, User},
};

pub mod memory;
pub mod redis_backend;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate {0}")]
    Duplicate(&'static str),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the username or email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Overwrites the document with the same id. Returns false when no such user exists.
    async fn replace_user(&self, user: &User) -> Result<bool, StoreError>;

    async fn delete_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn put_otp(&self, username: &str, otp: &OtpEntry) -> Result<(), StoreError>;

    async fn get_otp(&self, username: &str) -> Result<Option<OtpEntry>, StoreError>;

    async fn clear_otp(&self, username: &str) -> Result<(), StoreError>;

    async fn put_reset_session(
        &self,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn peek_reset_session(&self, username: &str)
    -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Returns and removes the session, a reset can only be used once.
    async fn take_reset_session(&self, username: &str)
    -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn append_event(&self, event: EventKind) -> Result<WardEvent, StoreError>;

    async fn append_events(&self, events: Vec<EventKind>) -> Result<usize, StoreError>;

    /// Matching events in chronological order, see [`WardEvent::sort_key`].
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<WardEvent>, StoreError>;

    async fn clear_events(&self, filter: &EventFilter) -> Result<usize, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the bed id is taken.
    async fn insert_bed(&self, bed: &Bed) -> Result<(), StoreError>;

    async fn list_beds(&self) -> Result<Vec<Bed>, StoreError>;

    async fn set_bed_status(
        &self,
        bed_id: &str,
        status: BedStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn upsert_forecast(&self, record: &ForecastRecord) -> Result<(), StoreError>;

    /// Oldest target first.
    async fn list_forecasts(&self) -> Result<Vec<ForecastRecord>, StoreError>;
}
