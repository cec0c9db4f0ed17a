//! # Census
//!
//! Records shared between the API server and the import tool.
//!
//! ## Collections
//!
//! - Users (**document**): one per account, unique by lowercased username and email.
//! - Ward events (**append only**): daily census entries per ward and shift, plus
//!   surge capacity updates. Entries without a ward id are legacy ETU rows.
//! - Beds (**document**): physical bed inventory, unique by bed id.
//! - Forecasts (**upsert**): one per target date and shift.
//!
//! ## Notes
//!
//! - Every write is a single store call, there is no cross-collection transaction.
//! - Field names on the wire follow what the frontend forms already send
//!   (`Shift_ID`, `ETU_Admissions`, `transfersOut`...), so the structs rename heavily.
pub mod beds;
pub mod events;
pub mod forecast;
pub mod store;
pub mod users;
pub mod utils;

pub use beds::{Bed, BedStatus};
pub use events::{
    CensusEntry, ETU_WARD, EventFilter, EventKind, KindFilter, ShiftId, SurgeUpdate, WardEvent,
};
pub use forecast::{AllocationPlan, ForecastRecord};
pub use store::{Store, StoreError, memory::MemoryStore, redis_backend::RedisStore};
pub use users::{OtpEntry, Profile, PublicUser, Role, UnknownRole, User};
