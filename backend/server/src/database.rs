//! # Store Selection
//!
//! The deployed server keeps its documents in Redis, see
//! [`census::store::redis_backend`] for the key layout.
//!
//! `STORE_BACKEND=memory` swaps in the in-memory store. Nothing survives a restart
//! there, it is meant for demos and the API tests.
use std::sync::Arc;

use census::{MemoryStore, RedisStore, Store, StoreError};
use tracing::{info, warn};

use crate::config::{Config, StoreBackend};

pub async fn init_store(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match config.store_backend {
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url, &config.store_prefix).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store, data is lost on shutdown");
            info!("Memory store ready");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
