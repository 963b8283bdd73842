//! Cache Client Pool
//!
//! A fixed set of independent connections to the cache store, opened
//! eagerly at startup and handed out round-robin, one per operation.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 CachePool                    │
//! │   next ──┐                                   │
//! │          ▼                                   │
//! │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │
//! │  │ slot 0 │ │ slot 1 │ │ slot 2 │ │ ...N   │ │
//! │  └────────┘ └────────┘ └────────┘ └────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A failed connection stays in the pool. Its errors surface to the caller,
//! which treats a failed `get` as a miss and a failed `set` as a warning, so
//! the cache can never fail a request on its own.

pub mod memory;
pub mod redis;

use crate::config::CacheConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::info;

pub use self::memory::MemoryConnection;
pub use self::redis::RedisConnection;

/// URL scheme selecting the in-process store
pub const MEMORY_SCHEME: &str = "memory://";

/// Errors reported by the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Could not open a connection
    #[error("cache connection failed: {0}")]
    Connect(String),

    /// A GET or SET failed
    #[error("cache command failed: {0}")]
    Command(String),

    /// The pool was configured with no connections
    #[error("cache pool needs at least one connection")]
    EmptyPool,
}

/// One connection to the cache store.
#[async_trait]
pub trait CacheConnection: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// A fixed-size, round-robin pool of cache connections.
pub struct CachePool {
    slots: Vec<Box<dyn CacheConnection>>,
    next: AtomicUsize,
}

impl CachePool {
    /// Builds a pool from already opened connections.
    pub fn new(slots: Vec<Box<dyn CacheConnection>>) -> Result<Self, CacheError> {
        if slots.is_empty() {
            return Err(CacheError::EmptyPool);
        }
        Ok(Self {
            slots,
            next: AtomicUsize::new(0),
        })
    }

    /// Opens `pool_size` connections to the configured store.
    ///
    /// Every connection is established before this returns; any failure is
    /// a startup error.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let mut slots: Vec<Box<dyn CacheConnection>> = Vec::with_capacity(config.pool_size);

        if config.url.starts_with(MEMORY_SCHEME) {
            let store = MemoryConnection::new();
            for _ in 0..config.pool_size {
                slots.push(Box::new(store.clone()));
            }
        } else {
            let client = ::redis::Client::open(config.url.as_str())
                .map_err(|err| CacheError::Connect(err.to_string()))?;
            for _ in 0..config.pool_size {
                slots.push(Box::new(RedisConnection::open(&client).await?));
            }
        }

        info!(url = %config.url, size = slots.len(), "Cache pool ready");
        Self::new(slots)
    }

    /// Number of connections in the pool.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Leases the next connection for a single operation.
    fn lease(&self) -> &dyn CacheConnection {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        self.slots[index].as_ref()
    }

    /// Looks a key up. `Ok(None)` is a miss.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.lease().get(key).await
    }

    /// Stores a value under a key.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.lease().set(key, value).await
    }
}
