//! Redis cache connection
//!
//! Each pool slot owns its own multiplexed connection. Keys carry no expiry
//! from this side; eviction is left to the Redis server's policy.

use super::{CacheConnection, CacheError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

pub struct RedisConnection {
    conn: MultiplexedConnection,
}

impl RedisConnection {
    /// Opens a new connection from `client`.
    pub async fn open(client: &Client) -> Result<Self, CacheError> {
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|err| CacheError::Connect(err.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheConnection for RedisConnection {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        // Cloning a multiplexed connection only clones the request channel
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|err| CacheError::Command(format!("GET {key}: {err}")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|err| CacheError::Command(format!("SET {key}: {err}")))
    }
}
