//! In-process cache store
//!
//! Selected with `url = "memory://"`. All slots of a pool share one map, so
//! the pool behaves like a pool of connections to a single server. Nothing
//! is evicted; this is meant for local runs and tests.

use super::{CacheConnection, CacheError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone, Default)]
pub struct MemoryConnection {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheConnection for MemoryConnection {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let map = self
            .entries
            .read()
            .map_err(|_| CacheError::Command("memory store poisoned".to_string()))?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| CacheError::Command("memory store poisoned".to_string()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryConnection::new();
        assert!(store.is_empty());

        store.set("alice@example.com", "200 a\n").await.unwrap();
        assert_eq!(
            store.get("alice@example.com").await.unwrap().as_deref(),
            Some("200 a\n")
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = MemoryConnection::new();
        assert_eq!(tokio_test::block_on(store.get("nobody")).unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = MemoryConnection::new();
        store.set("k", "old").await.unwrap();
        store.set("k", "new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let a = MemoryConnection::new();
        let b = a.clone();
        a.set("k", "v").await.unwrap();
        assert_eq!(b.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
