//! Shared in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::Value;
use tokio::sync::RwLock;

use super::Store;
use crate::{Error, Result};

/// In-memory [`Store`], shared between clones.
///
/// Counts write operations and can be told to fail reads or writes, which
/// makes it the store of choice for exercising write coalescing and storage
/// failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set`/`set_many`/`remove`/`clear` calls so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent read fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_readable(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage("memory store is unreadable".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("memory store is read-only".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check_readable()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        self.check_readable()?;
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|&key| entries.get(key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.check_readable()?;
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.check_writable()?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.check_writable()?;
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.check_writable()?;
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.check_writable()?;
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", json!(1)).await.unwrap();
        store
            .set_many(vec![("b".into(), json!("two")), ("c".into(), json!([3]))])
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
        let many = store.get_many(&["b", "c", "missing"]).await.unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many["c"], json!([3]));

        store.remove(&["a", "missing"]).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.writes(), 3);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", json!(true)).await.unwrap();
        assert_eq!(other.get("k").await.unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let err = store.set("k", json!(1)).await.unwrap_err();
        assert!(err.is_storage());
        assert_eq!(store.writes(), 0);

        store.fail_writes(false);
        store.set("k", json!(1)).await.unwrap();
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let store = MemoryStore::new();
        store.set("k", json!(1)).await.unwrap();
        store.fail_reads(true);

        assert!(store.get("k").await.unwrap_err().is_storage());
        assert!(store.get_many(&["k"]).await.is_err());
        assert!(store.keys().await.is_err());

        store.fail_reads(false);
        assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);
    }
}
