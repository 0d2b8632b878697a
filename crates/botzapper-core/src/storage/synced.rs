//! Storage area that broadcasts its changes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::Store;
use crate::Result;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// A value change in a [`SyncedArea`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Key that changed.
    pub key: String,
    /// New value, `None` when the key was removed.
    pub new_value: Option<Value>,
}

/// A store whose writes are broadcast to every subscriber.
///
/// Every surface of an installation (content surfaces, settings, popup) holds a
/// clone of the same area, so a write from any of them reaches all the others.
#[derive(Debug)]
pub struct SyncedArea<S> {
    store: Arc<S>,
    changes: broadcast::Sender<StorageChange>,
}

impl<S> Clone for SyncedArea<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            changes: self.changes.clone(),
        }
    }
}

impl<S> SyncedArea<S> {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: S) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store: Arc::new(store),
            changes,
        }
    }

    /// Subscribes to changes made after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn notify(&self, key: &str, new_value: Option<Value>) {
        let change = StorageChange {
            key: key.to_string(),
            new_value,
        };
        // No receivers is fine: nobody is listening yet.
        if self.changes.send(change).is_err() {
            debug!(key, "Storage change with no subscribers");
        }
    }
}

impl<S> Store for SyncedArea<S>
where
    S: Store + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.store.get(key).await
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        self.store.get_many(keys).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let previous = self.store.get(key).await?;
        self.store.set(key, value.clone()).await?;
        if previous.as_ref() != Some(&value) {
            self.notify(key, Some(value));
        }
        Ok(())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        let previous = self.store.get_many(&keys).await?;
        self.store.set_many(entries.clone()).await?;
        for (key, value) in entries {
            if previous.get(&key) != Some(&value) {
                self.notify(&key, Some(value));
            }
        }
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let previous = self.store.get_many(keys).await?;
        self.store.remove(keys).await?;
        for key in keys {
            if previous.contains_key(*key) {
                self.notify(key, None);
            }
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.store.keys().await
    }

    async fn clear(&self) -> Result<()> {
        let previous = self.store.keys().await?;
        self.store.clear().await?;
        for key in previous {
            self.notify(&key, None);
        }
        Ok(())
    }
}
