//! Durable key-value storage areas.
//!
//! Two areas exist, mirroring a browser extension's storage:
//! - the **local** area holds the denylist snapshot, its revalidation tokens and
//!   the all-time counter;
//! - the **synced** area holds the user's blocking level and notifies every
//!   subscriber when a value changes, whichever surface wrote it.
//!
//! Values are JSON. Both [`MemoryStore`] and [`SqliteStore`] implement
//! [`Store`]; [`SyncedArea`] wraps either one and adds change notification.

mod memory;
mod sqlite;
mod synced;

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use synced::{StorageChange, SyncedArea};

use crate::Result;

/// Well-known storage keys.
pub mod keys {
    /// Synced area: user's blocking level (`"low"`, `"medium"`, `"high"`).
    pub const BLOCKING_LEVEL: &str = "blockingLevel";
    /// Local area: raw denylist payload as last fetched.
    pub const DENYLIST_DATA: &str = "blacklistFullDataByLevel";
    /// Local area: epoch milliseconds of the last successful fetch or revalidation.
    pub const DENYLIST_TIMESTAMP: &str = "blacklistTimestamp";
    /// Local area: `ETag` of the stored payload.
    pub const DENYLIST_ETAG: &str = "blacklistEtag";
    /// Local area: `Last-Modified` of the stored payload.
    pub const DENYLIST_LAST_MODIFIED: &str = "blacklistLastModified";
    /// Local area: all-time hidden post counter.
    pub const ALL_TIME_HIDDEN: &str = "allTimeHiddenPosts";
}

/// An asynchronous JSON key-value store.
#[trait_variant::make(Send)]
pub trait Store {
    /// Reads one key.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>>;

    /// Reads several keys; absent keys are missing from the map.
    fn get_many(&self, keys: &[&str]) -> impl Future<Output = Result<HashMap<String, Value>>>;

    /// Writes one key.
    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<()>>;

    /// Writes several keys as one operation.
    fn set_many(&self, entries: Vec<(String, Value)>) -> impl Future<Output = Result<()>>;

    /// Lists every stored key.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>>>;

    /// Removes keys. Removing an absent key is not an error.
    fn remove(&self, keys: &[&str]) -> impl Future<Output = Result<()>>;

    /// Removes every key.
    fn clear(&self) -> impl Future<Output = Result<()>>;
}
