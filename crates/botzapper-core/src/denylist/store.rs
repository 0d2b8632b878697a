//! Cached, revalidating denylist store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use super::client::{DenylistClient, FetchOutcome, Validators};
use super::model::{Denylist, DenylistStatistics, Tier};
use crate::storage::{Store, keys};
use crate::{Error, Result};

/// Where the data of the last refresh came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    /// Snapshot younger than the freshness window; no network call.
    Cache,
    /// Server answered 304; snapshot reused and its timestamp renewed.
    NotModified,
    /// New payload downloaded and persisted.
    Network,
    /// Fetch failed; an older snapshot was used instead.
    StaleFallback,
}

/// Persisted snapshot plus revalidation metadata.
#[derive(Debug, Default)]
struct Snapshot {
    data: Option<Value>,
    timestamp_ms: Option<i64>,
    validators: Validators,
}

/// Holds the in-memory denylist and refreshes it from the remote source.
///
/// The in-memory list is an immutable [`Denylist`] behind an [`Arc`]; a refresh
/// builds a complete new list and swaps it in, so a reader holding the
/// previous `Arc` never sees a half-built list.
pub struct DenylistStore<S> {
    client: DenylistClient,
    local: S,
    freshness_window: Duration,
    current: Arc<Denylist>,
    statistics: Option<DenylistStatistics>,
    last_source: Option<RefreshSource>,
}

impl<S: Store> DenylistStore<S> {
    /// Creates a store with an empty denylist.
    #[must_use]
    pub fn new(client: DenylistClient, local: S, freshness_window: Duration) -> Self {
        Self {
            client,
            local,
            freshness_window,
            current: Arc::new(Denylist::empty()),
            statistics: None,
            last_source: None,
        }
    }

    /// Current in-memory denylist.
    #[must_use]
    pub fn tiers(&self) -> Arc<Denylist> {
        Arc::clone(&self.current)
    }

    /// Whether the current denylist has `id` in `tier`.
    #[must_use]
    pub fn contains(&self, id: &str, tier: Tier) -> bool {
        self.current.contains(id, tier)
    }

    /// Statistics published with the current payload.
    #[must_use]
    pub const fn statistics(&self) -> Option<DenylistStatistics> {
        self.statistics
    }

    /// Source of the last successful refresh.
    #[must_use]
    pub const fn last_source(&self) -> Option<RefreshSource> {
        self.last_source
    }

    /// Refreshes using the current time.
    ///
    /// # Errors
    ///
    /// See [`refresh_at`](Self::refresh_at).
    pub async fn refresh(&mut self) -> Result<Arc<Denylist>> {
        self.refresh_at(Utc::now()).await
    }

    /// Refreshes the denylist as of `now`.
    ///
    /// A snapshot younger than the freshness window is used verbatim. Otherwise
    /// a conditional fetch is made; a 304 reuses the snapshot, a success
    /// replaces it, and any failure falls back to the snapshot if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSnapshot`] when the fetch fails and nothing was ever
    /// persisted. The in-memory denylist is then empty, so nothing is hidden.
    pub async fn refresh_at(&mut self, now: DateTime<Utc>) -> Result<Arc<Denylist>> {
        let snapshot = self.read_snapshot().await;
        let now_ms = now.timestamp_millis();

        let (data, source) = match self.fresh_snapshot(&snapshot, now_ms) {
            Some(data) => {
                debug!("Using cached denylist");
                (data, RefreshSource::Cache)
            }
            None => match self.revalidate(snapshot, now_ms).await {
                Ok(found) => found,
                Err(e) => {
                    error!("Failed to load denylist: {e}");
                    self.current = Arc::new(Denylist::empty());
                    self.statistics = None;
                    self.last_source = None;
                    return Err(e);
                }
            },
        };

        self.install(&data, source);
        Ok(self.tiers())
    }

    fn fresh_snapshot(&self, snapshot: &Snapshot, now_ms: i64) -> Option<Value> {
        let data = snapshot.data.as_ref()?;
        let timestamp_ms = snapshot.timestamp_ms?;
        let window_ms = i64::try_from(self.freshness_window.as_millis()).unwrap_or(i64::MAX);
        (now_ms.saturating_sub(timestamp_ms) < window_ms).then(|| data.clone())
    }

    async fn revalidate(&self, snapshot: Snapshot, now_ms: i64) -> Result<(Value, RefreshSource)> {
        // Tokens are only useful if there is something to revalidate.
        let validators = if snapshot.data.is_some() {
            snapshot.validators
        } else {
            Validators::default()
        };

        match self.client.fetch(&validators).await {
            Ok(FetchOutcome::NotModified) => {
                let Some(data) = snapshot.data else {
                    return Err(Error::NoSnapshot(
                        "server answered 304 but no snapshot is stored".to_string(),
                    ));
                };
                if let Err(e) = self.local.set(keys::DENYLIST_TIMESTAMP, json!(now_ms)).await {
                    warn!("Failed to renew denylist timestamp: {e}");
                }
                info!("Denylist not modified, using cached version");
                Ok((data, RefreshSource::NotModified))
            }
            Ok(FetchOutcome::Fetched { body, validators }) => {
                let entries = vec![
                    (keys::DENYLIST_DATA.to_string(), body.clone()),
                    (keys::DENYLIST_TIMESTAMP.to_string(), json!(now_ms)),
                    (keys::DENYLIST_ETAG.to_string(), json!(validators.etag)),
                    (
                        keys::DENYLIST_LAST_MODIFIED.to_string(),
                        json!(validators.last_modified),
                    ),
                ];
                if let Err(e) = self.local.set_many(entries).await {
                    warn!("Failed to persist denylist snapshot: {e}");
                }
                info!(url = %self.client.url(), "Denylist fetched and updated from remote");
                Ok((body, RefreshSource::Network))
            }
            Err(e) => match snapshot.data {
                Some(data) => {
                    warn!("Failed to fetch new denylist ({e}), using stale cached data");
                    Ok((data, RefreshSource::StaleFallback))
                }
                None => Err(Error::NoSnapshot(e.to_string())),
            },
        }
    }

    async fn read_snapshot(&self) -> Snapshot {
        let stored = match self
            .local
            .get_many(&[
                keys::DENYLIST_DATA,
                keys::DENYLIST_TIMESTAMP,
                keys::DENYLIST_ETAG,
                keys::DENYLIST_LAST_MODIFIED,
            ])
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to read denylist snapshot: {e}");
                return Snapshot::default();
            }
        };

        let data = stored.get(keys::DENYLIST_DATA).and_then(|data| {
            if data.is_object() {
                Some(data.clone())
            } else {
                warn!("Ignoring stored denylist snapshot that is not an object");
                None
            }
        });
        let text = |key: &str| {
            stored
                .get(key)
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };

        Snapshot {
            data,
            timestamp_ms: stored.get(keys::DENYLIST_TIMESTAMP).and_then(Value::as_i64),
            validators: Validators {
                etag: text(keys::DENYLIST_ETAG),
                last_modified: text(keys::DENYLIST_LAST_MODIFIED),
            },
        }
    }

    fn install(&mut self, data: &Value, source: RefreshSource) {
        let list = data
            .as_object()
            .map(Denylist::from_payload)
            .unwrap_or_default();
        info!(
            ?source,
            total = list.len(),
            level_1 = list.tier(Tier::Level1).len(),
            level_2 = list.tier(Tier::Level2).len(),
            level_3 = list.tier(Tier::Level3).len(),
            "Denylist loaded"
        );
        self.current = Arc::new(list);
        self.statistics = DenylistStatistics::from_payload(data);
        self.last_source = Some(source);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeDelta;
    use mockito::{Matcher, Server, ServerGuard};

    const HOUR: Duration = Duration::from_secs(3600);

    fn store_for(server: &ServerGuard, local: MemoryStore) -> DenylistStore<MemoryStore> {
        let client = DenylistClient::new(&format!("{}/blacklist.json", server.url())).unwrap();
        DenylistStore::new(client, local, HOUR)
    }

    async fn seed(local: &MemoryStore, data: Value, at: DateTime<Utc>, etag: Option<&str>) {
        local
            .set_many(vec![
                (keys::DENYLIST_DATA.to_string(), data),
                (keys::DENYLIST_TIMESTAMP.to_string(), json!(at.timestamp_millis())),
                (keys::DENYLIST_ETAG.to_string(), json!(etag)),
            ])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_refresh_fetches_and_persists() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/blacklist.json")
            .with_status(200)
            .with_header("etag", "\"v1\"")
            .with_body(r#"{"Level 1": ["abc"], "Level 2": ["def"]}"#)
            .create_async()
            .await;
        let local = MemoryStore::new();
        let mut store = store_for(&server, local.clone());
        let now = Utc::now();

        let list = store.refresh_at(now).await.unwrap();

        mock.assert_async().await;
        assert!(list.contains("abc", Tier::Level1));
        assert!(store.contains("def", Tier::Level2));
        assert_eq!(store.last_source(), Some(RefreshSource::Network));
        assert_eq!(
            local.get(keys::DENYLIST_ETAG).await.unwrap(),
            Some(json!("\"v1\""))
        );
        assert_eq!(
            local.get(keys::DENYLIST_TIMESTAMP).await.unwrap(),
            Some(json!(now.timestamp_millis()))
        );
    }

    #[tokio::test]
    async fn test_refreshes_within_window_make_no_network_calls() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/blacklist.json")
            .expect(0)
            .create_async()
            .await;
        let local = MemoryStore::new();
        let start = Utc::now();
        seed(&local, json!({"Level 1": ["abc"]}), start, Some("\"v1\"")).await;
        let mut store = store_for(&server, local);

        let first = store.refresh_at(start + TimeDelta::minutes(10)).await.unwrap();
        let second = store.refresh_at(start + TimeDelta::minutes(20)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(*first, *second);
        assert!(second.contains("abc", Tier::Level1));
        assert_eq!(store.last_source(), Some(RefreshSource::Cache));
    }

    #[tokio::test]
    async fn test_stale_snapshot_revalidates_with_not_modified() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/blacklist.json")
            .match_header("if-none-match", "\"v1\"")
            .with_status(304)
            .create_async()
            .await;
        let local = MemoryStore::new();
        let start = Utc::now();
        seed(&local, json!({"Level 2": ["old"]}), start, Some("\"v1\"")).await;
        let mut store = store_for(&server, local.clone());

        let later = start + TimeDelta::minutes(61);
        let list = store.refresh_at(later).await.unwrap();

        mock.assert_async().await;
        assert!(list.contains("old", Tier::Level2));
        assert_eq!(store.last_source(), Some(RefreshSource::NotModified));
        assert_eq!(
            local.get(keys::DENYLIST_TIMESTAMP).await.unwrap(),
            Some(json!(later.timestamp_millis()))
        );
        // Only the timestamp was rewritten.
        assert_eq!(
            local.get(keys::DENYLIST_DATA).await.unwrap(),
            Some(json!({"Level 2": ["old"]}))
        );
    }

    #[tokio::test]
    async fn test_stale_snapshot_replaced_by_new_payload() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/blacklist.json")
            .with_status(200)
            .with_header("etag", "\"v2\"")
            .with_body(r#"{"Level 3": ["new"]}"#)
            .create_async()
            .await;
        let local = MemoryStore::new();
        let start = Utc::now();
        seed(&local, json!({"Level 1": ["old"]}), start, Some("\"v1\"")).await;
        let mut store = store_for(&server, local.clone());

        let list = store.refresh_at(start + TimeDelta::hours(2)).await.unwrap();

        assert!(list.contains("new", Tier::Level3));
        assert!(!list.contains("old", Tier::Level1));
        assert_eq!(
            local.get(keys::DENYLIST_ETAG).await.unwrap(),
            Some(json!("\"v2\""))
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_stale_snapshot() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/blacklist.json")
            .with_status(500)
            .create_async()
            .await;
        let local = MemoryStore::new();
        let start = Utc::now();
        seed(&local, json!({"Level 1": ["abc"]}), start, None).await;
        let mut store = store_for(&server, local);

        let list = store.refresh_at(start + TimeDelta::hours(3)).await.unwrap();

        assert!(list.contains("abc", Tier::Level1));
        assert_eq!(store.last_source(), Some(RefreshSource::StaleFallback));
    }

    #[tokio::test]
    async fn test_malformed_payload_falls_back_to_stale_snapshot() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/blacklist.json")
            .with_status(200)
            .with_body("<html>rate limited</html>")
            .create_async()
            .await;
        let local = MemoryStore::new();
        let start = Utc::now();
        seed(&local, json!({"Level 1": ["abc"]}), start, None).await;
        let mut store = store_for(&server, local);

        let list = store.refresh_at(start + TimeDelta::hours(3)).await.unwrap();
        assert!(list.contains("abc", Tier::Level1));
    }

    #[tokio::test]
    async fn test_failure_without_snapshot_leaves_list_empty() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/blacklist.json")
            .match_header("if-none-match", Matcher::Missing)
            .with_status(404)
            .create_async()
            .await;
        let mut store = store_for(&server, MemoryStore::new());

        let err = store.refresh().await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, Error::NoSnapshot(_)));
        assert!(store.tiers().is_empty());
        assert_eq!(store.last_source(), None);
    }

    #[tokio::test]
    async fn test_not_modified_without_snapshot_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/blacklist.json")
            .with_status(304)
            .create_async()
            .await;
        let mut store = store_for(&server, MemoryStore::new());

        assert!(matches!(
            store.refresh().await.unwrap_err(),
            Error::NoSnapshot(_)
        ));
    }

    #[tokio::test]
    async fn test_unwritable_storage_still_installs_fresh_list() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/blacklist.json")
            .with_status(200)
            .with_body(r#"{"Level 1": ["abc"]}"#)
            .create_async()
            .await;
        let local = MemoryStore::new();
        local.fail_writes(true);
        let mut store = store_for(&server, local);

        let list = store.refresh().await.unwrap();
        assert!(list.contains("abc", Tier::Level1));
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot_across_refresh() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/blacklist.json")
            .with_status(200)
            .with_body(r#"{"Level 1": ["new"], "statistics": {"users_in_level_1": 1}}"#)
            .create_async()
            .await;
        let local = MemoryStore::new();
        let start = Utc::now();
        seed(&local, json!({"Level 1": ["old"]}), start, None).await;
        let mut store = store_for(&server, local);

        let before = store.refresh_at(start).await.unwrap();
        store.refresh_at(start + TimeDelta::hours(2)).await.unwrap();

        assert!(before.contains("old", Tier::Level1));
        assert!(store.contains("new", Tier::Level1));
        assert_eq!(store.statistics().unwrap().users_in_level_1, 1);
    }
}
