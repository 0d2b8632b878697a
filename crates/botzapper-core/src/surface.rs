//! Content surface: the filtering engine attached to one rendered feed.
//!
//! A [`ContentSurface`] owns the tree and every engine component. All work
//! happens on one logical task: page mutations, inter-surface messages and
//! policy changes are processed strictly one after another, so two passes
//! never overlap.
//!
//! Other surfaces talk to it through a [`SurfaceHandle`].

use std::time::Duration;

use botzapper_feed::FeedTree;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ZapperConfig;
use crate::counters::CounterLedger;
use crate::denylist::{DenylistClient, DenylistStore};
use crate::policy::{PolicyProvider, PolicyWatch};
use crate::reconciler::{PassReport, Reconciler};
use crate::storage::{Store, SyncedArea};
use crate::watcher::ChangeWatcher;
use crate::Result;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Inter-surface request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// `{"action": "getSessionHiddenPosts"}`
    GetSessionHiddenPosts,
}

/// Reply to [`Request::GetSessionHiddenPosts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHiddenPosts {
    /// Posts hidden since the surface was activated.
    pub session_count: u64,
}

/// A page-side change to the tree.
pub type PageMutation<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Work for the surface task.
pub enum SurfaceEvent<T> {
    /// The page changed the tree; pending mutation records are checked afterwards.
    Page(PageMutation<T>),
    /// Another surface asks something; exactly one reply is sent.
    Message {
        /// What is asked.
        request: Request,
        /// Where the answer goes.
        reply: oneshot::Sender<SessionHiddenPosts>,
    },
    /// Stop processing and save counters.
    Shutdown,
}

impl<T> std::fmt::Debug for SurfaceEvent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Page(_) => f.write_str("Page"),
            Self::Message { request, .. } => {
                f.debug_struct("Message").field("request", request).finish()
            }
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Sender side of a content surface.
pub struct SurfaceHandle<T> {
    events: mpsc::Sender<SurfaceEvent<T>>,
}

impl<T> Clone for SurfaceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<T> SurfaceHandle<T> {
    /// Creates a handle and the receiver to pass to [`ContentSurface::run`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<SurfaceEvent<T>>) {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { events }, receiver)
    }

    /// Applies a page-side mutation. Returns `false` if the surface is gone.
    pub async fn page<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.events
            .send(SurfaceEvent::Page(Box::new(mutate)))
            .await
            .is_ok()
    }

    /// Sends a request and waits for its reply.
    ///
    /// Returns `None` when the surface is not active, drops the request, or
    /// does not answer within `timeout`.
    pub async fn request(&self, request: Request, timeout: Duration) -> Option<SessionHiddenPosts> {
        let (reply, response) = oneshot::channel();
        if self
            .events
            .send(SurfaceEvent::Message { request, reply })
            .await
            .is_err()
        {
            debug!(?request, "No active content surface");
            return None;
        }
        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(_)) => {
                debug!(?request, "Content surface dropped the request");
                None
            }
            Err(_) => {
                warn!(?request, ?timeout, "Content surface did not answer in time");
                None
            }
        }
    }

    /// Session hidden count, if a surface answers.
    pub async fn session_hidden_posts(&self, timeout: Duration) -> Option<u64> {
        self.request(Request::GetSessionHiddenPosts, timeout)
            .await
            .map(|response| response.session_count)
    }

    /// Asks the surface to stop. Returns `false` if it is already gone.
    pub async fn shutdown(&self) -> bool {
        self.events.send(SurfaceEvent::Shutdown).await.is_ok()
    }
}

/// The filtering engine bound to one rendered feed.
pub struct ContentSurface<T, L, Y> {
    tree: T,
    denylist: DenylistStore<L>,
    policy: PolicyProvider<Y>,
    policy_watch: Option<PolicyWatch>,
    ledger: CounterLedger<L>,
    reconciler: Reconciler,
    watcher: ChangeWatcher,
    active: bool,
}

impl<T, L, Y> ContentSurface<T, L, Y>
where
    T: FeedTree + Send + 'static,
    L: Store + Clone + Send + Sync + 'static,
    Y: Store + Send + Sync + 'static,
{
    /// Builds a surface over `tree` using the local and synced storage areas.
    ///
    /// # Errors
    ///
    /// Returns an error if the denylist URL or the page origin is invalid.
    pub fn new(tree: T, config: &ZapperConfig, local: L, synced: SyncedArea<Y>) -> Result<Self> {
        let client = DenylistClient::new(&config.denylist_url)?;
        let page_origin = Url::parse(&config.page_origin)?;
        Ok(Self {
            tree,
            denylist: DenylistStore::new(client, local.clone(), config.freshness_window()),
            policy: PolicyProvider::new(synced),
            policy_watch: None,
            ledger: CounterLedger::new(local, config.persist_debounce()),
            reconciler: Reconciler::new(config.markers.clone(), page_origin),
            watcher: ChangeWatcher::new(&config.markers),
            active: false,
        })
    }

    /// Loads policy and denylist, loads counters, runs the initial pass and
    /// starts watching for changes.
    ///
    /// A denylist that cannot be loaded leaves the feed unfiltered.
    pub async fn activate(&mut self) -> PassReport {
        self.policy_watch = Some(self.policy.subscribe());

        let (policy, denylist) = tokio::join!(self.policy.refresh(), self.denylist.refresh());
        if let Err(e) = denylist {
            warn!("Continuing without a denylist: {e}");
        }
        self.ledger.load().await;

        let report = self.reconcile();
        // Changes made before observation started are covered by the initial pass.
        self.tree.take_records();
        self.active = true;
        info!(%policy, hidden = report.hidden, "Content surface active");
        report
    }

    /// Processes events until [`SurfaceEvent::Shutdown`] or until every
    /// handle is dropped, then saves counters. Activates first if needed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the final counter write fails.
    pub async fn run(&mut self, mut events: mpsc::Receiver<SurfaceEvent<T>>) -> Result<()> {
        if !self.active {
            self.activate().await;
        }
        let mut watch = self.policy_watch.take().unwrap_or_else(|| self.policy.subscribe());
        let mut watching_policy = true;

        loop {
            tokio::select! {
                // A policy written before an event was queued is applied first.
                biased;

                changed = watch.changed(), if watching_policy => {
                    if changed {
                        self.policy.refresh().await;
                        self.reconcile();
                        self.tree.take_records();
                    } else {
                        watching_policy = false;
                    }
                }
                event = events.recv() => match event {
                    Some(SurfaceEvent::Page(mutate)) => {
                        mutate(&mut self.tree);
                        self.deliver_mutations();
                    }
                    Some(SurfaceEvent::Message { request, reply }) => {
                        let response = self.answer(request);
                        if reply.send(response).is_err() {
                            debug!(?request, "Requester went away before the reply");
                        }
                    }
                    Some(SurfaceEvent::Shutdown) | None => break,
                },
            }
        }

        self.active = false;
        info!(session = self.ledger.session_count(), "Content surface stopped");
        self.ledger.flush().await
    }

    /// Activates and runs the surface on its own task.
    pub fn spawn(mut self) -> (SurfaceHandle<T>, JoinHandle<Result<Self>>) {
        let (handle, events) = SurfaceHandle::channel();
        let task = tokio::spawn(async move {
            self.run(events).await?;
            Ok(self)
        });
        (handle, task)
    }

    /// The rendered tree.
    #[must_use]
    pub const fn tree(&self) -> &T {
        &self.tree
    }

    /// Counter ledger.
    #[must_use]
    pub const fn ledger(&self) -> &CounterLedger<L> {
        &self.ledger
    }

    /// Denylist store.
    #[must_use]
    pub const fn denylist(&self) -> &DenylistStore<L> {
        &self.denylist
    }

    /// Reconciler state (collapsed sections).
    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Runs a full reconciliation pass with the current denylist and policy.
    pub fn reconcile(&mut self) -> PassReport {
        let denylist = self.denylist.tiers();
        self.reconciler
            .reconcile(&mut self.tree, &denylist, self.policy.get(), &mut self.ledger)
    }

    /// Hands pending mutation records to the watcher until the tree settles.
    ///
    /// A pass's own detachments produce records too; the follow-up pass finds
    /// nothing to do and the loop ends.
    fn deliver_mutations(&mut self) {
        while self.watcher.observe(&mut self.tree) {
            if !self.reconcile().changed_tree() {
                break;
            }
        }
    }

    fn answer(&self, request: Request) -> SessionHiddenPosts {
        match request {
            Request::GetSessionHiddenPosts => SessionHiddenPosts {
                session_count: self.ledger.session_count(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_wire_format() {
        assert_eq!(
            serde_json::to_value(Request::GetSessionHiddenPosts).unwrap(),
            json!({"action": "getSessionHiddenPosts"})
        );
        let request: Request =
            serde_json::from_value(json!({"action": "getSessionHiddenPosts"})).unwrap();
        assert_eq!(request, Request::GetSessionHiddenPosts);
        assert_eq!(
            serde_json::to_value(SessionHiddenPosts { session_count: 3 }).unwrap(),
            json!({"sessionCount": 3})
        );
    }

    #[tokio::test]
    async fn test_request_without_surface_is_absent() {
        let (handle, events) = SurfaceHandle::<()>::channel();
        drop(events);
        assert_eq!(handle.session_hidden_posts(Duration::from_secs(1)).await, None);
        assert!(!handle.shutdown().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out() {
        let (handle, mut events) = SurfaceHandle::<()>::channel();
        let held = tokio::spawn(async move {
            // Receives but never replies.
            let event = events.recv().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(event);
        });

        assert_eq!(handle.session_hidden_posts(Duration::from_millis(100)).await, None);
        held.abort();
    }
}
