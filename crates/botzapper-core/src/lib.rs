//! # botzapper-core
//!
//! Denylist cache and feed reconciliation engine for `BotZapper`.
//!
//! This crate provides:
//! - **Denylist Store** - tiered denylist with a 1 hour freshness window,
//!   `ETag`/`Last-Modified` revalidation and stale-but-available fallback
//! - **Policy Provider** - the user's blocking level with change notification
//!   across surfaces
//! - **Classifier** - pure hide/keep decision
//! - **Counter Ledger** - session and all-time counters with debounced writes
//! - **Feed Reconciler** - hides denied posts and collapses emptied sections
//! - **Change Watcher** - triggers passes on feed-relevant mutations only
//! - **Content Surface** - single-task event loop tying it all together
//! - **Storage** - JSON key-value areas backed by memory or `SQLite`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod classifier;
pub mod config;
pub mod counters;
pub mod debounce;
pub mod denylist;
mod error;
pub mod policy;
pub mod popup;
pub mod reconciler;
pub mod storage;
pub mod surface;
pub mod watcher;

pub use classifier::decide;
pub use config::ZapperConfig;
pub use counters::CounterLedger;
pub use debounce::DelayedTask;
pub use denylist::{
    Denylist, DenylistClient, DenylistStatistics, DenylistStore, FetchOutcome, RefreshSource,
    Tier, Validators,
};
pub use error::{Error, Result};
pub use policy::{Policy, PolicyProvider, PolicyWatch};
pub use popup::{PopupView, Stat};
pub use reconciler::{PassReport, Reconciler};
pub use storage::{MemoryStore, SqliteStore, StorageChange, Store, SyncedArea};
pub use surface::{ContentSurface, Request, SessionHiddenPosts, SurfaceEvent, SurfaceHandle};
pub use watcher::ChangeWatcher;
