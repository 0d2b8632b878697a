//! Tiered denylist with a locally cached, revalidating remote source.
//!
//! This module provides:
//! - **Model**: [`Tier`] severity levels and the immutable [`Denylist`]
//! - **Client**: conditional `GET` of the remote payload ([`DenylistClient`])
//! - **Store**: the freshness window, 304 revalidation and stale-but-available
//!   fallback ([`DenylistStore`])
//!
//! # Remote format
//!
//! ```json
//! {
//!   "Level 1": ["aXb12", "..."],
//!   "Level 2": ["..."],
//!   "Level 3": ["..."],
//!   "statistics": { "total_users_blacklisted": 42, "users_in_level_1": 7 }
//! }
//! ```

mod client;
mod model;
mod store;

pub use client::{DenylistClient, FetchOutcome, Validators};
pub use model::{Denylist, DenylistStatistics, STATISTICS_KEY, Tier};
pub use store::{DenylistStore, RefreshSource};
