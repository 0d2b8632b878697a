//! Blocking policy: the user's single filtering setting.
//!
//! The durable value lives in the synced storage area under
//! [`keys::BLOCKING_LEVEL`]. [`PolicyProvider`] caches it, re-reads it on
//! demand and hands out [`PolicyWatch`]es that fire whenever any surface of
//! the installation writes a new value.

use std::fmt;

use serde_json::{Value, json};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::denylist::Tier;
use crate::storage::{StorageChange, Store, SyncedArea, keys};
use crate::{Error, Result};

/// How aggressively posts are hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Hide Level 1 only.
    Low,
    /// Hide Levels 1 and 2.
    #[default]
    Medium,
    /// Hide every level.
    High,
    /// Stored value not understood; nothing is hidden.
    Unrecognized,
}

impl Policy {
    /// Parse from storage string representation. Only the exact lowercase
    /// names are recognized.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unrecognized,
        }
    }

    /// Parse a stored JSON value; anything but a known string is unrecognized.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        value.as_str().map_or(Self::Unrecognized, Self::parse)
    }

    /// Convert to storage string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Whether posts of `tier` are hidden under this policy.
    ///
    /// | policy | hides |
    /// |---|---|
    /// | low | Level 1 |
    /// | medium | Level 1, 2 |
    /// | high | Level 1, 2, 3 |
    /// | unrecognized | nothing |
    #[must_use]
    pub const fn hides(self, tier: Tier) -> bool {
        match self {
            Self::Low => matches!(tier, Tier::Level1),
            Self::Medium => matches!(tier, Tier::Level1 | Tier::Level2),
            Self::High => true,
            Self::Unrecognized => false,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Policy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Resolves and caches the blocking policy.
pub struct PolicyProvider<S> {
    area: SyncedArea<S>,
    cached: Policy,
}

impl<S> PolicyProvider<S>
where
    S: Store + Send + Sync,
{
    /// Creates a provider; the cache holds the default until [`refresh`](Self::refresh).
    #[must_use]
    pub fn new(area: SyncedArea<S>) -> Self {
        Self {
            area,
            cached: Policy::default(),
        }
    }

    /// Cached policy.
    #[must_use]
    pub const fn get(&self) -> Policy {
        self.cached
    }

    /// Re-reads the durable value. A missing key means the default (medium);
    /// a storage failure keeps the previous cached value.
    pub async fn refresh(&mut self) -> Policy {
        match self.area.get(keys::BLOCKING_LEVEL).await {
            Ok(Some(value)) => self.cached = Policy::from_value(&value),
            Ok(None) => self.cached = Policy::default(),
            Err(e) => warn!("Failed to read blocking level, keeping {}: {e}", self.cached),
        }
        info!(policy = %self.cached, "Current blocking level");
        self.cached
    }

    /// Writes a new durable value (settings surface). Every subscriber,
    /// including this provider's own watches, is notified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for [`Policy::Unrecognized`], or a storage
    /// error if the write fails.
    pub async fn set(&mut self, policy: Policy) -> Result<()> {
        if policy == Policy::Unrecognized {
            return Err(Error::Config("cannot store an unrecognized policy".to_string()));
        }
        self.area.set(keys::BLOCKING_LEVEL, json!(policy.as_str())).await?;
        self.cached = policy;
        info!(%policy, "Blocking level saved");
        Ok(())
    }

    /// Watches for durable changes made after this call.
    #[must_use]
    pub fn subscribe(&self) -> PolicyWatch {
        PolicyWatch {
            changes: self.area.subscribe(),
        }
    }
}

/// Change notification for the blocking policy.
#[derive(Debug)]
pub struct PolicyWatch {
    changes: broadcast::Receiver<StorageChange>,
}

impl PolicyWatch {
    /// Waits until the blocking level changes.
    ///
    /// Returns `false` once the storage area is gone. If notifications were
    /// dropped because this watch fell behind, it reports a change so the
    /// caller re-reads the durable value.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.changes.recv().await {
                Ok(change) if change.key == keys::BLOCKING_LEVEL => {
                    debug!(value = ?change.new_value, "Blocking level changed");
                    return true;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed storage notifications, resyncing policy");
                    return true;
                }
                Err(RecvError::Closed) => return false,
            }
        }
    }
}
