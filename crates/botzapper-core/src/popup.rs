//! Read-only statistics view: counters plus the published denylist statistics.
//!
//! Nothing here fails; unavailable values are rendered as `N/A` and read
//! failures as `Error`.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, warn};

use crate::denylist::DenylistStatistics;
use crate::storage::{Store, keys};
use crate::surface::SurfaceHandle;

/// One displayed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    /// Known value.
    Value(u64),
    /// Source missing or not answering.
    NotAvailable,
    /// Source failed.
    Error,
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::NotAvailable => f.write_str("N/A"),
            Self::Error => f.write_str("Error"),
        }
    }
}

/// Everything the popup shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupView {
    /// Posts hidden across all activations.
    pub all_time: u64,
    /// Posts hidden by the active content surface.
    pub session: Stat,
    /// Users behind the denylist.
    pub total_users: Stat,
    /// Users per tier, Level 1 first.
    pub users_per_tier: [Stat; 3],
}

impl PopupView {
    /// Reads the counters and statistics.
    ///
    /// The session count comes from the content surface behind `handle`; with
    /// no handle or no answer within `timeout` it is `N/A`.
    pub async fn load<L, T>(local: &L, handle: Option<&SurfaceHandle<T>>, timeout: Duration) -> Self
    where
        L: Store + Sync,
    {
        let all_time = match local.get(keys::ALL_TIME_HIDDEN).await {
            Ok(value) => value.as_ref().and_then(Value::as_u64).unwrap_or(0),
            Err(e) => {
                warn!("Failed to read all-time hidden posts: {e}");
                0
            }
        };

        let session = match handle {
            Some(handle) => handle
                .session_hidden_posts(timeout)
                .await
                .map_or(Stat::NotAvailable, Stat::Value),
            None => Stat::NotAvailable,
        };

        let statistics = match local.get(keys::DENYLIST_DATA).await {
            Ok(Some(data)) => DenylistStatistics::from_payload(&data).ok_or_else(|| {
                warn!("Denylist statistics not found in local storage");
                Stat::NotAvailable
            }),
            Ok(None) => Err(Stat::NotAvailable),
            Err(e) => {
                error!("Error reading cached denylist statistics: {e}");
                Err(Stat::Error)
            }
        };

        let (total_users, users_per_tier) = match statistics {
            Ok(stats) => (
                Stat::Value(stats.total_users_blacklisted),
                [
                    Stat::Value(stats.users_in_level_1),
                    Stat::Value(stats.users_in_level_2),
                    Stat::Value(stats.users_in_level_3),
                ],
            ),
            Err(placeholder) => (placeholder, [placeholder; 3]),
        };

        Self {
            all_time,
            session,
            total_users,
            users_per_tier,
        }
    }
}

impl fmt::Display for PopupView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hidden this session: {}", self.session)?;
        writeln!(f, "Hidden all time:     {}", self.all_time)?;
        writeln!(f, "Blacklisted users:   {}", self.total_users)?;
        for (level, users) in self.users_per_tier.iter().enumerate() {
            writeln!(f, "  Level {}:           {users}", level + 1)?;
        }
        Ok(())
    }
}
