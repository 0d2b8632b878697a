//! Denylist data models.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Payload key holding the statistics object rather than a tier.
pub const STATISTICS_KEY: &str = "statistics";

/// Severity level of the denylist.
///
/// Ordering follows severity: `Level1` is the strictest and sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Most severe: hidden under every policy.
    Level1,
    /// Hidden under medium and high policies.
    Level2,
    /// Least severe: hidden only under the high policy.
    Level3,
}

impl Tier {
    /// All tiers, most severe first.
    pub const ALL: [Self; 3] = [Self::Level1, Self::Level2, Self::Level3];

    /// Payload key for this tier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Level1 => "Level 1",
            Self::Level2 => "Level 2",
            Self::Level3 => "Level 3",
        }
    }

    /// Numeric level (1 = most severe).
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Level1 => 1,
            Self::Level2 => 2,
            Self::Level3 => 3,
        }
    }

    /// Parse a payload key.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.name() == name)
    }

    const fn index(self) -> usize {
        self.level() as usize - 1
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tiered set of denied post identifiers.
///
/// Built wholesale from a payload and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist {
    tiers: [HashSet<String>; 3],
}

impl Denylist {
    /// An empty denylist: every post passes through.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a denylist from explicit tier contents.
    #[must_use]
    pub fn from_tiers<I, T>(tiers: I) -> Self
    where
        I: IntoIterator<Item = (Tier, T)>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        let mut list = Self::default();
        for (tier, ids) in tiers {
            list.tiers[tier.index()].extend(ids.into_iter().map(Into::into));
        }
        list
    }

    /// Builds a denylist from the raw payload object.
    ///
    /// Each tier is validated on its own: a tier whose value is not an array
    /// is skipped with a warning while the other tiers still load. The
    /// statistics object is metadata and is skipped silently; unknown keys are
    /// ignored; non-string identifiers are dropped.
    #[must_use]
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let mut list = Self::default();
        for (key, value) in payload {
            if key == STATISTICS_KEY {
                continue;
            }
            let Some(tier) = Tier::parse(key) else {
                debug!(key, "Ignoring unknown denylist key");
                continue;
            };
            let Some(ids) = value.as_array() else {
                warn!(%tier, "Invalid data for tier: expected array, got {value}");
                continue;
            };

            let set = &mut list.tiers[tier.index()];
            set.extend(ids.iter().filter_map(Value::as_str).map(ToString::to_string));
            if set.len() < ids.len() {
                debug!(%tier, dropped = ids.len() - set.len(), "Dropped duplicate or non-string ids");
            }
            info!(%tier, count = set.len(), "Populated tier");
        }
        list
    }

    /// Most severe tier containing `id`, checking Level 1, then 2, then 3.
    #[must_use]
    pub fn most_severe_tier(&self, id: &str) -> Option<Tier> {
        Tier::ALL
            .into_iter()
            .find(|tier| self.tiers[tier.index()].contains(id))
    }

    /// Whether `tier` contains `id`.
    #[must_use]
    pub fn contains(&self, id: &str, tier: Tier) -> bool {
        self.tiers[tier.index()].contains(id)
    }

    /// Identifiers of one tier.
    #[must_use]
    pub fn tier(&self, tier: Tier) -> &HashSet<String> {
        &self.tiers[tier.index()]
    }

    /// Total identifiers across all tiers (an id present in two tiers counts twice).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.iter().map(HashSet::len).sum()
    }

    /// Whether every tier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(HashSet::is_empty)
    }
}

/// Statistics block published alongside the denylist, read by the popup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenylistStatistics {
    /// Number of distinct users behind the listed posts.
    pub total_users_blacklisted: u64,
    /// Users in Level 1.
    pub users_in_level_1: u64,
    /// Users in Level 2.
    pub users_in_level_2: u64,
    /// Users in Level 3.
    pub users_in_level_3: u64,
}

impl DenylistStatistics {
    /// Extracts statistics from a raw payload, if present and well-formed.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let stats = payload.get(STATISTICS_KEY)?;
        serde_json::from_value(stats.clone()).ok()
    }
}
