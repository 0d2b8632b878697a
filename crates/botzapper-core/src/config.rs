//! Runtime configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use botzapper_feed::Markers;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Raw URL of the public denylist.
pub const DEFAULT_DENYLIST_URL: &str = "https://gist.githubusercontent.com/LogosaurusLTD/9651fe254709cdcc763d1528210f6244/raw/blacklist.json";

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "botzapper";

/// Engine configuration. Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZapperConfig {
    /// Where the denylist is fetched from.
    pub denylist_url: String,
    /// A snapshot younger than this is used without any network call.
    pub freshness_window_secs: u64,
    /// Quiet period before the all-time counter is persisted.
    pub persist_debounce_ms: u64,
    /// Origin used to resolve relative post links.
    pub page_origin: String,
    /// Host page structural markers.
    pub markers: Markers,
}

impl Default for ZapperConfig {
    fn default() -> Self {
        Self {
            denylist_url: DEFAULT_DENYLIST_URL.to_string(),
            freshness_window_secs: 3600,
            persist_debounce_ms: 500,
            page_origin: "https://9gag.com".to_string(),
            markers: Markers::default(),
        }
    }
}

impl ZapperConfig {
    /// Freshness window as a [`Duration`].
    #[must_use]
    pub const fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    /// Counter persistence debounce as a [`Duration`].
    #[must_use]
    pub const fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    /// Default config file location (`<config_dir>/botzapper/config.json`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Default data directory (`<data_dir>/botzapper`).
    #[must_use]
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Loads configuration from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Saves configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Checks values that would make the engine misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.denylist_url)
            .map_err(|e| Error::Config(format!("denylist_url: {e}")))?;
        url::Url::parse(&self.page_origin)
            .map_err(|e| Error::Config(format!("page_origin: {e}")))?;
        if self.markers.section_class.is_empty() || self.markers.post_id_prefix.is_empty() {
            return Err(Error::Config(
                "markers.section_class and markers.post_id_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
