use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

// ---------------------------------------------------------------------------
// GitHub access
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub host: String,
    /// Also the TTL of the response cache.
    pub refetch_interval_minutes: u32,
    /// Upper bound on pages followed for any single listing.
    pub max_pages: u32,
    pub per_page: u8,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_owned(),
            refetch_interval_minutes: 10,
            max_pages: 10,
            per_page: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine tuning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many repositories (most recently pushed first) the fan-out visits.
    pub repo_limit: usize,
    /// Repositories processed at once.
    pub concurrency: usize,
    pub stats_retry_delay_secs: u64,
    pub notification_timeout_secs: u64,
    pub notification_refresh_minutes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repo_limit: 10,
            concurrency: 4,
            stats_retry_delay_secs: 3,
            notification_timeout_secs: 10,
            notification_refresh_minutes: 5,
        }
    }
}

impl EngineConfig {
    pub fn stats_retry_delay(&self) -> Duration {
        Duration::from_secs(self.stats_retry_delay_secs)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs.max(1))
    }

    pub fn notification_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.notification_refresh_minutes.max(1) * 60)
    }
}

// ---------------------------------------------------------------------------
// Local state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// State file; `None` selects the XDG state directory.
    pub path: Option<PathBuf>,
}
