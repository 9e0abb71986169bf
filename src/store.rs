//! Local preference store: dashboard display settings and search history,
//! persisted as one JSON file.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::loader::default_state_path;
use crate::config::types::StoreConfig;

/// Most search-history entries kept.
pub const SEARCH_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    Calendar,
    Stats,
    Notifications,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardPrefs {
    pub visible_widgets: Vec<Widget>,
    /// Calendar year shown by default; `None` means the current year.
    pub default_year: Option<i32>,
    /// Overrides `engine.repo_limit` when set.
    pub repo_limit: Option<usize>,
    /// Include read threads in the notification list.
    pub show_all_notifications: bool,
}

impl Default for DashboardPrefs {
    fn default() -> Self {
        Self {
            visible_widgets: vec![Widget::Calendar, Widget::Stats, Widget::Notifications],
            default_year: None,
            repo_limit: None,
            show_all_notifications: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredState {
    dashboard: DashboardPrefs,
    /// Newest first.
    search_history: Vec<SearchEntry>,
}

impl StoredState {
    fn record_search(&mut self, query: &str, at: DateTime<Utc>) {
        self.search_history.retain(|e| e.query != query);
        self.search_history.insert(
            0,
            SearchEntry {
                query: query.to_owned(),
                timestamp: at,
            },
        );
        self.search_history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.search_history.truncate(SEARCH_HISTORY_LIMIT);
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no state directory: set XDG_STATE_HOME or HOME, or configure store.path")]
    NoStateDir,
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed state file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Single-writer JSON store. Every call reads the file fresh, so separate
/// CLI invocations see each other's writes.
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `store.path` from the config, else the XDG state location.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = match &config.path {
            Some(path) => path.clone(),
            None => default_state_path().ok_or(StoreError::NoStateDir)?,
        };
        Ok(Self::open(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dashboard(&self) -> Result<DashboardPrefs, StoreError> {
        Ok(self.read()?.dashboard)
    }

    pub fn save_dashboard(&self, prefs: &DashboardPrefs) -> Result<(), StoreError> {
        let mut state = self.read()?;
        state.dashboard = prefs.clone();
        self.write(&state)
    }

    /// Search history, newest first.
    pub fn search_history(&self) -> Result<Vec<SearchEntry>, StoreError> {
        Ok(self.read()?.search_history)
    }

    /// Record a search now. Blank queries are ignored; a repeated query moves
    /// to the front with a fresh timestamp.
    pub fn add_search(&self, query: &str) -> Result<(), StoreError> {
        self.add_search_at(query, Utc::now())
    }

    pub fn add_search_at(&self, query: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }
        let mut state = self.read()?;
        state.record_search(query, at);
        self.write(&state)
    }

    pub fn clear_search_history(&self) -> Result<(), StoreError> {
        let mut state = self.read()?;
        state.search_history.clear();
        self.write(&state)
    }

    fn read(&self) -> Result<StoredState, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
                    path: self.path.clone(),
                    source,
                })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(StoredState::default()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write(&self, state: &StoredState) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(state)?;
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        std::fs::write(&self.path, data).map_err(io_err)?;
        tracing::debug!("store: wrote {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn repeated_query_moves_to_front() {
        let mut state = StoredState::default();
        state.record_search("rust", at(0));
        state.record_search("tokio", at(1));
        state.record_search("rust", at(2));
        let queries: Vec<_> = state.search_history.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["rust", "tokio"]);
        assert_eq!(state.search_history[0].timestamp, at(2));
    }

    #[test]
    fn history_is_capped() {
        let mut state = StoredState::default();
        for i in 0..15 {
            state.record_search(&format!("q{i}"), at(i));
        }
        assert_eq!(state.search_history.len(), SEARCH_HISTORY_LIMIT);
        assert_eq!(state.search_history[0].query, "q14");
        assert_eq!(state.search_history[9].query, "q5");
    }

    #[test]
    fn unknown_and_missing_fields_default() {
        let state: StoredState =
            serde_json::from_str(r#"{"dashboard":{"default_year":2023},"extra":1}"#).unwrap();
        assert_eq!(state.dashboard.default_year, Some(2023));
        assert_eq!(state.dashboard.visible_widgets.len(), 3);
        assert!(state.search_history.is_empty());
    }
}
