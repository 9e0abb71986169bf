use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use moka::future::Cache;
use octocrab::Octocrab;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::types::GitHubConfig;
use crate::github::auth;

/// An authenticated Octocrab instance plus a TTL cache for list responses.
///
/// Cached values are stored as JSON strings keyed by endpoint and arguments.
pub struct GitHubClient {
    octocrab: Arc<Octocrab>,
    cache: Cache<String, String>,
    per_page: u8,
    max_pages: u32,
}

impl GitHubClient {
    /// Resolve a token for `config.host` and build the client.
    pub fn connect(config: &GitHubConfig) -> Result<Self> {
        let host = config.host.as_str();
        let token = auth::resolve_token(host)?;

        let builder = if host == "github.com" {
            Octocrab::builder().personal_token(token)
        } else {
            Octocrab::builder()
                .personal_token(token)
                .base_uri(format!("https://{host}/api/v3"))
                .context("setting GHE base URI")?
        };

        let octocrab = builder.build().context("building octocrab instance")?;
        Ok(Self::from_octocrab(octocrab, config))
    }

    /// Wrap an already configured Octocrab (custom base URI, test server).
    pub fn from_octocrab(octocrab: Octocrab, config: &GitHubConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(
                u64::from(config.refetch_interval_minutes.max(1)) * 60,
            ))
            .build();

        Self {
            octocrab: Arc::new(octocrab),
            cache,
            per_page: config.per_page.clamp(1, 100),
            max_pages: config.max_pages.max(1),
        }
    }

    pub fn octocrab(&self) -> &Arc<Octocrab> {
        &self.octocrab
    }

    pub(crate) fn per_page(&self) -> u8 {
        self.per_page
    }

    pub(crate) fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Serve `key` from the cache, or run `fetch` and store its result.
    pub(crate) async fn cached<T, F, Fut>(&self, key: String, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.cache.get(&key).await
            && let Ok(value) = serde_json::from_str::<T>(&cached)
        {
            tracing::debug!("cache hit for {key}");
            return Ok(value);
        }

        let value = fetch().await?;
        if let Ok(json) = serde_json::to_string(&value) {
            self.cache.insert(key, json).await;
        }
        Ok(value)
    }

    pub(crate) async fn insert_cached<T: Serialize>(&self, key: String, value: &T) {
        if let Ok(json) = serde_json::to_string(value) {
            self.cache.insert(key, json).await;
        }
    }

    pub(crate) async fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cached = self.cache.get(key).await?;
        let value = serde_json::from_str(&cached).ok()?;
        tracing::debug!("cache hit for {key}");
        Some(value)
    }

    /// Follow `?page=N` pagination on a REST listing.
    ///
    /// Stops at a short page, after `max_pages`, or once `cap` items are in.
    pub(crate) async fn get_paged<T: DeserializeOwned>(
        &self,
        route: &str,
        params: &[(&str, &str)],
        cap: usize,
    ) -> Result<Vec<T>> {
        let per_page = usize::from(self.per_page);
        let mut all: Vec<T> = Vec::new();

        for page in 1..=self.max_pages {
            let mut query: HashMap<&str, String> = params
                .iter()
                .map(|(k, v)| (*k, (*v).to_owned()))
                .collect();
            query.insert("per_page", per_page.to_string());
            query.insert("page", page.to_string());

            let items: Vec<T> = self
                .octocrab
                .get(route, Some(&query))
                .await
                .with_context(|| format!("fetching {route} (page {page})"))?;
            let n = items.len();
            all.extend(items);

            if n < per_page || all.len() >= cap {
                break;
            }
            if page == self.max_pages {
                tracing::debug!("{route}: stopped at page cap {}", self.max_pages);
            }
        }

        all.truncate(cap);
        Ok(all)
    }
}
