use std::sync::Arc;

use anyhow::Result;

use crate::config::types::EngineConfig;
use crate::types::{AggregateStats, ContributionCalendar, RepoRef};

use super::aggregate::{self, AggregateError};
use super::calendar::{self, CalendarError};
use super::interface::DataProvider;
use super::notifications::NotificationSync;

/// Per-session collaborators, built once at sign-in and passed by reference.
pub struct SessionContext {
    provider: Arc<dyn DataProvider>,
    login: String,
    settings: EngineConfig,
}

impl SessionContext {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        login: impl Into<String>,
        settings: EngineConfig,
    ) -> Self {
        Self {
            provider,
            login: login.into(),
            settings,
        }
    }

    pub fn provider(&self) -> &dyn DataProvider {
        self.provider.as_ref()
    }

    pub fn provider_handle(&self) -> Arc<dyn DataProvider> {
        Arc::clone(&self.provider)
    }

    /// Login of the signed-in user.
    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    /// The bounded repository set the fan-out components work on.
    ///
    /// An explicit list is truncated to `repo_limit`; otherwise the user's
    /// most recently pushed repositories are listed.
    pub async fn target_repositories(&self, explicit: Option<Vec<RepoRef>>) -> Result<Vec<RepoRef>> {
        let limit = self.settings.repo_limit;
        match explicit {
            Some(mut repos) => {
                repos.truncate(limit);
                Ok(repos)
            }
            None => self.provider.list_repositories(&self.login, limit).await,
        }
    }
}

/// An authenticated session: the context plus the long-lived notification feed.
///
/// Calendars and aggregates are computed on demand and not retained.
pub struct Session {
    ctx: Arc<SessionContext>,
    notifications: Arc<NotificationSync>,
}

impl Session {
    pub fn start(ctx: SessionContext) -> Self {
        let notifications = NotificationSync::new(&ctx);
        tracing::info!("session: started for {}", ctx.login());
        Self {
            ctx: Arc::new(ctx),
            notifications,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn notifications(&self) -> &Arc<NotificationSync> {
        &self.notifications
    }

    pub async fn aggregate(
        &self,
        repos: Option<Vec<RepoRef>>,
    ) -> Result<AggregateStats, AggregateError> {
        aggregate::aggregate_stats(&self.ctx, repos).await
    }

    pub async fn calendar(&self, year: i32) -> Result<ContributionCalendar, CalendarError> {
        calendar::synthesize_calendar(&self.ctx, year).await
    }

    /// Tear down everything the session owns. Late responses are dropped.
    pub fn sign_out(self) {
        tracing::info!("session: signing out {}", self.ctx.login());
        self.notifications.teardown();
    }
}
