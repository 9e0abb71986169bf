use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::types::GitHubConfig;
use crate::engine::DataProvider;
use crate::github::client::GitHubClient;
use crate::github::{activity, notifications};
use crate::types::{
    CommitActivity, CommitSummary, IssueSummary, NotificationQuery, NotificationThread,
    PullRequestSummary, RepoRef,
};

/// [`DataProvider`] backed by the GitHub REST API.
pub struct GitHubProvider {
    client: GitHubClient,
}

impl GitHubProvider {
    pub fn connect(config: &GitHubConfig) -> Result<Self> {
        Ok(Self::new(GitHubClient::connect(config)?))
    }

    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    /// Login of the token's owner.
    pub async fn current_login(&self) -> Result<String> {
        let user = self
            .client
            .octocrab()
            .current()
            .user()
            .await
            .context("fetching authenticated user")?;
        Ok(user.login)
    }
}

#[async_trait]
impl DataProvider for GitHubProvider {
    async fn list_repositories(&self, user: &str, limit: usize) -> Result<Vec<RepoRef>> {
        activity::fetch_repositories(&self.client, user, limit).await
    }

    async fn commit_activity(&self, repo: &RepoRef) -> Result<CommitActivity> {
        activity::fetch_commit_activity(&self.client, repo).await
    }

    async fn list_commits(&self, repo: &RepoRef, author: &str) -> Result<Vec<CommitSummary>> {
        activity::fetch_commits(&self.client, repo, author).await
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        author: &str,
    ) -> Result<Vec<PullRequestSummary>> {
        activity::fetch_pull_requests(&self.client, repo, author).await
    }

    async fn list_issues(&self, repo: &RepoRef, creator: &str) -> Result<Vec<IssueSummary>> {
        activity::fetch_issues(&self.client, repo, creator).await
    }

    async fn list_notifications(
        &self,
        query: NotificationQuery,
    ) -> Result<Vec<NotificationThread>> {
        notifications::fetch_notifications(&self.client, query).await
    }

    async fn mark_thread_read(&self, thread_id: &str) -> Result<()> {
        notifications::mark_as_read(&self.client, thread_id).await
    }

    async fn mark_all_read(&self) -> Result<()> {
        notifications::mark_all_as_read(&self.client).await
    }

    async fn mark_repo_read(&self, repo: &RepoRef) -> Result<()> {
        notifications::mark_repo_as_read(&self.client, repo).await
    }
}
