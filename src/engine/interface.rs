use anyhow::Result;
use async_trait::async_trait;

use crate::types::{
    CommitActivity, CommitSummary, IssueSummary, NotificationQuery, NotificationThread,
    PullRequestSummary, RepoRef,
};

/// Everything the engine needs from the hosting platform.
///
/// Implemented by `GitHubProvider` (octocrab) and `StubProvider` (fixtures).
/// The engine never talks to the network except through this trait, so each
/// component can be exercised against in-memory data.
#[async_trait]
pub trait DataProvider: Send + Sync + 'static {
    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    /// Repositories owned by `user`, most recently pushed first, at most `limit`.
    async fn list_repositories(&self, user: &str, limit: usize) -> Result<Vec<RepoRef>>;

    /// Weekly commit-activity buckets for the past year.
    async fn commit_activity(&self, repo: &RepoRef) -> Result<CommitActivity>;

    async fn list_commits(&self, repo: &RepoRef, author: &str) -> Result<Vec<CommitSummary>>;

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        author: &str,
    ) -> Result<Vec<PullRequestSummary>>;

    /// Issues created by `creator`. May include pull requests flagged with
    /// `is_pull_request`; callers filter those out.
    async fn list_issues(&self, repo: &RepoRef, creator: &str) -> Result<Vec<IssueSummary>>;

    async fn list_notifications(&self, query: NotificationQuery)
    -> Result<Vec<NotificationThread>>;

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    async fn mark_thread_read(&self, thread_id: &str) -> Result<()>;

    async fn mark_all_read(&self) -> Result<()>;

    async fn mark_repo_read(&self, repo: &RepoRef) -> Result<()>;
}
