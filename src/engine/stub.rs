use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use crate::types::{
    CommitActivity, CommitSummary, IssueSummary, NotificationQuery, NotificationThread,
    PullRequestSummary, RepoRef,
};

use super::interface::DataProvider;

/// Which provider call a stub failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubCall {
    ListRepositories,
    CommitActivity,
    Commits,
    PullRequests,
    Issues,
    Notifications,
    Mutations,
}

/// Fixture data for one repository.
#[derive(Debug, Clone, Default)]
pub struct RepoFixture {
    pub repo: Option<RepoRef>,
    pub commits: Vec<CommitSummary>,
    pub pull_requests: Vec<PullRequestSummary>,
    pub issues: Vec<IssueSummary>,
    /// Successive answers to `commit_activity`; the last one repeats.
    pub activity: Vec<CommitActivity>,
}

impl RepoFixture {
    pub fn new(full_name: &str) -> Self {
        Self {
            repo: RepoRef::from_full_name(full_name),
            ..Self::default()
        }
    }
}

/// A mutation the stub received, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedMutation {
    ThreadRead(String),
    AllRead,
    RepoRead(String),
}

/// One scripted answer to `list_notifications`.
struct ScriptedNotifications {
    delay: Duration,
    result: std::result::Result<Vec<NotificationThread>, String>,
}

/// A provider that serves pre-loaded fixture data without any network calls.
///
/// Useful for integration tests and offline demos that must not require a
/// `GITHUB_TOKEN`. Latency and failures can be injected per call kind.
#[derive(Default)]
pub struct StubProvider {
    repos: Vec<RepoFixture>,
    failures: HashSet<(Option<String>, StubCall)>,
    latency: Duration,
    notifications: Vec<NotificationThread>,
    scripted: Mutex<VecDeque<ScriptedNotifications>>,
    activity_calls: Mutex<HashMap<String, usize>>,
    queries: Mutex<Vec<NotificationQuery>>,
    mutations: Mutex<Vec<RecordedMutation>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, fixture: RepoFixture) -> Self {
        self.repos.push(fixture);
        self
    }

    /// Fail `call` for one repository.
    pub fn failing(mut self, full_name: &str, call: StubCall) -> Self {
        self.failures.insert((Some(full_name.to_owned()), call));
        self
    }

    /// Fail `call` regardless of repository.
    pub fn failing_everywhere(mut self, call: StubCall) -> Self {
        self.failures.insert((None, call));
        self
    }

    /// Delay every repository-scoped call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Default answer once the scripted queue is drained.
    pub fn with_notifications(mut self, threads: Vec<NotificationThread>) -> Self {
        self.notifications = threads;
        self
    }

    /// Queue an answer for the next `list_notifications` call.
    pub fn script_notifications(
        self,
        delay: Duration,
        result: std::result::Result<Vec<NotificationThread>, String>,
    ) -> Self {
        if let Ok(mut queue) = self.scripted.lock() {
            queue.push_back(ScriptedNotifications { delay, result });
        }
        self
    }

    /// Queries received by `list_notifications`, in call order.
    pub fn notification_queries(&self) -> Vec<NotificationQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<RecordedMutation> {
        self.mutations.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// How many times `commit_activity` was asked for `full_name`.
    pub fn activity_calls(&self, full_name: &str) -> usize {
        self.activity_calls
            .lock()
            .map(|c| c.get(full_name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Highest number of repository-scoped calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_active.load(Ordering::Relaxed)
    }

    fn check(&self, repo: Option<&RepoRef>, call: StubCall) -> Result<()> {
        let scoped = repo.map(RepoRef::full_name);
        if self.failures.contains(&(None, call)) || self.failures.contains(&(scoped.clone(), call))
        {
            bail!(
                "stub: {call:?} failed for {}",
                scoped.as_deref().unwrap_or("<all>")
            );
        }
        Ok(())
    }

    fn fixture(&self, repo: &RepoRef) -> Result<&RepoFixture> {
        self.repos
            .iter()
            .find(|f| f.repo.as_ref() == Some(repo))
            .ok_or_else(|| anyhow!("stub: unknown repository {repo}"))
    }

    async fn simulate_latency(&self) {
        let cur = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_active.fetch_max(cur, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    fn record(&self, mutation: RecordedMutation) {
        if let Ok(mut m) = self.mutations.lock() {
            m.push(mutation);
        }
    }
}

#[async_trait]
impl DataProvider for StubProvider {
    async fn list_repositories(&self, _user: &str, limit: usize) -> Result<Vec<RepoRef>> {
        self.check(None, StubCall::ListRepositories)?;
        Ok(self
            .repos
            .iter()
            .filter_map(|f| f.repo.clone())
            .take(limit)
            .collect())
    }

    async fn commit_activity(&self, repo: &RepoRef) -> Result<CommitActivity> {
        let n = {
            let mut calls = self
                .activity_calls
                .lock()
                .map_err(|_| anyhow!("stub: poisoned"))?;
            let n = calls.entry(repo.full_name()).or_insert(0);
            *n += 1;
            *n
        };
        self.simulate_latency().await;
        self.check(Some(repo), StubCall::CommitActivity)?;
        let fixture = self.fixture(repo)?;
        let answer = fixture
            .activity
            .get(n - 1)
            .or_else(|| fixture.activity.last())
            .cloned()
            .unwrap_or(CommitActivity::Ready(Vec::new()));
        Ok(answer)
    }

    async fn list_commits(&self, repo: &RepoRef, _author: &str) -> Result<Vec<CommitSummary>> {
        self.simulate_latency().await;
        self.check(Some(repo), StubCall::Commits)?;
        Ok(self.fixture(repo)?.commits.clone())
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        _author: &str,
    ) -> Result<Vec<PullRequestSummary>> {
        self.simulate_latency().await;
        self.check(Some(repo), StubCall::PullRequests)?;
        Ok(self.fixture(repo)?.pull_requests.clone())
    }

    async fn list_issues(&self, repo: &RepoRef, _creator: &str) -> Result<Vec<IssueSummary>> {
        self.simulate_latency().await;
        self.check(Some(repo), StubCall::Issues)?;
        Ok(self.fixture(repo)?.issues.clone())
    }

    async fn list_notifications(
        &self,
        query: NotificationQuery,
    ) -> Result<Vec<NotificationThread>> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query);
        }
        let scripted = self.scripted.lock().ok().and_then(|mut s| s.pop_front());
        if let Some(ScriptedNotifications { delay, result }) = scripted {
            tokio::time::sleep(delay).await;
            return result.map_err(|message| anyhow!(message));
        }
        self.check(None, StubCall::Notifications)?;
        Ok(self
            .notifications
            .iter()
            .filter(|n| query.all || n.unread)
            .filter(|n| query.since.is_none_or(|since| n.updated_at > since))
            .cloned()
            .collect())
    }

    async fn mark_thread_read(&self, thread_id: &str) -> Result<()> {
        self.record(RecordedMutation::ThreadRead(thread_id.to_owned()));
        self.check(None, StubCall::Mutations)
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.record(RecordedMutation::AllRead);
        self.check(None, StubCall::Mutations)
    }

    async fn mark_repo_read(&self, repo: &RepoRef) -> Result<()> {
        self.record(RecordedMutation::RepoRead(repo.full_name()));
        self.check(None, StubCall::Mutations)
    }
}
