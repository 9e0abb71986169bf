use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;

use crate::types::{NotificationQuery, NotificationThread, RepoRef, SyncCursor};

use super::interface::DataProvider;
use super::refresh::RefreshTask;
use super::session::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Include threads already read.
    pub all: bool,
    /// Ignore the cursor and fetch everything.
    pub full_refresh: bool,
}

impl FetchOptions {
    pub fn incremental(all: bool) -> Self {
        Self {
            all,
            full_refresh: false,
        }
    }

    pub fn full(all: bool) -> Self {
        Self {
            all,
            full_refresh: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { threads: usize, unread: usize },
    /// A newer fetch was issued before this one resolved; its result was dropped.
    Superseded,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("notification request timed out after {0:?}")]
    Timeout(Duration),
    #[error("{context}")]
    Provider {
        context: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("notification feed has been torn down")]
    Disposed,
}

/// Which threads a read-state change covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadScope {
    Thread(String),
    All,
    Repository(RepoRef),
}

impl ReadScope {
    fn covers(&self, thread: &NotificationThread) -> bool {
        match self {
            Self::Thread(id) => thread.thread_id == *id,
            Self::All => true,
            Self::Repository(repo) => thread.repository.matches(&repo.owner, &repo.name),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Thread(id) => format!("mark thread {id} read"),
            Self::All => "mark all notifications read".to_owned(),
            Self::Repository(repo) => format!("mark notifications in {repo} read"),
        }
    }
}

struct Inner {
    state: SyncState,
    threads: Vec<NotificationThread>,
    unread_count: usize,
    cursor: SyncCursor,
    latest_token: u64,
    disposed: bool,
    refresh: Option<RefreshTask>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            threads: Vec::new(),
            unread_count: 0,
            cursor: SyncCursor::default(),
            latest_token: 0,
            disposed: false,
            refresh: None,
        }
    }
}

/// The session's notification set, unread count and incremental-fetch cursor.
pub struct NotificationSync {
    provider: Arc<dyn DataProvider>,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl NotificationSync {
    pub fn new(ctx: &SessionContext) -> Arc<Self> {
        Self::with_timeout(
            ctx.provider_handle(),
            ctx.settings().notification_timeout(),
        )
    }

    pub fn with_timeout(provider: Arc<dyn DataProvider>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            provider,
            timeout,
            inner: Mutex::new(Inner::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SyncState {
        self.lock().state.clone()
    }

    pub fn threads(&self) -> Vec<NotificationThread> {
        self.lock().threads.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().unread_count
    }

    pub fn cursor(&self) -> SyncCursor {
        self.lock().cursor
    }

    /// Unread threads per repository full name.
    pub fn unread_by_repository(&self) -> BTreeMap<String, usize> {
        let inner = self.lock();
        let mut counts = BTreeMap::new();
        for t in inner.threads.iter().filter(|t| t.unread) {
            *counts.entry(t.repository.full_name()).or_insert(0) += 1;
        }
        counts
    }

    // -----------------------------------------------------------------------
    // Fetch
    // -----------------------------------------------------------------------

    /// Fetch notifications and, if this is still the newest request when it
    /// resolves, replace the local set with the result.
    ///
    /// An incremental fetch also replaces the set, so threads not updated
    /// since the cursor drop out of it. Use [`FetchOptions::full`] to keep a
    /// complete feed.
    ///
    /// A timeout clears the set so callers never sit on a stale feed with a
    /// spinner; any other failure keeps the previous set. If the returned
    /// future is dropped before it resolves, the state it replaced is restored.
    pub async fn fetch(&self, options: FetchOptions) -> Result<FetchOutcome, SyncError> {
        let (in_flight, query, issued_at) = {
            let mut inner = self.lock();
            if inner.disposed {
                return Err(SyncError::Disposed);
            }
            inner.latest_token += 1;
            let restore = match &inner.state {
                SyncState::Fetching if inner.cursor.last_fetch_time.is_some() => SyncState::Ready,
                SyncState::Fetching => SyncState::Idle,
                other => other.clone(),
            };
            inner.state = SyncState::Fetching;
            let since = if options.full_refresh {
                None
            } else {
                inner.cursor.last_fetch_time
            };
            let in_flight = InFlight {
                sync: self,
                token: inner.latest_token,
                restore: Some(restore),
            };
            let query = NotificationQuery {
                since,
                all: options.all,
            };
            (in_flight, query, Utc::now())
        };
        let token = in_flight.token;
        tracing::debug!(
            "notifications: fetch #{token} (all={}, since={:?})",
            query.all,
            query.since
        );

        let result = tokio::time::timeout(self.timeout, self.provider.list_notifications(query)).await;
        in_flight.settle();

        let mut inner = self.lock();
        if inner.disposed {
            tracing::debug!("notifications: fetch #{token} resolved after teardown, dropped");
            return Err(SyncError::Disposed);
        }
        if inner.latest_token != token {
            tracing::debug!(
                "notifications: fetch #{token} superseded by #{}, dropped",
                inner.latest_token
            );
            return Ok(FetchOutcome::Superseded);
        }

        match result {
            Ok(Ok(threads)) => {
                let unread = threads.iter().filter(|t| t.unread).count();
                let count = threads.len();
                inner.threads = threads;
                inner.unread_count = unread;
                inner.cursor.advance(issued_at);
                inner.state = SyncState::Ready;
                tracing::debug!("notifications: fetch #{token} applied, {count} threads ({unread} unread)");
                Ok(FetchOutcome::Applied {
                    threads: count,
                    unread,
                })
            }
            Ok(Err(e)) => {
                tracing::warn!("notifications: fetch #{token} failed: {e:#}");
                inner.state = SyncState::Error(format!("{e:#}"));
                Err(SyncError::Provider {
                    context: "fetching notifications".to_owned(),
                    source: e,
                })
            }
            Err(_elapsed) => {
                tracing::warn!(
                    "notifications: fetch #{token} timed out after {:?}, clearing feed",
                    self.timeout
                );
                inner.state = SyncState::Error(format!("timed out after {:?}", self.timeout));
                inner.threads.clear();
                inner.unread_count = 0;
                Err(SyncError::Timeout(self.timeout))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Read state
    // -----------------------------------------------------------------------

    pub async fn mark_as_read(&self, thread_id: &str) -> Result<usize, SyncError> {
        self.mark_read(ReadScope::Thread(thread_id.to_owned())).await
    }

    pub async fn mark_all_as_read(&self) -> Result<usize, SyncError> {
        self.mark_read(ReadScope::All).await
    }

    pub async fn mark_repository_as_read(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<usize, SyncError> {
        self.mark_read(ReadScope::Repository(RepoRef::new(owner, name)))
            .await
    }

    /// The one place read state changes.
    ///
    /// Flips matching threads locally, then tells the provider. Returns how
    /// many threads flipped. A remote failure is reported but the local flip
    /// stays; the two may disagree until the next fetch.
    pub async fn mark_read(&self, scope: ReadScope) -> Result<usize, SyncError> {
        let flipped = {
            let mut inner = self.lock();
            if inner.disposed {
                return Err(SyncError::Disposed);
            }
            let mut flipped = 0;
            for thread in inner.threads.iter_mut() {
                if thread.unread && scope.covers(thread) {
                    thread.unread = false;
                    flipped += 1;
                }
            }
            inner.unread_count = inner.unread_count.saturating_sub(flipped);
            flipped
        };
        tracing::debug!("notifications: {} ({flipped} flipped locally)", scope.describe());

        let remote = match &scope {
            ReadScope::Thread(id) => self.provider.mark_thread_read(id).await,
            ReadScope::All => self.provider.mark_all_read().await,
            ReadScope::Repository(repo) => self.provider.mark_repo_read(repo).await,
        };
        if let Err(e) = remote {
            tracing::warn!(
                "notifications: {} failed remotely, local state kept: {e:#}",
                scope.describe()
            );
            return Err(SyncError::Provider {
                context: scope.describe(),
                source: e,
            });
        }
        Ok(flipped)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Re-fetch every `interval` until torn down. Replaces any refresh task
    /// already running.
    pub fn start_background_refresh(self: &Arc<Self>, interval: Duration, options: FetchOptions) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = RefreshTask::spawn(interval, move || {
            let sync = weak.upgrade()?;
            Some(
                async move {
                    match sync.fetch(options).await {
                        Ok(outcome) => tracing::debug!("notifications: refresh {outcome:?}"),
                        Err(e) => tracing::debug!("notifications: refresh failed: {e}"),
                    }
                }
                .boxed(),
            )
        });

        let previous = {
            let mut inner = self.lock();
            if inner.disposed {
                return;
            }
            inner.refresh.replace(task)
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
        tracing::debug!("notifications: background refresh every {interval:?}");
    }

    pub fn stop_background_refresh(&self) {
        let task = self.lock().refresh.take();
        if let Some(task) = task {
            task.cancel();
        }
    }

    /// Cancel the refresh task, forget all state and refuse further writes.
    pub fn teardown(&self) {
        let task = {
            let mut inner = self.lock();
            inner.disposed = true;
            inner.state = SyncState::Idle;
            inner.threads.clear();
            inner.unread_count = 0;
            inner.cursor = SyncCursor::default();
            inner.refresh.take()
        };
        if let Some(task) = task {
            task.cancel();
        }
        tracing::debug!("notifications: torn down");
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

/// Puts back the pre-fetch state when a fetch is dropped mid-request, as
/// happens when its refresh task is stopped or replaced.
struct InFlight<'a> {
    sync: &'a NotificationSync,
    token: u64,
    restore: Option<SyncState>,
}

impl InFlight<'_> {
    fn settle(mut self) {
        self.restore = None;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Some(restore) = self.restore.take() else {
            return;
        };
        let mut inner = self.sync.lock();
        if !inner.disposed && inner.latest_token == self.token && inner.state == SyncState::Fetching
        {
            tracing::debug!("notifications: fetch #{} abandoned, state restored", self.token);
            inner.state = restore;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub::{RecordedMutation, StubCall, StubProvider};
    use crate::types::{NotificationReason, SubjectType};
    use chrono::TimeZone;

    fn thread(id: &str, repo: &str, unread: bool) -> NotificationThread {
        NotificationThread {
            id: id.to_owned(),
            thread_id: id.to_owned(),
            repository: RepoRef::from_full_name(repo).unwrap(),
            subject_type: SubjectType::Issue,
            subject_title: format!("thread {id}"),
            reason: NotificationReason::Mention,
            unread,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    async fn loaded(stub: StubProvider) -> (Arc<StubProvider>, Arc<NotificationSync>) {
        let stub = Arc::new(stub);
        let sync = NotificationSync::with_timeout(stub.clone(), Duration::from_secs(10));
        sync.fetch(FetchOptions::full(true)).await.unwrap();
        (stub, sync)
    }

    #[tokio::test]
    async fn starts_idle_and_empty() {
        let sync = NotificationSync::with_timeout(Arc::new(StubProvider::new()), Duration::from_secs(1));
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(sync.unread_count(), 0);
        assert!(sync.cursor().last_fetch_time.is_none());
    }

    #[tokio::test]
    async fn mark_as_read_is_idempotent() {
        let stub = StubProvider::new().with_notifications(vec![
            thread("1", "a/one", true),
            thread("2", "a/one", true),
        ]);
        let (_stub, sync) = loaded(stub).await;
        assert_eq!(sync.unread_count(), 2);

        assert_eq!(sync.mark_as_read("1").await.unwrap(), 1);
        assert_eq!(sync.unread_count(), 1);
        assert_eq!(sync.mark_as_read("1").await.unwrap(), 0);
        assert_eq!(sync.unread_count(), 1);
    }

    #[tokio::test]
    async fn repository_scope_only_touches_that_repo() {
        let stub = StubProvider::new().with_notifications(vec![
            thread("1", "a/one", true),
            thread("2", "a/two", true),
            thread("3", "A/One", true),
        ]);
        let (stub, sync) = loaded(stub).await;
        assert_eq!(sync.mark_repository_as_read("a", "one").await.unwrap(), 2);
        assert_eq!(sync.unread_count(), 1);
        let unread = sync.unread_by_repository();
        assert_eq!(unread.get("a/two"), Some(&1));
        assert_eq!(unread.len(), 1);
        assert_eq!(
            stub.mutations(),
            vec![RecordedMutation::RepoRead("a/one".into())]
        );
    }

    #[tokio::test]
    async fn failed_mutation_keeps_optimistic_state() {
        let stub = StubProvider::new()
            .with_notifications(vec![thread("1", "a/one", true)])
            .failing_everywhere(StubCall::Mutations);
        let (_stub, sync) = loaded(stub).await;
        let err = sync.mark_all_as_read().await.unwrap_err();
        assert!(matches!(err, SyncError::Provider { .. }));
        assert_eq!(sync.unread_count(), 0);
        assert!(sync.threads().iter().all(|t| !t.unread));
    }

    #[tokio::test]
    async fn provider_error_keeps_previous_set() {
        let stub = StubProvider::new()
            .script_notifications(Duration::ZERO, Ok(vec![thread("1", "a/one", true)]))
            .script_notifications(Duration::ZERO, Err("502 bad gateway".into()));
        let stub = Arc::new(stub);
        let sync = NotificationSync::with_timeout(stub, Duration::from_secs(10));
        sync.fetch(FetchOptions::default()).await.unwrap();
        let cursor = sync.cursor();

        let err = sync.fetch(FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, SyncError::Provider { .. }));
        assert!(matches!(sync.state(), SyncState::Error(_)));
        assert_eq!(sync.threads().len(), 1);
        assert_eq!(sync.cursor(), cursor);
    }

    #[tokio::test]
    async fn teardown_refuses_further_work() {
        let stub = StubProvider::new().with_notifications(vec![thread("1", "a/one", true)]);
        let (_stub, sync) = loaded(stub).await;
        sync.teardown();
        assert!(sync.is_disposed());
        assert!(sync.threads().is_empty());
        assert!(sync.cursor().last_fetch_time.is_none());
        assert!(matches!(
            sync.fetch(FetchOptions::default()).await,
            Err(SyncError::Disposed)
        ));
        assert!(matches!(
            sync.mark_as_read("1").await,
            Err(SyncError::Disposed)
        ));
    }
}
