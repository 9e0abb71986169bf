use anyhow::Result;
use futures::stream::{self, StreamExt};

use crate::types::{
    AggregateStats, CommitSummary, EstimatedCount, FieldFailure, IssueSummary, MonthTotals,
    PullRequestSummary, RepoRef, RepoTotals, StatField, month_key,
};

use super::interface::DataProvider;
use super::session::SessionContext;

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("listing repositories for {user}")]
    ListRepositories {
        user: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("no repository could be reached ({failures} requests failed)")]
    NothingReachable { failures: usize },
}

/// Raw per-repository results, before merging.
struct RepoOutcome {
    index: usize,
    repo: RepoRef,
    commits: Result<Vec<CommitSummary>>,
    pull_requests: Result<Vec<PullRequestSummary>>,
    issues: Result<Vec<IssueSummary>>,
}

/// Aggregate activity for the session user.
///
/// `repos` overrides the repository listing; either way the set is capped to
/// the configured `repo_limit`.
pub async fn aggregate_stats(
    ctx: &SessionContext,
    repos: Option<Vec<RepoRef>>,
) -> Result<AggregateStats, AggregateError> {
    let repos = ctx
        .target_repositories(repos)
        .await
        .map_err(|source| AggregateError::ListRepositories {
            user: ctx.login().to_owned(),
            source,
        })?;
    tracing::debug!(
        "aggregate: {} repositories for {} (concurrency {})",
        repos.len(),
        ctx.login(),
        ctx.settings().concurrency
    );
    if repos.is_empty() {
        return Ok(AggregateStats::default());
    }

    let provider = ctx.provider();
    let user = ctx.login();
    let mut outcomes: Vec<RepoOutcome> = stream::iter(repos.into_iter().enumerate())
        .map(|(index, repo)| fetch_repo(provider, index, repo, user))
        .buffer_unordered(ctx.settings().concurrency.max(1))
        .collect()
        .await;
    // Completion order is arbitrary; keep `by_repo` in recency order.
    outcomes.sort_by_key(|o| o.index);

    merge(outcomes)
}

async fn fetch_repo(
    provider: &dyn DataProvider,
    index: usize,
    repo: RepoRef,
    user: &str,
) -> RepoOutcome {
    let (commits, pull_requests, issues) = tokio::join!(
        provider.list_commits(&repo, user),
        provider.list_pull_requests(&repo, user),
        provider.list_issues(&repo, user),
    );
    RepoOutcome {
        index,
        repo,
        commits,
        pull_requests,
        issues,
    }
}

fn merge(outcomes: Vec<RepoOutcome>) -> Result<AggregateStats, AggregateError> {
    let mut stats = AggregateStats::default();

    for outcome in outcomes {
        let full_name = outcome.repo.full_name();
        let mut totals = RepoTotals::default();
        let mut reached = false;

        match outcome.commits {
            Ok(commits) => {
                reached = true;
                totals.commits = commits.len() as u64;
                for c in &commits {
                    bucket(&mut stats, &month_key(&c.authored_at)).commits += 1;
                }
            }
            Err(e) => record_failure(&mut stats, &full_name, StatField::Commits, &e),
        }

        match outcome.pull_requests {
            Ok(prs) => {
                reached = true;
                totals.pull_requests = prs.len() as u64;
                totals.reviews = EstimatedCount::reviews_from_pull_requests(totals.pull_requests);
                for pr in &prs {
                    bucket(&mut stats, &month_key(&pr.created_at)).pull_requests += 1;
                }
            }
            Err(e) => record_failure(&mut stats, &full_name, StatField::PullRequests, &e),
        }

        match outcome.issues {
            Ok(issues) => {
                reached = true;
                let issues: Vec<_> = issues.into_iter().filter(|i| !i.is_pull_request).collect();
                totals.issues = issues.len() as u64;
                for issue in &issues {
                    bucket(&mut stats, &month_key(&issue.created_at)).issues += 1;
                }
            }
            Err(e) => record_failure(&mut stats, &full_name, StatField::Issues, &e),
        }

        if reached {
            stats.by_repo.insert(full_name, totals);
        }
    }

    if stats.by_repo.is_empty() && !stats.failures.is_empty() {
        return Err(AggregateError::NothingReachable {
            failures: stats.failures.len(),
        });
    }

    stats.recompute_totals();
    tracing::debug!(
        "aggregate: {} repos, commits={} prs={} issues={} ({} failed fields)",
        stats.repository_count,
        stats.commits,
        stats.pull_requests,
        stats.issues,
        stats.failures.len()
    );
    Ok(stats)
}

fn bucket<'a>(stats: &'a mut AggregateStats, key: &str) -> &'a mut MonthTotals {
    stats.by_month.entry(key.to_owned()).or_default()
}

fn record_failure(stats: &mut AggregateStats, repo: &str, field: StatField, error: &anyhow::Error) {
    tracing::warn!(
        "aggregate: {} for {repo} unavailable, excluding: {error:#}",
        field.as_str()
    );
    stats.failures.push(FieldFailure {
        repo: repo.to_owned(),
        field,
        message: format!("{error:#}"),
    });
}
