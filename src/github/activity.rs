use anyhow::{Context, Result};
use http::StatusCode;
use serde::Deserialize;

use crate::github::client::GitHubClient;
use crate::types::{
    CommitActivity, CommitSummary, IssueSummary, PullRequestSummary, RepoRef,
    WeeklyCommitActivity,
};

// ---------------------------------------------------------------------------
// Raw API response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawRepository {
    name: String,
    owner: RawUser,
}

#[derive(Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Deserialize)]
struct RawWeek {
    week: i64,
    days: [u32; 7],
}

#[derive(Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

#[derive(Deserialize)]
struct RawCommitDetail {
    #[serde(default)]
    author: Option<RawSignature>,
    #[serde(default)]
    committer: Option<RawSignature>,
}

#[derive(Deserialize)]
struct RawSignature {
    #[serde(default)]
    date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Deserialize)]
struct RawPullRequest {
    number: u64,
    #[serde(default)]
    user: Option<RawUser>,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize)]
struct RawIssue {
    number: u64,
    #[serde(default)]
    user: Option<RawUser>,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn commit_into_domain(raw: RawCommit) -> Option<CommitSummary> {
    let date = raw
        .commit
        .author
        .and_then(|s| s.date)
        .or_else(|| raw.commit.committer.and_then(|s| s.date))?;
    Some(CommitSummary {
        sha: raw.sha,
        authored_at: date,
    })
}

/// Decode the stats endpoint body. GitHub sometimes answers 200 with an empty
/// body for repositories without history.
fn parse_commit_activity(body: &str) -> Result<Vec<WeeklyCommitActivity>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let weeks: Vec<RawWeek> =
        serde_json::from_str(body).context("decoding commit activity response")?;
    Ok(weeks
        .into_iter()
        .map(|w| WeeklyCommitActivity {
            week_start: w.week,
            days: w.days,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Repositories owned by `user`, most recently pushed first.
pub async fn fetch_repositories(
    client: &GitHubClient,
    user: &str,
    limit: usize,
) -> Result<Vec<RepoRef>> {
    let key = format!("repos:{user}:{limit}");
    client
        .cached(key, || async {
            let route = format!("/users/{user}/repos");
            let raw: Vec<RawRepository> = client
                .get_paged(&route, &[("sort", "pushed"), ("direction", "desc")], limit)
                .await
                .with_context(|| format!("listing repositories for {user}"))?;
            Ok(raw
                .into_iter()
                .map(|r| RepoRef::new(r.owner.login, r.name))
                .collect())
        })
        .await
}

/// `GET /repos/{owner}/{repo}/stats/commit_activity`.
///
/// GitHub computes these statistics lazily and answers `202 Accepted` with an
/// empty body until they are ready; that maps to [`CommitActivity::Pending`].
/// Only ready answers are cached.
pub async fn fetch_commit_activity(client: &GitHubClient, repo: &RepoRef) -> Result<CommitActivity> {
    let key = format!("activity:{repo}");
    if let Some(weeks) = client.get_cached::<Vec<WeeklyCommitActivity>>(&key).await {
        return Ok(CommitActivity::Ready(weeks));
    }

    let route = format!("/repos/{}/{}/stats/commit_activity", repo.owner, repo.name);
    let uri = http::Uri::builder()
        .path_and_query(route)
        .build()
        .context("building URI for commit activity")?;
    let octocrab = client.octocrab();
    let response = octocrab
        ._get(uri)
        .await
        .with_context(|| format!("fetching commit activity for {repo}"))?;

    if response.status() == StatusCode::ACCEPTED {
        tracing::debug!("commit activity for {repo} is still being computed");
        return Ok(CommitActivity::Pending);
    }

    let response = octocrab::map_github_error(response)
        .await
        .with_context(|| format!("commit activity API error for {repo}"))?;
    let body = octocrab
        .body_to_string(response)
        .await
        .context("reading commit activity body")?;
    let weeks = parse_commit_activity(&body)?;

    client.insert_cached(key, &weeks).await;
    Ok(CommitActivity::Ready(weeks))
}

pub async fn fetch_commits(
    client: &GitHubClient,
    repo: &RepoRef,
    author: &str,
) -> Result<Vec<CommitSummary>> {
    let key = format!("commits:{repo}:{author}");
    client
        .cached(key, || async {
            let route = format!("/repos/{}/{}/commits", repo.owner, repo.name);
            let raw: Vec<RawCommit> = client
                .get_paged(&route, &[("author", author)], usize::MAX)
                .await
                .with_context(|| format!("listing commits in {repo}"))?;
            Ok(raw.into_iter().filter_map(commit_into_domain).collect())
        })
        .await
}

/// Pull requests in `repo` opened by `author`.
///
/// The pulls endpoint has no author filter, so every state is listed and the
/// author is matched here.
pub async fn fetch_pull_requests(
    client: &GitHubClient,
    repo: &RepoRef,
    author: &str,
) -> Result<Vec<PullRequestSummary>> {
    let key = format!("pulls:{repo}:{author}");
    client
        .cached(key, || async {
            let route = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
            let raw: Vec<RawPullRequest> = client
                .get_paged(&route, &[("state", "all")], usize::MAX)
                .await
                .with_context(|| format!("listing pull requests in {repo}"))?;
            Ok(raw
                .into_iter()
                .filter(|pr| {
                    pr.user
                        .as_ref()
                        .is_some_and(|u| u.login.eq_ignore_ascii_case(author))
                })
                .map(|pr| PullRequestSummary {
                    number: pr.number,
                    author: pr.user.map(|u| u.login),
                    created_at: pr.created_at,
                })
                .collect())
        })
        .await
}

pub async fn fetch_issues(
    client: &GitHubClient,
    repo: &RepoRef,
    creator: &str,
) -> Result<Vec<IssueSummary>> {
    let key = format!("issues:{repo}:{creator}");
    client
        .cached(key, || async {
            let route = format!("/repos/{}/{}/issues", repo.owner, repo.name);
            let raw: Vec<RawIssue> = client
                .get_paged(&route, &[("state", "all"), ("creator", creator)], usize::MAX)
                .await
                .with_context(|| format!("listing issues in {repo}"))?;
            Ok(raw
                .into_iter()
                .map(|i| IssueSummary {
                    number: i.number,
                    author: i.user.map(|u| u.login),
                    created_at: i.created_at,
                    is_pull_request: i.pull_request.is_some(),
                })
                .collect())
        })
        .await
}
