use anyhow::{Context, Result};
use chrono::Utc;
use octocrab::models::NotificationId;
use octocrab::models::activity::Notification;

use crate::github::client::GitHubClient;
use crate::types::{
    NotificationQuery, NotificationReason, NotificationThread, RepoRef, SubjectType,
};

fn parse_reason(s: &str) -> NotificationReason {
    match s {
        "subscribed" => NotificationReason::Subscribed,
        "review_requested" => NotificationReason::ReviewRequested,
        "mention" => NotificationReason::Mention,
        "author" => NotificationReason::Author,
        "comment" => NotificationReason::Comment,
        "assign" => NotificationReason::Assign,
        "state_change" => NotificationReason::StateChange,
        "ci_activity" => NotificationReason::CiActivity,
        "team_mention" => NotificationReason::TeamMention,
        "security_alert" => NotificationReason::SecurityAlert,
        _ => NotificationReason::Unknown,
    }
}

fn parse_subject_type(s: &str) -> SubjectType {
    match s {
        "PullRequest" => SubjectType::PullRequest,
        "Issue" => SubjectType::Issue,
        "Release" => SubjectType::Release,
        "Discussion" => SubjectType::Discussion,
        _ => SubjectType::Other,
    }
}

/// Decode an octocrab notification once, at the boundary.
fn into_domain(n: Notification) -> NotificationThread {
    let owner = n
        .repository
        .owner
        .as_ref()
        .map_or_else(String::new, |o| o.login.clone());
    let id = n.id.0.to_string();

    NotificationThread {
        thread_id: id.clone(),
        id,
        repository: RepoRef::new(owner, n.repository.name.clone()),
        subject_type: parse_subject_type(&n.subject.r#type),
        subject_title: n.subject.title,
        reason: parse_reason(&n.reason),
        unread: n.unread,
        updated_at: n.updated_at,
    }
}

/// `GET /notifications`, following `next` links up to the page cap.
pub async fn fetch_notifications(
    client: &GitHubClient,
    query: NotificationQuery,
) -> Result<Vec<NotificationThread>> {
    let octocrab = client.octocrab();
    let notifications = octocrab.activity().notifications();
    let mut builder = notifications
        .list()
        .all(query.all)
        .per_page(client.per_page());
    if let Some(since) = query.since {
        builder = builder.since(since);
    }
    let mut page = builder.send().await.context("fetching notifications")?;

    let mut threads: Vec<NotificationThread> = Vec::new();
    let mut pages = 1;
    loop {
        let next = page.next.clone();
        threads.extend(page.items.into_iter().map(into_domain));
        if pages >= client.max_pages() {
            break;
        }
        match octocrab
            .get_page::<Notification>(&next)
            .await
            .context("fetching next notifications page")?
        {
            Some(p) => {
                page = p;
                pages += 1;
            }
            None => break,
        }
    }

    tracing::debug!(
        "fetched {} notifications over {pages} page(s) (all={}, since={:?})",
        threads.len(),
        query.all,
        query.since
    );
    Ok(threads)
}

/// `PATCH /notifications/threads/{id}`.
pub async fn mark_as_read(client: &GitHubClient, thread_id: &str) -> Result<()> {
    let id: u64 = thread_id.parse().context("invalid notification id")?;
    client
        .octocrab()
        .activity()
        .notifications()
        .mark_as_read(NotificationId(id))
        .await
        .context("marking notification as read")?;
    Ok(())
}

/// `PUT /notifications`.
pub async fn mark_all_as_read(client: &GitHubClient) -> Result<()> {
    client
        .octocrab()
        .activity()
        .notifications()
        .mark_all_as_read(Utc::now())
        .await
        .context("marking all notifications as read")?;
    Ok(())
}

/// `PUT /repos/{owner}/{repo}/notifications`.
///
/// octocrab has no wrapper for the per-repository variant, so the raw `_put`
/// is used.
pub async fn mark_repo_as_read(client: &GitHubClient, repo: &RepoRef) -> Result<()> {
    let route = format!("/repos/{}/{}/notifications", repo.owner, repo.name);
    let uri = http::Uri::builder()
        .path_and_query(route)
        .build()
        .context("building URI for mark-repo-read")?;
    let body = serde_json::json!({ "last_read_at": Utc::now() });
    let response = client
        .octocrab()
        ._put(uri, Some(&body))
        .await
        .with_context(|| format!("marking notifications in {repo} as read"))?;
    octocrab::map_github_error(response)
        .await
        .map(drop)
        .context("mark-repo-read API error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reason_values() {
        assert_eq!(parse_reason("subscribed"), NotificationReason::Subscribed);
        assert_eq!(
            parse_reason("review_requested"),
            NotificationReason::ReviewRequested
        );
        assert_eq!(parse_reason("mention"), NotificationReason::Mention);
        assert_eq!(parse_reason("assign"), NotificationReason::Assign);
        assert_eq!(parse_reason("ci_activity"), NotificationReason::CiActivity);
        assert_eq!(
            parse_reason("security_alert"),
            NotificationReason::SecurityAlert
        );
        assert_eq!(parse_reason("approval_requested"), NotificationReason::Unknown);
    }

    #[test]
    fn parse_subject_type_values() {
        assert_eq!(parse_subject_type("PullRequest"), SubjectType::PullRequest);
        assert_eq!(parse_subject_type("Issue"), SubjectType::Issue);
        assert_eq!(parse_subject_type("Release"), SubjectType::Release);
        assert_eq!(parse_subject_type("Discussion"), SubjectType::Discussion);
        assert_eq!(parse_subject_type("CheckSuite"), SubjectType::Other);
    }
}
