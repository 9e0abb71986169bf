use chrono::{TimeZone, Utc};
use octocrab::Octocrab;
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_contains, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gh_pulse::config::types::GitHubConfig;
use gh_pulse::engine::DataProvider;
use gh_pulse::github::{GitHubClient, GitHubProvider, rate_limit};
use gh_pulse::types::{
    CommitActivity, NotificationQuery, NotificationReason, RepoRef, SubjectType,
};

fn install_crypto() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

fn provider_for(server: &MockServer, config: &GitHubConfig) -> GitHubProvider {
    install_crypto();
    let octocrab = Octocrab::builder()
        .base_uri(server.uri())
        .unwrap()
        .personal_token("test-token".to_owned())
        .build()
        .unwrap();
    GitHubProvider::new(GitHubClient::from_octocrab(octocrab, config))
}

fn repo() -> RepoRef {
    RepoRef::new("octocat", "hello-world")
}

#[tokio::test]
async fn accepted_stats_response_is_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello-world/stats/commit_activity"))
        .respond_with(ResponseTemplate::new(202).set_body_string("{}"))
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    let activity = provider.commit_activity(&repo()).await.unwrap();
    assert_eq!(activity, CommitActivity::Pending);
}

#[tokio::test]
async fn ready_stats_are_decoded_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello-world/stats/commit_activity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "days": [0, 2, 0, 0, 5, 0, 1], "total": 8, "week": 1_709_424_000 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    for _ in 0..2 {
        let CommitActivity::Ready(weeks) = provider.commit_activity(&repo()).await.unwrap() else {
            panic!("expected ready statistics");
        };
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].week_start, 1_709_424_000);
        assert_eq!(weeks[0].days, [0, 2, 0, 0, 5, 0, 1]);
    }
}

#[tokio::test]
async fn commits_follow_pagination() {
    let server = MockServer::start().await;
    let commit = |sha: &str| {
        json!({ "sha": sha, "commit": { "author": { "date": "2024-02-01T10:00:00Z" } } })
    };
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello-world/commits"))
        .and(query_param("author", "octocat"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([commit("a"), commit("b")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello-world/commits"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([commit("c")])))
        .mount(&server)
        .await;

    let config = GitHubConfig {
        per_page: 2,
        ..GitHubConfig::default()
    };
    let provider = provider_for(&server, &config);
    let commits = provider.list_commits(&repo(), "octocat").await.unwrap();
    let shas: Vec<_> = commits.iter().map(|c| c.sha.as_str()).collect();
    assert_eq!(shas, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn page_cap_stops_pagination() {
    let server = MockServer::start().await;
    let commit = json!({ "sha": "x", "commit": { "author": { "date": "2024-02-01T10:00:00Z" } } });
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello-world/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([commit])))
        .expect(3)
        .mount(&server)
        .await;

    let config = GitHubConfig {
        per_page: 1,
        max_pages: 3,
        ..GitHubConfig::default()
    };
    let provider = provider_for(&server, &config);
    let commits = provider.list_commits(&repo(), "octocat").await.unwrap();
    assert_eq!(commits.len(), 3);
}

#[tokio::test]
async fn pull_requests_are_filtered_by_author() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello-world/pulls"))
        .and(query_param("state", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "number": 1, "user": { "login": "OctoCat" }, "created_at": "2024-01-05T00:00:00Z" },
            { "number": 2, "user": { "login": "hubot" }, "created_at": "2024-01-06T00:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    let prs = provider.list_pull_requests(&repo(), "octocat").await.unwrap();
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].number, 1);
}

#[tokio::test]
async fn issues_flag_pull_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello-world/issues"))
        .and(query_param("creator", "octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "number": 7, "user": { "login": "octocat" }, "created_at": "2024-01-05T00:00:00Z" },
            {
                "number": 8,
                "user": { "login": "octocat" },
                "created_at": "2024-01-06T00:00:00Z",
                "pull_request": { "url": "https://api.github.com/repos/octocat/hello-world/pulls/8" }
            }
        ])))
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    let issues = provider.list_issues(&repo(), "octocat").await.unwrap();
    assert_eq!(issues.len(), 2);
    assert!(!issues[0].is_pull_request);
    assert!(issues[1].is_pull_request);
}

#[tokio::test]
async fn repositories_are_listed_by_push_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat/repos"))
        .and(query_param("sort", "pushed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "recent", "owner": { "login": "octocat" } },
            { "name": "older", "owner": { "login": "octocat" } },
            { "name": "oldest", "owner": { "login": "octocat" } }
        ])))
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    let repos = provider.list_repositories("octocat", 2).await.unwrap();
    assert_eq!(
        repos,
        vec![
            RepoRef::new("octocat", "recent"),
            RepoRef::new("octocat", "older")
        ]
    );
}

#[tokio::test]
async fn notifications_are_decoded_at_the_boundary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(query_param("all", "true"))
        .and(query_param_is_missing("since"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/notifications.json"))
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    let threads = provider
        .list_notifications(NotificationQuery {
            since: None,
            all: true,
        })
        .await
        .unwrap();

    assert_eq!(threads.len(), 2);
    let first = &threads[0];
    assert_eq!(first.thread_id, "1001");
    assert_eq!(first.repository, repo());
    assert_eq!(first.subject_type, SubjectType::PullRequest);
    assert_eq!(first.reason, NotificationReason::ReviewRequested);
    assert!(first.unread);
    assert_eq!(threads[1].subject_type, SubjectType::Release);
    assert!(!threads[1].unread);
}

#[tokio::test]
async fn incremental_notification_fetch_sends_since() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(query_param_contains("since", "2024-04-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    let since = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();
    let threads = provider
        .list_notifications(NotificationQuery {
            since: Some(since),
            all: false,
        })
        .await
        .unwrap();
    assert!(threads.is_empty());
}

#[tokio::test]
async fn read_state_mutations_hit_their_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/notifications/threads/1001"))
        .respond_with(ResponseTemplate::new(205))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(205))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/octocat/hello-world/notifications"))
        .respond_with(ResponseTemplate::new(205))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    provider.mark_thread_read("1001").await.unwrap();
    provider.mark_all_read().await.unwrap();
    provider.mark_repo_read(&repo()).await.unwrap();
}

#[tokio::test]
async fn non_numeric_thread_id_is_rejected_locally() {
    let server = MockServer::start().await;
    let provider = provider_for(&server, &GitHubConfig::default());
    assert!(provider.mark_thread_read("not-a-number").await.is_err());
}

#[tokio::test]
async fn rate_limit_errors_are_recognised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello-world/commits"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "API rate limit exceeded for 127.0.0.1.",
            "documentation_url": "https://docs.github.com/rest/overview/resources-in-the-rest-api#rate-limiting"
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, &GitHubConfig::default());
    let err = provider.list_commits(&repo(), "octocat").await.unwrap_err();
    assert!(rate_limit::is_rate_limited(&err), "{err:#}");
    assert!(rate_limit::describe(&err).contains("rate limit"));
}
