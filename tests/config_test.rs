use std::path::Path;
use std::time::Duration;

use gh_pulse::config::loader::load_config;
use gh_pulse::config::types::AppConfig;

#[test]
fn parse_empty_config_uses_defaults() {
    let config: AppConfig = toml::from_str("").unwrap();
    assert_eq!(config.github.host, "github.com");
    assert_eq!(config.github.refetch_interval_minutes, 10);
    assert_eq!(config.github.max_pages, 10);
    assert_eq!(config.github.per_page, 100);
    assert_eq!(config.engine.repo_limit, 10);
    assert_eq!(config.engine.concurrency, 4);
    assert_eq!(config.engine.stats_retry_delay_secs, 3);
    assert_eq!(config.engine.notification_timeout_secs, 10);
    assert_eq!(config.engine.notification_refresh_minutes, 5);
    assert!(config.store.path.is_none());
}

#[test]
fn partial_section_keeps_other_defaults() {
    let toml = r#"
[engine]
concurrency = 2
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.engine.concurrency, 2);
    assert_eq!(config.engine.repo_limit, 10);
    assert_eq!(config.github.host, "github.com");
}

#[test]
fn engine_durations() {
    let toml = r#"
[engine]
stats_retry_delay_secs = 7
notification_timeout_secs = 0
notification_refresh_minutes = 0
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.engine.stats_retry_delay(), Duration::from_secs(7));
    // Zero would disable the guard or spin; both clamp to a floor.
    assert_eq!(config.engine.notification_timeout(), Duration::from_secs(1));
    assert_eq!(
        config.engine.notification_refresh_interval(),
        Duration::from_secs(60)
    );
}

#[test]
fn load_global_fixture() {
    let path = Path::new("tests/fixtures/global_config.toml");
    let config = load_config(Some(path)).unwrap();
    assert_eq!(config.github.host, "github.example.com");
    assert_eq!(config.github.refetch_interval_minutes, 15);
    assert_eq!(config.engine.repo_limit, 25);
    assert_eq!(config.engine.concurrency, 8);
    assert_eq!(
        config.store.path.as_deref(),
        Some(Path::new("/tmp/gh-pulse-test/state.json"))
    );
}

#[test]
fn invalid_toml_produces_error() {
    let path = Path::new("tests/fixtures/invalid_toml.toml");
    let result = load_config(Some(path));
    assert!(result.is_err());
    let err_msg = result.unwrap_err().to_string();
    // Error should reference the file path.
    assert!(
        err_msg.contains("invalid_toml.toml"),
        "error should mention file: {err_msg}"
    );
}

#[test]
fn unknown_keys_in_fixture_tolerated() {
    let path = Path::new("tests/fixtures/unknown_keys_config.toml");
    let config = load_config(Some(path)).unwrap();
    assert_eq!(config.engine.repo_limit, 5);
}

#[test]
fn missing_config_file_produces_error() {
    let path = Path::new("tests/fixtures/nonexistent.toml");
    let result = load_config(Some(path));
    assert!(result.is_err());
}

#[test]
fn config_written_to_tempdir_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[github]\nmax_pages = 2\n").unwrap();
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.github.max_pages, 2);
}
