use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};

use gh_pulse::config::loader;
use gh_pulse::config::types::AppConfig;
use gh_pulse::engine::{FetchOptions, Session, SessionContext, SyncState};
use gh_pulse::github::{GitHubProvider, rate_limit};
use gh_pulse::store::PreferenceStore;
use gh_pulse::types::{AggregateStats, ContributionCalendar, NotificationThread, RepoRef};
use gh_pulse::util::{format_estimated, format_relative_time, render_heatmap};

#[derive(Parser)]
#[command(
    name = "gh-pulse",
    version,
    about = "Contribution calendars, cross-repo stats and notifications from GitHub"
)]
struct Cli {
    /// Path to config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging to debug.log.
    #[arg(long, global = true)]
    debug: bool,

    /// Act as this login instead of the token's owner.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Yearly contribution calendar built from commit statistics.
    Calendar {
        /// Calendar year (defaults to the saved preference, then the current year).
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        json: bool,
    },
    /// Commit / pull-request / issue totals across repositories.
    Stats {
        /// Repository as owner/name; repeatable. Defaults to recently pushed repos.
        #[arg(long = "repo", value_name = "OWNER/NAME")]
        repos: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// List notification threads.
    Notifications {
        /// Include threads already read.
        #[arg(long)]
        all: bool,
        /// Ignore the sync cursor.
        #[arg(long)]
        full: bool,
    },
    /// Keep the notification feed fresh until Ctrl-C.
    Watch {
        #[arg(long)]
        all: bool,
    },
    /// Show or edit the saved search history.
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Record a search.
    Add { query: String },
    /// Forget every saved search.
    Clear,
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        let msg = format!("{info}\n\n{backtrace}");
        let _ = std::fs::write("panic.log", &msg);
        eprintln!("{msg}");
    }));

    let cli = Cli::parse();

    if cli.debug {
        let file = std::fs::File::create("debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
    }

    let config = loader::load_config(cli.config.as_deref())?;
    let store = PreferenceStore::from_config(&config.store)?;

    // History never touches the network.
    if let Commands::History { action } = &cli.command {
        return run_history(&store, action.as_ref());
    }

    // Install the rustls CryptoProvider before any TLS client is constructed.
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls CryptoProvider already installed");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async {
        match run(cli, config, &store).await {
            Ok(()) => Ok(()),
            Err(e) if rate_limit::is_rate_limited(&e) => bail!(rate_limit::describe(&e)),
            Err(e) => Err(e),
        }
    })
}

async fn run(cli: Cli, config: AppConfig, store: &PreferenceStore) -> Result<()> {
    let prefs = store.dashboard()?;

    let provider = Arc::new(GitHubProvider::connect(&config.github)?);
    let login = match cli.user {
        Some(login) => login,
        None => provider.current_login().await?,
    };

    let mut settings = config.engine.clone();
    if let Some(limit) = prefs.repo_limit {
        settings.repo_limit = limit;
    }
    let session = Session::start(SessionContext::new(provider, login, settings));
    tracing::info!("gh-pulse starting");

    let result: Result<()> = async {
        match cli.command {
            Commands::Calendar { year, json } => {
                let year = year
                    .or(prefs.default_year)
                    .unwrap_or_else(|| Utc::now().year());
                let calendar = session.calendar(year).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&calendar)?);
                } else {
                    print_calendar(&calendar);
                }
                Ok(())
            }
            Commands::Stats { repos, json } => {
                let explicit = parse_repos(&repos)?;
                let stats = session.aggregate(explicit).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    print_stats(&stats);
                }
                Ok(())
            }
            Commands::Notifications { all, full } => {
                let all = all || prefs.show_all_notifications;
                let sync = session.notifications();
                sync.fetch(FetchOptions {
                    all,
                    full_refresh: full,
                })
                .await?;
                print_notifications(&sync.threads(), sync.unread_count());
                Ok(())
            }
            Commands::Watch { all } => {
                let all = all || prefs.show_all_notifications;
                watch(&session, all).await
            }
            Commands::History { .. } => Ok(()),
        }
    }
    .await;

    session.sign_out();
    result
}

fn run_history(store: &PreferenceStore, action: Option<&HistoryAction>) -> Result<()> {
    match action {
        Some(HistoryAction::Add { query }) => store.add_search(query)?,
        Some(HistoryAction::Clear) => store.clear_search_history()?,
        None => {
            let now = Utc::now();
            for entry in store.search_history()? {
                println!(
                    "{:>4}  {}",
                    format_relative_time(&entry.timestamp, now),
                    entry.query
                );
            }
        }
    }
    Ok(())
}

fn parse_repos(args: &[String]) -> Result<Option<Vec<RepoRef>>> {
    if args.is_empty() {
        return Ok(None);
    }
    args.iter()
        .map(|s| {
            RepoRef::from_full_name(s)
                .with_context(|| format!("invalid repository {s:?}, expected owner/name"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

async fn watch(session: &Session, all: bool) -> Result<()> {
    let sync = session.notifications();
    let interval = session.context().settings().notification_refresh_interval();

    if let Err(e) = sync.fetch(FetchOptions::full(all)).await {
        eprintln!("initial fetch failed: {e}");
    }
    print_notifications(&sync.threads(), sync.unread_count());
    sync.start_background_refresh(interval, FetchOptions::full(all));
    println!("refreshing every {}s, Ctrl-C to stop", interval.as_secs());

    let mut poll = tokio::time::interval(Duration::from_secs(1));
    let mut last_seen = (sync.unread_count(), sync.cursor());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = poll.tick() => {
                let seen = (sync.unread_count(), sync.cursor());
                if seen == last_seen {
                    continue;
                }
                last_seen = seen;
                match sync.state() {
                    SyncState::Error(message) => eprintln!("refresh failed: {message}"),
                    _ => print_notifications(&sync.threads(), sync.unread_count()),
                }
            }
        }
    }
    sync.stop_background_refresh();
    Ok(())
}

fn print_calendar(calendar: &ContributionCalendar) {
    print!("{}", render_heatmap(calendar));
    println!();
    println!(
        "{} contributions in {} ({} active days)",
        calendar.total_contributions,
        calendar.year,
        calendar.active_days()
    );
    println!(
        "current streak {} days, longest {} days",
        calendar.current_streak, calendar.longest_streak
    );
}

fn print_stats(stats: &AggregateStats) {
    println!(
        "{} repositories: {} commits, {} pull requests, {} issues, {} reviews",
        stats.repository_count,
        stats.commits,
        stats.pull_requests,
        stats.issues,
        format_estimated(stats.reviews)
    );

    if !stats.by_repo.is_empty() {
        println!();
        println!("{:<40} {:>8} {:>6} {:>7}", "repository", "commits", "prs", "issues");
        for (repo, t) in &stats.by_repo {
            println!(
                "{repo:<40} {:>8} {:>6} {:>7}",
                t.commits, t.pull_requests, t.issues
            );
        }
    }

    if !stats.by_month.is_empty() {
        println!();
        println!("{:<8} {:>8} {:>6} {:>7}", "month", "commits", "prs", "issues");
        for (month, t) in &stats.by_month {
            println!(
                "{month:<8} {:>8} {:>6} {:>7}",
                t.commits, t.pull_requests, t.issues
            );
        }
    }

    if stats.is_partial() {
        println!();
        println!("partial results, {} requests failed:", stats.failures.len());
        for f in &stats.failures {
            println!("  {} {}: {}", f.repo, f.field.as_str(), f.message);
        }
    }
}

fn print_notifications(threads: &[NotificationThread], unread: usize) {
    let now = Utc::now();
    println!("{unread} unread of {}", threads.len());
    for t in threads {
        println!(
            "{} {:>4}  {:<30} {:<13} {} ({})",
            if t.unread { '●' } else { ' ' },
            format_relative_time(&t.updated_at, now),
            t.repository.full_name(),
            t.subject_type.as_str(),
            t.subject_title,
            t.reason.as_str()
        );
    }
}
