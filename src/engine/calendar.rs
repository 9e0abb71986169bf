use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::{self, StreamExt};

use crate::types::{
    CommitActivity, ContributionCalendar, ContributionDay, ContributionWeek, RepoRef,
    WeeklyCommitActivity, level_for,
};

use super::interface::DataProvider;
use super::session::SessionContext;

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("year {0} is out of range")]
    InvalidYear(i32),
    #[error("listing repositories for {user}")]
    ListRepositories {
        user: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Fetch commit activity for the bounded repository set and build the
/// calendar for `year`.
pub async fn synthesize_calendar(
    ctx: &SessionContext,
    year: i32,
) -> Result<ContributionCalendar, CalendarError> {
    // Validate before spending any requests.
    CalendarGrid::new(year)?;

    let repos = ctx
        .target_repositories(None)
        .await
        .map_err(|source| CalendarError::ListRepositories {
            user: ctx.login().to_owned(),
            source,
        })?;
    tracing::debug!("calendar: {year} from {} repositories", repos.len());

    let provider = ctx.provider();
    let retry_delay = ctx.settings().stats_retry_delay();
    let series: Vec<Vec<WeeklyCommitActivity>> = stream::iter(repos.iter())
        .map(|repo| fetch_activity(provider, repo, retry_delay))
        .buffer_unordered(ctx.settings().concurrency.max(1))
        .collect()
        .await;

    build_calendar(year, series.iter().flatten(), Utc::now().date_naive())
}

/// Ask for a repository's weekly activity, retrying once if the provider is
/// still generating it. Anything short of data counts as zero.
async fn fetch_activity(
    provider: &dyn DataProvider,
    repo: &RepoRef,
    retry_delay: Duration,
) -> Vec<WeeklyCommitActivity> {
    for attempt in 0..2 {
        match provider.commit_activity(repo).await {
            Ok(CommitActivity::Ready(weeks)) => return weeks,
            Ok(CommitActivity::Pending) if attempt == 0 => {
                tracing::debug!("calendar: stats for {repo} pending, retrying in {retry_delay:?}");
                tokio::time::sleep(retry_delay).await;
            }
            Ok(CommitActivity::Pending) => {
                tracing::warn!("calendar: stats for {repo} still pending, counting as zero");
            }
            Err(e) => {
                tracing::warn!("calendar: commit activity for {repo} failed: {e:#}");
                return Vec::new();
            }
        }
    }
    Vec::new()
}

/// Build a calendar from already-fetched activity.
///
/// `today` bounds the current streak: days after it are not yet part of the
/// user's history.
pub fn build_calendar<'a>(
    year: i32,
    series: impl IntoIterator<Item = &'a WeeklyCommitActivity>,
    today: NaiveDate,
) -> Result<ContributionCalendar, CalendarError> {
    let mut grid = CalendarGrid::new(year)?;
    for week in series {
        grid.accumulate(week);
    }
    Ok(grid.finish(today))
}

/// Year-aligned, Sunday-first grid under construction.
struct CalendarGrid {
    year: i32,
    /// Sunday on or before Jan 1.
    origin: NaiveDate,
    weeks: Vec<ContributionWeek>,
}

impl CalendarGrid {
    fn new(year: i32) -> Result<Self, CalendarError> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(CalendarError::InvalidYear(year))?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(CalendarError::InvalidYear(year))?;
        let lead = u64::from(first.weekday().num_days_from_sunday());
        let origin = first
            .checked_sub_days(chrono::Days::new(lead))
            .ok_or(CalendarError::InvalidYear(year))?;

        let mut weeks = Vec::with_capacity(54);
        for date in first.iter_days().take_while(|d| *d <= last) {
            let offset = date.signed_duration_since(origin).num_days() as usize;
            let (week, slot) = (offset / 7, offset % 7);
            if week == weeks.len() {
                weeks.push(ContributionWeek::default());
            }
            weeks[week].days[slot] = Some(ContributionDay::empty(date));
        }
        Ok(Self {
            year,
            origin,
            weeks,
        })
    }

    fn slot_mut(&mut self, date: NaiveDate) -> Option<&mut ContributionDay> {
        if date.year() != self.year {
            return None;
        }
        let offset = usize::try_from(date.signed_duration_since(self.origin).num_days()).ok()?;
        self.weeks.get_mut(offset / 7)?.days[offset % 7].as_mut()
    }

    fn accumulate(&mut self, week: &WeeklyCommitActivity) {
        for (offset, &count) in week.days.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let Some(date) = week.date_of(offset) else {
                continue;
            };
            if let Some(day) = self.slot_mut(date) {
                day.count = day.count.saturating_add(count);
            }
        }
    }

    fn finish(mut self, today: NaiveDate) -> ContributionCalendar {
        let mut total = 0u64;
        for day in self.weeks.iter_mut().flat_map(|w| w.days.iter_mut().flatten()) {
            day.level = level_for(day.count);
            total += u64::from(day.count);
        }
        let days: Vec<ContributionDay> = self
            .weeks
            .iter()
            .flat_map(ContributionWeek::iter)
            .copied()
            .collect();
        let (current_streak, longest_streak) = streaks(&days, today);
        ContributionCalendar {
            year: self.year,
            weeks: self.weeks,
            total_contributions: total,
            current_streak,
            longest_streak,
        }
    }
}

/// `(current, longest)` runs of non-zero days.
///
/// `days` must be chronological. The current run ends at the latest day not
/// after `as_of` and stops at the first zero-count day going backward.
pub fn streaks(days: &[ContributionDay], as_of: NaiveDate) -> (u32, u32) {
    let mut longest = 0u32;
    let mut run = 0u32;
    for day in days {
        if day.count > 0 {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    let current = days
        .iter()
        .rev()
        .skip_while(|d| d.date > as_of)
        .take_while(|d| d.count > 0)
        .count() as u32;

    (current, longest)
}
