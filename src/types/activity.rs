use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Weekly commit activity (repository statistics)
// ---------------------------------------------------------------------------

/// One bucket of the provider's weekly commit-activity series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyCommitActivity {
    /// Start of the week as Unix epoch seconds (Sunday 00:00 UTC).
    pub week_start: i64,
    /// Commit counts, Sunday first.
    pub days: [u32; 7],
}

impl WeeklyCommitActivity {
    /// Calendar date of the given day offset (0 = Sunday) within this week.
    ///
    /// Returns `None` if `week_start` is not a representable timestamp.
    pub fn date_of(&self, offset: usize) -> Option<NaiveDate> {
        let start = DateTime::<Utc>::from_timestamp(self.week_start, 0)?.date_naive();
        start.checked_add_days(chrono::Days::new(offset as u64))
    }
}

/// Result of asking the provider for a repository's commit statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitActivity {
    Ready(Vec<WeeklyCommitActivity>),
    /// The provider is still computing the statistics ("try again shortly").
    Pending,
}

// ---------------------------------------------------------------------------
// Dated items used by the aggregation engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub authored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSummary {
    pub number: u64,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    /// The issues endpoint also reports pull requests; those carry this flag.
    #[serde(default)]
    pub is_pull_request: bool,
}

/// `"YYYY-MM"` bucket key for a timestamp.
pub fn month_key(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}
