use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A derived count that is not backed by a verified provider figure.
///
/// Reviews cannot be listed in bulk, so the aggregate carries a heuristic
/// value and says so explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedCount {
    pub value: u64,
    pub estimated: bool,
}

impl EstimatedCount {
    /// Half of the pull-request count, rounded down.
    pub fn reviews_from_pull_requests(pull_requests: u64) -> Self {
        Self {
            value: pull_requests / 2,
            estimated: true,
        }
    }
}

impl std::ops::AddAssign for EstimatedCount {
    fn add_assign(&mut self, rhs: Self) {
        self.value += rhs.value;
        self.estimated |= rhs.estimated;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTotals {
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
    pub reviews: EstimatedCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthTotals {
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    Commits,
    PullRequests,
    Issues,
}

impl StatField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commits => "commits",
            Self::PullRequests => "pull requests",
            Self::Issues => "issues",
        }
    }
}

/// One repository field that could not be fetched and was left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFailure {
    pub repo: String,
    pub field: StatField,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
    pub reviews: EstimatedCount,
    pub repository_count: usize,
    pub by_repo: IndexMap<String, RepoTotals>,
    pub by_month: BTreeMap<String, MonthTotals>,
    #[serde(default)]
    pub failures: Vec<FieldFailure>,
}

impl AggregateStats {
    /// Recompute the grand totals from `by_repo`.
    pub(crate) fn recompute_totals(&mut self) {
        self.commits = self.by_repo.values().map(|r| r.commits).sum();
        self.pull_requests = self.by_repo.values().map(|r| r.pull_requests).sum();
        self.issues = self.by_repo.values().map(|r| r.issues).sum();
        self.reviews = EstimatedCount::default();
        for totals in self.by_repo.values() {
            self.reviews += totals.reviews;
        }
        self.repository_count = self.by_repo.len();
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
