use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::RepoRef;

// ---------------------------------------------------------------------------
// Notification-specific enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectType {
    Issue,
    PullRequest,
    Discussion,
    Release,
    #[serde(other)]
    Other,
}

impl SubjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::PullRequest => "pull request",
            Self::Discussion => "discussion",
            Self::Release => "release",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationReason {
    Subscribed,
    ReviewRequested,
    Mention,
    Author,
    Comment,
    Assign,
    StateChange,
    CiActivity,
    TeamMention,
    SecurityAlert,
    #[serde(other)]
    Unknown,
}

impl NotificationReason {
    /// Stable display name for filtering and rendering.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribed => "subscribed",
            Self::ReviewRequested => "review requested",
            Self::Mention => "mention",
            Self::Author => "author",
            Self::Comment => "comment",
            Self::Assign => "assigned",
            Self::StateChange => "state change",
            Self::CiActivity => "ci activity",
            Self::TeamMention => "team mention",
            Self::SecurityAlert => "security alert",
            Self::Unknown => "other",
        }
    }
}

// ---------------------------------------------------------------------------
// Notification domain type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationThread {
    pub id: String,
    pub thread_id: String,
    pub repository: RepoRef,
    pub subject_type: SubjectType,
    pub subject_title: String,
    pub reason: NotificationReason,
    #[serde(default)]
    pub unread: bool,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for a notification listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationQuery {
    /// Only threads updated after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Include threads already marked read.
    pub all: bool,
}

/// Timestamp of the last successful notification fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub last_fetch_time: Option<DateTime<Utc>>,
}

impl SyncCursor {
    /// Move the cursor forward; never moves it backward.
    pub fn advance(&mut self, to: DateTime<Utc>) {
        match self.last_fetch_time {
            Some(prev) if prev >= to => {}
            _ => self.last_fetch_time = Some(to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cursor_never_moves_backward() {
        let later = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut cursor = SyncCursor::default();
        cursor.advance(later);
        cursor.advance(earlier);
        assert_eq!(cursor.last_fetch_time, Some(later));
    }

    #[test]
    fn unknown_subject_type_decodes_as_other() {
        let t: SubjectType = serde_json::from_str("\"CheckSuite\"").unwrap();
        assert_eq!(t, SubjectType::Other);
        let t: SubjectType = serde_json::from_str("\"PullRequest\"").unwrap();
        assert_eq!(t, SubjectType::PullRequest);
    }
}
