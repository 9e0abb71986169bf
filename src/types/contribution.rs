use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Intensity bucket for a day's raw activity count.
///
/// | count  | level |
/// |--------|-------|
/// | 0      | 0     |
/// | 1–2    | 1     |
/// | 3–5    | 2     |
/// | 6–10   | 3     |
/// | > 10   | 4     |
pub fn level_for(count: u32) -> u8 {
    match count {
        0 => 0,
        1..=2 => 1,
        3..=5 => 2,
        6..=10 => 3,
        _ => 4,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
    pub level: u8,
}

impl ContributionDay {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            count: 0,
            level: 0,
        }
    }
}

/// Seven Sunday-first slots. Slots that belong to the neighbouring year are
/// `None`, so only the first and last week of a calendar can be partial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionWeek {
    pub days: [Option<ContributionDay>; 7],
}

impl ContributionWeek {
    pub fn iter(&self) -> impl Iterator<Item = &ContributionDay> {
        self.days.iter().flatten()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionCalendar {
    pub year: i32,
    pub weeks: Vec<ContributionWeek>,
    pub total_contributions: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl ContributionCalendar {
    /// All in-year days in chronological order.
    pub fn days(&self) -> impl Iterator<Item = &ContributionDay> {
        self.weeks.iter().flat_map(ContributionWeek::iter)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&ContributionDay> {
        self.days().find(|d| d.date == date)
    }

    /// Number of days with at least one contribution.
    pub fn active_days(&self) -> usize {
        self.days().filter(|d| d.count > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for(0), 0);
        assert_eq!(level_for(1), 1);
        assert_eq!(level_for(2), 1);
        assert_eq!(level_for(3), 2);
        assert_eq!(level_for(5), 2);
        assert_eq!(level_for(6), 3);
        assert_eq!(level_for(10), 3);
        assert_eq!(level_for(11), 4);
        assert_eq!(level_for(u32::MAX), 4);
    }

    #[test]
    fn level_is_monotonic() {
        let mut prev = 0;
        for count in 0..200 {
            let level = level_for(count);
            assert!(level >= prev, "level dropped at count {count}");
            assert!(level <= 4);
            prev = level;
        }
    }
}
