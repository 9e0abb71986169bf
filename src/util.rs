use chrono::{DateTime, Datelike, Utc};

use crate::types::{ContributionCalendar, EstimatedCount};

/// Format a datetime relative to `now` (e.g., `"2h"`, `"3d"`, `"1w"`).
pub fn format_relative_time(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(dt);

    let minutes = duration.num_minutes();
    if minutes < 1 {
        return "now".to_owned();
    }
    if minutes < 60 {
        return format!("{minutes}m");
    }

    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{hours}h");
    }

    let days = duration.num_days();
    if days < 7 {
        return format!("{days}d");
    }
    if days < 30 {
        return format!("{}w", days / 7);
    }
    if days < 365 {
        return format!("{}mo", days / 30);
    }

    format!("{}y", days / 365)
}

/// `"12"` for a verified count, `"~12"` for a heuristic one.
pub fn format_estimated(count: EstimatedCount) -> String {
    if count.estimated {
        format!("~{}", count.value)
    } else {
        count.value.to_string()
    }
}

/// Heatmap glyph for a contribution level.
pub fn level_glyph(level: u8) -> char {
    match level {
        0 => '·',
        1 => '░',
        2 => '▒',
        3 => '▓',
        _ => '█',
    }
}

/// Render a calendar as seven text rows (Sunday first), one column per week,
/// with a month ruler on top.
pub fn render_heatmap(calendar: &ContributionCalendar) -> String {
    const DAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

    let mut ruler = vec![' '; calendar.weeks.len()];
    let mut last_month = 0;
    let mut free_from = 0;
    for (col, week) in calendar.weeks.iter().enumerate() {
        let Some(month) = week.iter().last().map(|d| d.date.month()) else {
            continue;
        };
        if month == last_month {
            continue;
        }
        last_month = month;
        let label = month_abbrev(month);
        if col >= free_from && col + label.len() <= ruler.len() {
            for (i, ch) in label.chars().enumerate() {
                ruler[col + i] = ch;
            }
            free_from = col + label.len() + 1;
        }
    }
    let ruler: String = ruler.into_iter().collect();

    let mut out = format!("    {}", ruler.trim_end());
    out.push('\n');
    for (weekday, label) in DAY_LABELS.iter().enumerate() {
        out.push_str(label);
        out.push(' ');
        for week in &calendar.weeks {
            out.push(week.days[weekday].map_or(' ', |d| level_glyph(d.level)));
        }
        out.push('\n');
    }
    out
}

fn month_abbrev(month: u32) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        12 => "Dec",
        _ => "",
    }
}
