// Grid indexing intentionally casts between integer widths.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use chrono::{Datelike, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stats::engagement_score;
use crate::types::{HeatmapCell, Post, TimeBucket};

const HOUR_SECS: i64 = 3600;
const DAY_SECS: i64 = 86_400;

/// Time-series bucket width. Hour and day buckets are pure integer division
/// on unix seconds; week and month are calendar units and anchor to the
/// post's local week start (Monday) and first-of-month respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Parse a user-provided identifier, falling back to day buckets.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "hour" | "hourly" => Self::Hour,
            "week" | "weekly" => Self::Week,
            "month" | "monthly" => Self::Month,
            _ => Self::Day,
        }
    }
}

/// Bucket start (unix seconds) for one timestamp. Returns `None` only when
/// the timezone cannot represent the instant, in which case the post is
/// skipped rather than misfiled.
fn bucket_key<Tz: TimeZone>(ts: i64, interval: Interval, tz: &Tz) -> Option<i64> {
    match interval {
        Interval::Hour => Some(ts.div_euclid(HOUR_SECS) * HOUR_SECS),
        Interval::Day => Some(ts.div_euclid(DAY_SECS) * DAY_SECS),
        Interval::Week => {
            let dt = tz.timestamp_opt(ts, 0).earliest()?;
            let date = dt.date_naive();
            let monday =
                date - chrono::Days::new(u64::from(date.weekday().num_days_from_monday()));
            tz.from_local_datetime(&monday.and_time(NaiveTime::MIN))
                .earliest()
                .map(|anchor| anchor.timestamp())
        }
        Interval::Month => {
            let dt = tz.timestamp_opt(ts, 0).earliest()?;
            let date = dt.date_naive();
            let first = date.with_day(1).unwrap_or(date);
            tz.from_local_datetime(&first.and_time(NaiveTime::MIN))
                .earliest()
                .map(|anchor| anchor.timestamp())
        }
    }
}

/// Group posts into time buckets. Output is sparse (no zero buckets are
/// synthesized — trend lines are rendered from sparse series) and sorted by
/// bucket start ascending.
pub fn bucket_posts<Tz: TimeZone>(posts: &[Post], interval: Interval, tz: &Tz) -> Vec<TimeBucket> {
    let mut buckets: BTreeMap<i64, TimeBucket> = BTreeMap::new();
    for post in posts {
        let Some(key) = bucket_key(post.created_at, interval, tz) else {
            continue;
        };
        let bucket = buckets.entry(key).or_insert_with(|| TimeBucket {
            bucket_start: key,
            count: 0,
            total_score: 0,
            total_comments: 0,
        });
        bucket.count += 1;
        bucket.total_score += post.score;
        bucket.total_comments += u64::from(post.num_comments);
    }
    buckets.into_values().collect()
}

/// The fixed 24×7 hour-of-day × day-of-week activity grid. Always emits all
/// 168 cells, zero-filled where empty: heatmaps render as a complete grid.
/// Ordered by weekday (Monday first), then hour.
pub fn posting_heatmap<Tz: TimeZone>(posts: &[Post], tz: &Tz) -> Vec<HeatmapCell> {
    let mut grid = [[(0u64, 0i64); 24]; 7];
    for post in posts {
        let Some(dt) = tz.timestamp_opt(post.created_at, 0).earliest() else {
            continue;
        };
        let weekday = dt.weekday().num_days_from_monday() as usize;
        let hour = dt.hour() as usize;
        grid[weekday][hour].0 += 1;
        grid[weekday][hour].1 += engagement_score(post.score, post.num_comments);
    }

    let mut cells = Vec::with_capacity(168);
    for (weekday, hours) in grid.iter().enumerate() {
        for (hour, &(count, total_engagement)) in hours.iter().enumerate() {
            cells.push(HeatmapCell {
                weekday: weekday as u32,
                hour: hour as u32,
                count,
                total_engagement,
            });
        }
    }
    cells
}
