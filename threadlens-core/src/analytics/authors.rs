// Statistical computations intentionally cast int→float.
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::stats::engagement_score;
use crate::types::{AuthorStats, AuthorTier, Post, TopPost, Trend};

/// Trend windows: trailing week vs the week before it.
const WINDOW_SECS: i64 = 7 * 86_400;

/// Relative change beyond which an author counts as rising or declining.
const TREND_THRESHOLD: f64 = 0.10;

// Tier thresholds are policy constants, not derived statistically.
const ELITE_AVG_SCORE: f64 = 200.0;
const ELITE_POST_COUNT: u64 = 20;
const TOP_AVG_SCORE: f64 = 100.0;
const TOP_POST_COUNT: u64 = 10;
const ACTIVE_POST_COUNT: u64 = 5;
const ACTIVE_AVG_SCORE: f64 = 50.0;

/// Fixed-threshold author classification over average score and post count.
pub fn classify_tier(avg_score: f64, post_count: u64) -> AuthorTier {
    if avg_score >= ELITE_AVG_SCORE && post_count >= ELITE_POST_COUNT {
        AuthorTier::Elite
    } else if avg_score >= TOP_AVG_SCORE && post_count >= TOP_POST_COUNT {
        AuthorTier::Top
    } else if post_count >= ACTIVE_POST_COUNT || avg_score >= ACTIVE_AVG_SCORE {
        AuthorTier::Active
    } else {
        AuthorTier::Casual
    }
}

/// Compare the trailing-week average score against the preceding 7–14 day
/// window. An author with no posts in either window is Stable with value 0.
fn classify_trend(posts: &[&Post], now: DateTime<Utc>) -> (Trend, f64) {
    let now_ts = now.timestamp();
    let recent_cutoff = now_ts - WINDOW_SECS;
    let prior_cutoff = now_ts - 2 * WINDOW_SECS;

    let window_avg = |from: i64, to: i64| -> Option<f64> {
        let scores: Vec<i64> = posts
            .iter()
            .filter(|p| p.created_at >= from && p.created_at < to)
            .map(|p| p.score)
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<i64>() as f64 / scores.len() as f64)
        }
    };

    let (Some(recent_avg), Some(prior_avg)) = (
        window_avg(recent_cutoff, i64::MAX),
        window_avg(prior_cutoff, recent_cutoff),
    ) else {
        return (Trend::Stable, 0.0);
    };
    if prior_avg.abs() < f64::EPSILON {
        return (Trend::Stable, 0.0);
    }

    let change = (recent_avg - prior_avg) / prior_avg;
    let trend = if change > TREND_THRESHOLD {
        Trend::Rising
    } else if change < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    };
    (trend, change * 100.0)
}

/// Per-author leaderboard over a post set, ranked by total score descending.
///
/// Ties keep the authors' first-encountered order (stable sort over the
/// enumeration order of the input). Anonymous posts are excluded.
pub fn author_stats(posts: &[Post], now: DateTime<Utc>) -> Vec<AuthorStats> {
    // Group while preserving first-encounter order for the tie break.
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&Post>> = HashMap::new();
    for post in posts {
        let Some(author) = post.author.as_deref() else {
            continue;
        };
        grouped
            .entry(author)
            .or_insert_with(|| {
                order.push(author);
                Vec::new()
            })
            .push(post);
    }

    let mut stats: Vec<AuthorStats> = order
        .iter()
        .map(|author| {
            let group = &grouped[author];
            let post_count = group.len() as u64;
            let total_score: i64 = group.iter().map(|p| p.score).sum();
            let total_comments: u64 = group.iter().map(|p| u64::from(p.num_comments)).sum();
            let total_engagement: i64 = group
                .iter()
                .map(|p| engagement_score(p.score, p.num_comments))
                .sum();
            let avg_score = total_score as f64 / post_count as f64;

            // Max score, first-encountered wins ties.
            let top_post = group
                .iter()
                .fold(None::<&&Post>, |best, p| match best {
                    Some(b) if b.score >= p.score => Some(b),
                    _ => Some(p),
                })
                .map(|p| TopPost {
                    id: p.id.clone(),
                    title: p.title.clone(),
                    score: p.score,
                });

            let (trend, trend_value) = classify_trend(group, now);

            AuthorStats {
                author: (*author).to_string(),
                post_count,
                total_score,
                avg_score,
                total_comments,
                avg_engagement: total_engagement as f64 / post_count as f64,
                top_post,
                trend,
                trend_value,
                tier: classify_tier(avg_score, post_count),
            }
        })
        .collect();

    stats.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    stats
}
