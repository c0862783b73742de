// Statistical computations intentionally cast int→float.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]

use crate::types::{EngagementMetrics, Post, TrendLine};

/// Comment weight in the engagement score. Comments cost more interaction
/// than a vote; fixed policy, not configurable.
pub const COMMENT_WEIGHT: i64 = 2;

/// Weighted interaction metric: `score + comments * 2`.
pub fn engagement_score(score: i64, num_comments: u32) -> i64 {
    score + i64::from(num_comments) * COMMENT_WEIGHT
}

/// Pearson correlation coefficient between two equal-length sequences.
///
/// Returns `0.0` for mismatched lengths, empty input, or zero variance in
/// either sequence.
pub fn correlation(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.is_empty() || xs.len() != ys.len() {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    cov / denom
}

/// Ordinary least-squares fit. Degenerates to a zero line on empty input or
/// zero x-variance.
pub fn linear_regression(points: &[(f64, f64)]) -> TrendLine {
    let n = points.len() as f64;
    if n < 2.0 {
        return TrendLine::default();
    }

    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let dot_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return TrendLine::default();
    }

    let slope = (n * dot_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    TrendLine { slope, intercept }
}

impl TrendLine {
    /// Endpoints for rendering the line across a caller-supplied domain.
    pub fn endpoints(&self, x_min: f64, x_max: f64) -> [(f64, f64); 2] {
        [
            (x_min, self.slope * x_min + self.intercept),
            (x_max, self.slope * x_max + self.intercept),
        ]
    }
}

/// Engagement totals and averages over a record set. Empty input yields the
/// all-zero metrics value.
pub fn engagement_metrics(posts: &[Post]) -> EngagementMetrics {
    if posts.is_empty() {
        return EngagementMetrics::default();
    }
    let n = posts.len() as f64;
    let total_score: i64 = posts.iter().map(|p| p.score).sum();
    let total_comments: u64 = posts.iter().map(|p| u64::from(p.num_comments)).sum();
    let total_engagement: i64 = posts
        .iter()
        .map(|p| engagement_score(p.score, p.num_comments))
        .sum();

    EngagementMetrics {
        total_posts: posts.len() as u64,
        total_score,
        avg_score: total_score as f64 / n,
        total_comments,
        avg_comments: total_comments as f64 / n,
        total_engagement,
        avg_engagement: total_engagement as f64 / n,
    }
}
