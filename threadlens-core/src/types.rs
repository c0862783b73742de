use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Hard ceiling on `page_size`; larger requests are clamped, not rejected.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// One scraped forum item. Read-only from the core's perspective: posts
/// originate from a bulk load and are never individually mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Stable identifier assigned by the scraper.
    pub id: String,
    pub title: String,
    /// Body text where the platform exposes one; searched alongside the title.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Open tag set, e.g. "reddit" or "hackernews".
    pub platform: String,
    /// Sub-community name (subreddit, HN section, board).
    pub source: String,
    /// May be negative on platforms with downvotes.
    pub score: i64,
    pub num_comments: u32,
    /// Unix seconds.
    pub created_at: i64,
    pub url: String,
}

// ── Filtering & sorting ────────────────────────────────────────────

/// Whitelist of sortable columns. Unknown identifiers fall back to the
/// default sort rather than failing, to keep stale clients working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    Score,
    NumComments,
    Title,
    Author,
}

impl SortBy {
    pub fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Score => "score",
            Self::NumComments => "num_comments",
            Self::Title => "title",
            Self::Author => "author",
        }
    }

    /// Parse a user-provided identifier, falling back to the default column.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "score" => Self::Score,
            "num_comments" | "comments" => Self::NumComments,
            "title" => Self::Title,
            "author" => Self::Author,
            _ => Self::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Typed set of optional query constraints. Every field is independently
/// optional; the default value matches all records in default order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostFilter {
    pub platform: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub search_term: Option<String>,
    /// Unix seconds, inclusive.
    pub date_from: Option<i64>,
    /// Unix seconds, inclusive.
    pub date_to: Option<i64>,
    pub score_min: Option<i64>,
    pub score_max: Option<i64>,
    pub comments_min: Option<u32>,
    pub comments_max: Option<u32>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: u32,
    pub page_size: u32,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            platform: None,
            source: None,
            author: None,
            search_term: None,
            date_from: None,
            date_to: None,
            score_min: None,
            score_max: None,
            comments_min: None,
            comments_max: None,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            page: 1,
            page_size: 20,
        }
    }
}

impl PostFilter {
    /// Clamp pagination into valid bounds: `page >= 1`,
    /// `1 <= page_size <= MAX_PAGE_SIZE`.
    pub fn normalized(&self) -> Self {
        let mut f = self.clone();
        f.page = f.page.max(1);
        f.page_size = f.page_size.clamp(1, MAX_PAGE_SIZE);
        f
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Assemble a page, deriving `has_more` from the pagination invariant.
    pub fn new(data: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let has_more = u64::from(page) * u64::from(page_size) < total;
        Self {
            data,
            total,
            page,
            page_size,
            has_more,
        }
    }
}

// ── Aggregate metrics ──────────────────────────────────────────────

/// Engagement totals and averages over a record set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub total_posts: u64,
    pub total_score: i64,
    pub avg_score: f64,
    pub total_comments: u64,
    pub avg_comments: f64,
    pub total_engagement: i64,
    pub avg_engagement: f64,
}

/// Ordinary least-squares fit over `(x, y)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

/// One sparse time-series bucket. Buckets with no records are not emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Unix seconds of the bucket's start.
    pub bucket_start: i64,
    pub count: u64,
    pub total_score: i64,
    pub total_comments: u64,
}

/// One cell of the fixed 24×7 activity grid. The grid is always complete:
/// heatmaps render as a full grid, so empty cells are zero-filled rather
/// than omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapCell {
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u32,
    /// 0..24.
    pub hour: u32,
    pub count: u64,
    pub total_engagement: i64,
}

/// Direction of an author's recent scoring relative to the prior window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trend {
    Rising,
    #[default]
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

/// Fixed-threshold author classification; thresholds are policy constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorTier {
    Elite,
    Top,
    Active,
    Casual,
}

impl AuthorTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elite => "elite",
            Self::Top => "top",
            Self::Active => "active",
            Self::Casual => "casual",
        }
    }
}

/// The author's highest-scoring post (ties broken by first encountered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPost {
    pub id: String,
    pub title: String,
    pub score: i64,
}

/// Per-author leaderboard entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorStats {
    pub author: String,
    pub post_count: u64,
    pub total_score: i64,
    pub avg_score: f64,
    pub total_comments: u64,
    pub avg_engagement: f64,
    pub top_post: Option<TopPost>,
    pub trend: Trend,
    /// Percent change of the trailing-week average score vs the prior week.
    pub trend_value: f64,
    pub tier: AuthorTier,
}

// ── Store metrics ──────────────────────────────────────────────────

/// Summary counters for a loaded dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_posts: u64,
    pub distinct_authors: u64,
    pub posts_by_platform: HashMap<String, u64>,
    /// Unix seconds of the oldest and newest posts, when any exist.
    pub earliest_post: Option<i64>,
    pub latest_post: Option<i64>,
    pub db_size_bytes: u64,
}
