//! The query engine: ties the store, the query builder, and the result
//! cache together behind one façade, and runs the aggregation paths over
//! full result sets.

// Aggregation inputs intentionally cast int→float.
#![allow(clippy::cast_precision_loss)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tracing::{debug, info};

use crate::analytics::{
    Interval, author_stats, bucket_posts, correlation, engagement_metrics, linear_regression,
    posting_heatmap,
};
use crate::config::ThreadlensConfig;
use crate::error::Result;
use crate::query::{QueryBuilder, ResultCache};
use crate::recovery::RecoveryRegistry;
use crate::store::{PostStore, SqliteStore, TransactionManager};
use crate::types::{
    AuthorStats, EngagementMetrics, HeatmapCell, Page, Post, PostFilter, SortBy, SortOrder,
    StoreStats, TimeBucket, TrendLine,
};

const DAY_SECS: i64 = 86_400;

/// One engine per store. Paginated reads go through the result cache;
/// aggregations always hit the store for the full matching row set.
pub struct AnalyticsEngine {
    store: Arc<SqliteStore>,
    cache: Arc<ResultCache<Page<Post>>>,
    config: ThreadlensConfig,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<SqliteStore>, config: ThreadlensConfig) -> Self {
        let cache = Arc::new(ResultCache::new(config.cache.capacity));
        Self {
            store,
            cache,
            config,
        }
    }

    /// The engine's result cache, for wiring into a recovery registry.
    pub fn cache(&self) -> Arc<ResultCache<Page<Post>>> {
        Arc::clone(&self.cache)
    }

    pub fn store(&self) -> Arc<SqliteStore> {
        Arc::clone(&self.store)
    }

    /// Standard recovery table over this engine's store and cache.
    pub fn recovery_registry(&self) -> RecoveryRegistry {
        RecoveryRegistry::standard(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.config.recovery.max_retries,
            Duration::from_millis(self.config.recovery.retry_delay_ms),
        )
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache.ttl_secs)
    }

    fn use_fts(&self) -> bool {
        self.config.query.use_fts && self.store.fts_enabled()
    }

    // ── Paginated queries ──────────────────────────────────────────

    /// Filtered, sorted, paginated read with its count companion. Identical
    /// filters within the TTL are served from the cache.
    pub async fn query_posts(&self, filter: &PostFilter) -> Result<Page<Post>> {
        let mut filter = filter.clone();
        // page_size 0 means "use the configured default".
        if filter.page_size == 0 {
            filter.page_size = self.config.query.default_page_size;
        }
        let normalized = filter.normalized();
        let built = QueryBuilder::from_filter(&normalized, self.use_fts()).build();

        if let Some(page) = self.cache.get(built.cache_key(), self.ttl()) {
            debug!(key = built.cache_key(), "query cache hit");
            return Ok(page);
        }

        let total = self.store.count_posts(&built).await?;
        let data = self.store.query_posts(&built).await?;
        let page = Page::new(data, total, normalized.page, normalized.page_size);
        self.cache.insert(built.cache_key(), page.clone());
        Ok(page)
    }

    /// The newest posts, most recent first.
    pub async fn query_recent_posts(&self, limit: u32) -> Result<Vec<Post>> {
        let filter = PostFilter {
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Desc,
            page: 1,
            page_size: limit,
            ..PostFilter::default()
        };
        Ok(self.query_posts(&filter).await?.data)
    }

    // ── Aggregations ───────────────────────────────────────────────

    /// Every post matching the filter, ignoring pagination. The aggregation
    /// paths are pure functions over this row set.
    async fn matching_posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let normalized = filter.normalized();
        let built = QueryBuilder::from_filter(&normalized, self.use_fts()).build_unpaginated();
        self.store.query_posts(&built).await
    }

    /// Per-author leaderboard over the filtered set, top `limit` authors.
    pub async fn query_top_authors(
        &self,
        limit: usize,
        filter: &PostFilter,
    ) -> Result<Vec<AuthorStats>> {
        let posts = self.matching_posts(filter).await?;
        let mut stats = author_stats(&posts, Utc::now());
        stats.truncate(limit);
        Ok(stats)
    }

    /// Posting activity bucketed onto a time axis in the local timezone.
    pub async fn query_time_series(
        &self,
        interval: Interval,
        filter: &PostFilter,
    ) -> Result<Vec<TimeBucket>> {
        let posts = self.matching_posts(filter).await?;
        Ok(bucket_posts(&posts, interval, &Local))
    }

    pub async fn query_engagement_metrics(&self, filter: &PostFilter) -> Result<EngagementMetrics> {
        let posts = self.matching_posts(filter).await?;
        Ok(engagement_metrics(&posts))
    }

    /// Least-squares engagement trend over `interval` buckets of the
    /// filtered set. The slope is per bucket, so callers labeling it must
    /// use the same interval.
    pub async fn query_engagement_trend(
        &self,
        filter: &PostFilter,
        interval: Interval,
    ) -> Result<TrendLine> {
        let posts = self.matching_posts(filter).await?;
        let buckets = bucket_posts(&posts, interval, &Local);
        let points: Vec<(f64, f64)> = buckets
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let engagement = b.total_score
                    + i64::try_from(b.total_comments).unwrap_or(0) * crate::analytics::stats::COMMENT_WEIGHT;
                (i as f64, engagement as f64)
            })
            .collect();
        Ok(linear_regression(&points))
    }

    /// Pearson correlation between score and comment count.
    pub async fn query_score_comment_correlation(&self, filter: &PostFilter) -> Result<f64> {
        let posts = self.matching_posts(filter).await?;
        let xs: Vec<f64> = posts.iter().map(|p| p.score as f64).collect();
        let ys: Vec<f64> = posts.iter().map(|p| f64::from(p.num_comments)).collect();
        Ok(correlation(&xs, &ys))
    }

    /// Weekday-by-hour posting heatmap over the trailing `days` days.
    /// Always 168 cells, weekday-major.
    pub async fn query_posting_heatmap(&self, days: u32) -> Result<Vec<HeatmapCell>> {
        let filter = PostFilter {
            date_from: Some(Utc::now().timestamp() - i64::from(days) * DAY_SECS),
            ..PostFilter::default()
        };
        let posts = self.matching_posts(&filter).await?;
        Ok(posting_heatmap(&posts, &Local))
    }

    // ── Dataset lifecycle ──────────────────────────────────────────

    /// Parse a JSON post array and bulk-load it, one transaction per batch.
    /// A mid-batch failure rolls back only that batch; earlier batches stay
    /// committed. Once batching starts, the result cache is dropped on every
    /// exit path, so a partial load never serves stale pages.
    pub async fn load_database(&self, bytes: &[u8]) -> Result<u64> {
        let posts: Vec<Post> = serde_json::from_slice(bytes)?;
        let batch_size = self.config.load.batch_size.max(1);

        let outcome = self.load_batches(&posts, batch_size).await;
        self.cache.clear();
        let loaded = outcome?;
        info!(posts = loaded, batches = posts.len().div_ceil(batch_size), "dataset loaded");
        Ok(loaded)
    }

    async fn load_batches(&self, posts: &[Post], batch_size: usize) -> Result<u64> {
        let mut loaded: u64 = 0;
        let mut txn = TransactionManager::new(Arc::clone(&self.store));
        for chunk in posts.chunks(batch_size) {
            txn.begin().await?;
            match self.store.insert_chunk(chunk).await {
                Ok(n) => {
                    txn.commit().await?;
                    loaded += n;
                }
                Err(err) => {
                    // Surface the insert failure even if rollback also fails.
                    txn.rollback().await.ok();
                    return Err(err);
                }
            }
        }
        Ok(loaded)
    }

    /// Serialize the full dataset back out as JSON bytes.
    pub async fn export_database(&self) -> Result<Vec<u8>> {
        self.store.export_json().await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Invalidate the store handle and drop cached results. Queries after
    /// this fail with a Connection-kind error.
    pub async fn close(&self) -> Result<()> {
        self.cache.clear();
        self.store.close().await
    }
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("cached_results", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn post(id: &str, score: i64, comments: u32, created_at: i64) -> Post {
        Post {
            id: id.to_string(),
            title: format!("post {id}"),
            content: None,
            author: Some("alice".into()),
            platform: "reddit".into(),
            source: "rust".into(),
            score,
            num_comments: comments,
            created_at,
            url: String::new(),
        }
    }

    async fn engine_with(posts: &[Post]) -> AnalyticsEngine {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = AnalyticsEngine::new(store, ThreadlensConfig::default());
        engine
            .load_database(&serde_json::to_vec(posts).unwrap())
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn paginated_query_round_trip() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = AnalyticsEngine::new(store, ThreadlensConfig::default());
        let posts: Vec<Post> = (0..25).map(|i| post(&format!("p{i}"), i, 0, i)).collect();
        let loaded = engine
            .load_database(&serde_json::to_vec(&posts).unwrap())
            .await
            .unwrap();
        assert_eq!(loaded, 25);

        let filter = PostFilter {
            page: 2,
            page_size: 10,
            sort_by: SortBy::Score,
            sort_order: SortOrder::Desc,
            ..PostFilter::default()
        };
        let page = engine.query_posts(&filter).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.data.len(), 10);
        assert!(page.has_more);
        // Page 2 of a descending score sort starts at score 14.
        assert_eq!(page.data[0].score, 14);
    }

    #[tokio::test]
    async fn identical_filters_share_a_cache_entry() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = AnalyticsEngine::new(store, ThreadlensConfig::default());
        let posts = vec![post("a", 1, 0, 1)];
        engine
            .load_database(&serde_json::to_vec(&posts).unwrap())
            .await
            .unwrap();

        let filter = PostFilter::default();
        engine.query_posts(&filter).await.unwrap();
        assert_eq!(engine.cache.len(), 1);
        engine.query_posts(&filter).await.unwrap();
        assert_eq!(engine.cache.len(), 1);
    }

    #[tokio::test]
    async fn zero_page_size_takes_the_configured_default() {
        let engine = engine_with(&[post("a", 1, 0, 1)]).await;
        let page = engine
            .query_posts(&PostFilter {
                page_size: 0,
                ..PostFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.page_size, 20);
    }

    #[tokio::test]
    async fn load_clears_cached_results() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = AnalyticsEngine::new(store, ThreadlensConfig::default());
        engine
            .load_database(&serde_json::to_vec(&[post("a", 1, 0, 1)]).unwrap())
            .await
            .unwrap();
        engine.query_posts(&PostFilter::default()).await.unwrap();
        assert_eq!(engine.cache.len(), 1);

        engine
            .load_database(&serde_json::to_vec(&[post("b", 2, 0, 2)]).unwrap())
            .await
            .unwrap();
        assert!(engine.cache.is_empty());

        let page = engine.query_posts(&PostFilter::default()).await.unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn failed_load_still_drops_cached_results() {
        let engine = engine_with(&[post("a", 1, 0, 1)]).await;
        engine.query_posts(&PostFilter::default()).await.unwrap();
        assert_eq!(engine.cache.len(), 1);

        // Closing just the store makes the first begin() fail while the
        // cache still holds the pre-load page.
        engine.store().close().await.unwrap();
        let bytes = serde_json::to_vec(&[post("b", 2, 0, 2)]).unwrap();
        let err = engine.load_database(&bytes).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Connection);
        assert!(engine.cache.is_empty());
    }

    #[tokio::test]
    async fn recent_posts_come_newest_first() {
        let posts: Vec<Post> = (0..5).map(|i| post(&format!("p{i}"), 0, 0, i * 100)).collect();
        let engine = engine_with(&posts).await;
        let recent = engine.query_recent_posts(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].created_at, 400);
        assert_eq!(recent[2].created_at, 200);
    }

    #[tokio::test]
    async fn malformed_json_is_a_loading_error() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = AnalyticsEngine::new(store, ThreadlensConfig::default());
        let err = engine.load_database(b"{not json").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Loading);
    }

    #[tokio::test]
    async fn export_round_trips_the_dataset() {
        let engine = engine_with(&[post("a", 5, 2, 10), post("b", 7, 1, 20)]).await;
        let bytes = engine.export_database().await.unwrap();
        let exported: Vec<Post> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(exported.len(), 2);
    }

    #[tokio::test]
    async fn queries_fail_after_close() {
        let engine = engine_with(&[post("a", 5, 2, 10)]).await;
        engine.close().await.unwrap();
        let err = engine.query_posts(&PostFilter::default()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Connection);
    }

    #[tokio::test]
    async fn correlation_over_filtered_set() {
        let posts = vec![post("a", 10, 1, 1), post("b", 20, 2, 2), post("c", 30, 3, 3)];
        let engine = engine_with(&posts).await;
        let r = engine
            .query_score_comment_correlation(&PostFilter::default())
            .await
            .unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn trend_buckets_follow_requested_interval() {
        // Mid-month noon timestamps, two days apart: one bucket per post at
        // day granularity, a single bucket at month granularity, in any
        // local timezone.
        let posts = vec![
            post("a", 10, 0, 1_686_398_400),
            post("b", 20, 0, 1_686_571_200),
            post("c", 30, 0, 1_686_744_000),
        ];
        let engine = engine_with(&posts).await;

        let daily = engine
            .query_engagement_trend(&PostFilter::default(), Interval::Day)
            .await
            .unwrap();
        assert!((daily.slope - 10.0).abs() < 1e-9);

        // A single monthly bucket degenerates to the zero line.
        let monthly = engine
            .query_engagement_trend(&PostFilter::default(), Interval::Month)
            .await
            .unwrap();
        assert_eq!(monthly.slope, 0.0);
    }

    #[tokio::test]
    async fn heatmap_is_full_grid() {
        let engine = engine_with(&[]).await;
        let cells = engine.query_posting_heatmap(30).await.unwrap();
        assert_eq!(cells.len(), 168);
    }
}
