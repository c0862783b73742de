// Analytics aggregator — pure, deterministic functions over already-fetched
// post sets. No I/O, and no function here ever fails: degenerate input yields
// degenerate-but-valid output (zero, empty, or Stable), because a missing
// metric must never interrupt rendering.

pub mod authors;
pub mod stats;
pub mod timeseries;

pub use authors::{author_stats, classify_tier};
pub use stats::{correlation, engagement_metrics, engagement_score, linear_regression};
pub use timeseries::{Interval, bucket_posts, posting_heatmap};
