use std::path::PathBuf;

use chrono::DateTime;
use clap::Args;

use threadlens_core::types::PostFilter;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Path to the database file
    #[arg(long, default_value = "threadlens.db")]
    pub db: PathBuf,

    /// Path to a threadlens.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    pub format: String,
}

pub async fn run(args: StatsArgs) -> anyhow::Result<()> {
    let engine = super::open_engine(&args.db, args.config.as_deref())?;
    let stats = engine.stats().await?;
    let metrics = engine
        .query_engagement_metrics(&PostFilter::default())
        .await?;

    if args.format == "json" {
        let combined = serde_json::json!({ "store": stats, "engagement": metrics });
        println!("{}", serde_json::to_string_pretty(&combined)?);
        return Ok(());
    }

    println!("Dataset: {}", args.db.display());
    println!("  posts:            {}", stats.total_posts);
    println!("  authors:          {}", stats.distinct_authors);
    println!("  db size:          {} bytes", stats.db_size_bytes);
    if let (Some(from), Some(to)) = (stats.earliest_post, stats.latest_post) {
        println!("  range:            {} .. {}", format_ts(from), format_ts(to));
    }
    let mut platforms: Vec<_> = stats.posts_by_platform.iter().collect();
    platforms.sort_by(|a, b| b.1.cmp(a.1));
    for (platform, count) in platforms {
        println!("  {platform:<17} {count}");
    }

    println!("Engagement:");
    println!("  total score:      {}", metrics.total_score);
    println!("  avg score:        {:.1}", metrics.avg_score);
    println!("  total comments:   {}", metrics.total_comments);
    println!("  avg comments:     {:.1}", metrics.avg_comments);
    println!("  total engagement: {}", metrics.total_engagement);
    println!("  avg engagement:   {:.1}", metrics.avg_engagement);
    Ok(())
}

fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map_or_else(|| ts.to_string(), |dt| dt.format("%Y-%m-%d").to_string())
}
