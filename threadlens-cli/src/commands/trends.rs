use std::path::PathBuf;

use chrono::DateTime;
use clap::Args;

use threadlens_core::analytics::Interval;
use threadlens_core::types::PostFilter;

#[derive(Args, Debug)]
pub struct TrendsArgs {
    /// Path to the database file
    #[arg(long, default_value = "threadlens.db")]
    pub db: PathBuf,

    /// Path to a threadlens.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bucket interval: hour, day, week, month
    #[arg(long, default_value = "day")]
    pub interval: String,

    /// Restrict to one platform
    #[arg(long)]
    pub platform: Option<String>,

    /// Show the weekday-by-hour posting heatmap for the trailing N days
    #[arg(long)]
    pub heatmap: Option<u32>,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    pub format: String,
}

pub async fn run(args: TrendsArgs) -> anyhow::Result<()> {
    let engine = super::open_engine(&args.db, args.config.as_deref())?;
    let filter = PostFilter {
        platform: args.platform.clone(),
        ..PostFilter::default()
    };

    if let Some(days) = args.heatmap {
        let cells = engine.query_posting_heatmap(days).await?;
        if args.format == "json" {
            println!("{}", serde_json::to_string_pretty(&cells)?);
            return Ok(());
        }
        print_heatmap(&cells);
        return Ok(());
    }

    let interval = Interval::parse(&args.interval);
    let buckets = engine.query_time_series(interval, &filter).await?;
    let line = engine.query_engagement_trend(&filter, interval).await?;
    let r = engine.query_score_comment_correlation(&filter).await?;

    if args.format == "json" {
        let combined = serde_json::json!({
            "interval": interval.as_str(),
            "buckets": buckets,
            "trend": line,
            "score_comment_correlation": r,
        });
        println!("{}", serde_json::to_string_pretty(&combined)?);
        return Ok(());
    }

    if buckets.is_empty() {
        println!("No posts match.");
        return Ok(());
    }

    println!("{:<12}  {:>6}  {:>8}  {:>8}", "bucket", "posts", "score", "cmts");
    for b in &buckets {
        println!(
            "{:<12}  {:>6}  {:>8}  {:>8}",
            format_bucket(b.bucket_start),
            b.count,
            b.total_score,
            b.total_comments
        );
    }
    println!("Engagement trend: {:+.2} per {} (intercept {:.1})", line.slope, interval.as_str(), line.intercept);
    println!("Score/comment correlation: {r:.3}");
    Ok(())
}

fn format_bucket(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map_or_else(|| ts.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

fn print_heatmap(cells: &[threadlens_core::types::HeatmapCell]) {
    const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let max = cells.iter().map(|c| c.count).max().unwrap_or(0);

    print!("    ");
    for hour in 0..24 {
        print!("{hour:>3}");
    }
    println!();
    for (weekday, name) in WEEKDAYS.iter().enumerate() {
        print!("{name} ");
        for hour in 0..24 {
            let cell = &cells[weekday * 24 + hour];
            print!("{:>3}", intensity(cell.count, max));
        }
        println!();
    }
}

/// Five-step density glyph for one heatmap cell.
fn intensity(count: u64, max: u64) -> &'static str {
    if count == 0 || max == 0 {
        return ".";
    }
    match (count * 4).div_ceil(max) {
        0 | 1 => "-",
        2 => "+",
        3 => "*",
        _ => "#",
    }
}
