use std::path::PathBuf;

use clap::Args;

use threadlens_core::types::{PostFilter, Trend};

#[derive(Args, Debug)]
pub struct AuthorsArgs {
    /// Path to the database file
    #[arg(long, default_value = "threadlens.db")]
    pub db: PathBuf,

    /// Path to a threadlens.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Restrict to one platform
    #[arg(long)]
    pub platform: Option<String>,

    /// Number of authors to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    pub format: String,
}

pub async fn run(args: AuthorsArgs) -> anyhow::Result<()> {
    let engine = super::open_engine(&args.db, args.config.as_deref())?;
    let filter = PostFilter {
        platform: args.platform.clone(),
        ..PostFilter::default()
    };
    let authors = engine.query_top_authors(args.limit, &filter).await?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&authors)?);
        return Ok(());
    }

    if authors.is_empty() {
        println!("No authors found.");
        return Ok(());
    }

    println!(
        "{:>3}  {:<20} {:>6} {:>8} {:>8} {:>8}  {:<9} {}",
        "#", "author", "posts", "score", "avg", "engage", "trend", "tier"
    );
    for (rank, a) in authors.iter().enumerate() {
        let trend = match a.trend {
            Trend::Rising => format!("+{:.0}%", a.trend_value),
            Trend::Declining => format!("{:.0}%", a.trend_value),
            Trend::Stable => "stable".to_string(),
        };
        println!(
            "{:>3}  {:<20} {:>6} {:>8} {:>8.1} {:>8.1}  {:<9} {:?}",
            rank + 1,
            a.author,
            a.post_count,
            a.total_score,
            a.avg_score,
            a.avg_engagement,
            trend,
            a.tier,
        );
    }
    Ok(())
}
