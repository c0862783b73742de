use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// JSON file containing an array of posts
    pub input: PathBuf,

    /// Path to the database file
    #[arg(long, default_value = "threadlens.db")]
    pub db: PathBuf,

    /// Path to a threadlens.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn run(args: LoadArgs) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Cannot read dataset: {}", args.input.display()))?;

    info!(bytes = bytes.len(), input = %args.input.display(), "dataset read");
    let engine = super::open_engine(&args.db, args.config.as_deref())?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("loading {}", args.input.display()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = engine.load_database(&bytes).await;
    spinner.finish_and_clear();

    let loaded = result?;
    let stats = engine.stats().await?;
    println!(
        "Loaded {loaded} posts ({} total, {} authors) into {}",
        stats.total_posts,
        stats.distinct_authors,
        args.db.display()
    );
    Ok(())
}
