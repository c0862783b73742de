use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// File to write the JSON dataset to ("-" for stdout)
    pub output: PathBuf,

    /// Path to the database file
    #[arg(long, default_value = "threadlens.db")]
    pub db: PathBuf,

    /// Path to a threadlens.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn run(args: ExportArgs) -> anyhow::Result<()> {
    let engine = super::open_engine(&args.db, args.config.as_deref())?;
    let bytes = engine.export_database().await?;

    if args.output.as_os_str() == "-" {
        let text = String::from_utf8(bytes).context("Exported dataset is not valid UTF-8")?;
        println!("{text}");
        return Ok(());
    }

    tokio::fs::write(&args.output, &bytes)
        .await
        .with_context(|| format!("Cannot write export: {}", args.output.display()))?;
    let stats = engine.stats().await?;
    println!(
        "Exported {} posts to {}",
        stats.total_posts,
        args.output.display()
    );
    Ok(())
}
