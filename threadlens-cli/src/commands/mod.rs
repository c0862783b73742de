pub mod authors;
pub mod export;
pub mod load;
pub mod query;
pub mod stats;
pub mod trends;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;

use threadlens_core::config::ThreadlensConfig;
use threadlens_core::engine::AnalyticsEngine;
use threadlens_core::store::SqliteStore;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a JSON post dataset into the database
    Load(load::LoadArgs),
    /// Run a filtered, sorted, paginated query
    Query(query::QueryArgs),
    /// Per-author leaderboard with trend and tier
    Authors(authors::AuthorsArgs),
    /// Dataset summary and engagement metrics
    Stats(stats::StatsArgs),
    /// Posting activity over time, with a fitted trend line
    Trends(trends::TrendsArgs),
    /// Export the full dataset back out as JSON
    Export(export::ExportArgs),
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Load(args) => load::run(args).await,
        Command::Query(args) => query::run(args).await,
        Command::Authors(args) => authors::run(args).await,
        Command::Stats(args) => stats::run(args).await,
        Command::Trends(args) => trends::run(args).await,
        Command::Export(args) => export::run(args).await,
    }
}

/// Load config from `--config` if given, else defaults.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<ThreadlensConfig> {
    match path {
        Some(p) => ThreadlensConfig::load_from(p)
            .with_context(|| format!("Cannot read config: {}", p.display())),
        None => Ok(ThreadlensConfig::default()),
    }
}

/// Open the store at `db` and wrap it in an engine.
pub(crate) fn open_engine(db: &Path, config: Option<&Path>) -> anyhow::Result<AnalyticsEngine> {
    let config = load_config(config)?;
    let store = SqliteStore::open(db)
        .map(Arc::new)
        .with_context(|| format!("Cannot open database: {}", db.display()))?;
    Ok(AnalyticsEngine::new(store, config))
}
