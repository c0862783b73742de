use std::path::PathBuf;

use clap::Args;

use threadlens_core::types::{Post, PostFilter, SortBy, SortOrder};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Path to the database file
    #[arg(long, default_value = "threadlens.db")]
    pub db: PathBuf,

    /// Path to a threadlens.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Filter by platform (e.g. reddit, hackernews)
    #[arg(long)]
    pub platform: Option<String>,

    /// Filter by source community
    #[arg(long)]
    pub source: Option<String>,

    /// Filter by author
    #[arg(long)]
    pub author: Option<String>,

    /// Full-text search over title and body
    #[arg(long)]
    pub search: Option<String>,

    /// Only posts at or after this unix timestamp
    #[arg(long)]
    pub since: Option<i64>,

    /// Only posts at or before this unix timestamp
    #[arg(long)]
    pub until: Option<i64>,

    /// Minimum score
    #[arg(long)]
    pub score_min: Option<i64>,

    /// Maximum score
    #[arg(long)]
    pub score_max: Option<i64>,

    /// Sort column: created_at, score, num_comments, title, author
    #[arg(long, default_value = "created_at")]
    pub sort: String,

    /// Sort direction: asc or desc
    #[arg(long, default_value = "desc")]
    pub order: String,

    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Rows per page
    #[arg(long, default_value_t = 20)]
    pub page_size: u32,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    pub format: String,
}

impl QueryArgs {
    fn to_filter(&self) -> PostFilter {
        PostFilter {
            platform: self.platform.clone(),
            source: self.source.clone(),
            author: self.author.clone(),
            search_term: self.search.clone(),
            date_from: self.since,
            date_to: self.until,
            score_min: self.score_min,
            score_max: self.score_max,
            sort_by: SortBy::parse(&self.sort),
            sort_order: if self.order.eq_ignore_ascii_case("asc") {
                SortOrder::Asc
            } else {
                SortOrder::Desc
            },
            page: self.page,
            page_size: self.page_size,
            ..PostFilter::default()
        }
    }
}

pub async fn run(args: QueryArgs) -> anyhow::Result<()> {
    let engine = super::open_engine(&args.db, args.config.as_deref())?;
    let filter = args.to_filter();

    // One recovery round before giving up.
    let page = match engine.query_posts(&filter).await {
        Ok(page) => page,
        Err(err) => {
            let registry = engine.recovery_registry();
            if registry.attempt_recovery_with_retries(&err).await {
                engine.query_posts(&filter).await?
            } else {
                return Err(err.into());
            }
        }
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.data.is_empty() {
        println!("No posts match (total {}).", page.total);
        return Ok(());
    }

    println!(
        "Page {}/{} — {} of {} posts{}",
        page.page,
        page.total.div_ceil(u64::from(page.page_size)).max(1),
        page.data.len(),
        page.total,
        if page.has_more { " (more available)" } else { "" },
    );
    println!("{:>7}  {:>5}  {:<18}  {}", "score", "cmts", "author", "title");
    for post in &page.data {
        print_row(post);
    }
    Ok(())
}

fn print_row(post: &Post) {
    let author = post.author.as_deref().unwrap_or("-");
    let title: String = post.title.chars().take(70).collect();
    println!(
        "{:>7}  {:>5}  {:<18}  {}",
        post.score, post.num_comments, author, title
    );
}
