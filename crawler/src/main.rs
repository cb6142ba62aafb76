use anyhow::Result;
use clap::Parser;
use crawler::{CrawlConfig, Crawler, RevisitPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use trawl_core::{EnglishTokenizer, IndexSet, StoreOptions};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl a site into the persistent index")]
struct Cli {
    /// Seed URL the crawl starts from
    #[arg(long)]
    seed: String,
    /// Index root directory (one store per index is created below it)
    #[arg(long, default_value = "./db")]
    db: PathBuf,
    /// Maximum link depth below the seed
    #[arg(long, default_value_t = 2)]
    max_depth: usize,
    /// Maximum simultaneous fetches and probes
    #[arg(long, default_value_t = 2)]
    max_concurrency: usize,
    /// Whether pages reached again are fetched again
    #[arg(long, value_enum, default_value_t = RevisitPolicy::Skip)]
    revisit: RevisitPolicy,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent string used for every request
    #[arg(long, default_value = "trawl-bot/0.1 (+https://example.com/bot)")]
    user_agent: String,
    /// If true, only follow links that remain on the same host as the page
    #[arg(long, default_value_t = false)]
    same_host_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let config = CrawlConfig {
        max_depth: args.max_depth,
        max_concurrency: args.max_concurrency,
        revisit: args.revisit,
        timeout: Duration::from_secs(args.timeout_secs),
        user_agent: args.user_agent.clone(),
        same_host_only: args.same_host_only,
        ..CrawlConfig::default()
    };
    let indexes = Arc::new(IndexSet::open(&args.db, &StoreOptions::default())?);
    let crawler = Arc::new(Crawler::new(indexes.clone(), Arc::new(EnglishTokenizer), config)?);

    let outcome = tokio::select! {
        res = crawler.clone().crawl(&args.seed) => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };
    // dropping the crawl future aborts its task tree
    drop(crawler);

    let result = match outcome {
        Some(Ok(report)) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Some(Err(err)) => Err(anyhow::Error::from(err)),
        None => {
            tracing::warn!("interrupted, closing index stores");
            Ok(())
        }
    };

    // aborted tasks release their handles as the runtime drops them
    crawler::close_when_released(indexes, Duration::from_secs(5)).await?;
    result
}
