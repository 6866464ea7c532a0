use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crawler::{CrawlConfig, Crawler};
use linkdex_core::pagerank::{compute_page_rank, PageRankConfig};
use linkdex_core::IndexStore;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl the web breadth-first into a word-location index")]
struct Cli {
    /// Seed URLs
    #[arg(required_unless_present = "seeds_file")]
    seeds: Vec<String>,
    /// Path to a file with seed URLs (one per line, '#' comments allowed)
    #[arg(long)]
    seeds_file: Option<String>,
    /// Index store directory
    #[arg(long, default_value = "./index")]
    db: String,
    /// Number of link levels to follow; 1 indexes only the seeds
    #[arg(long, default_value_t = 2)]
    depth: usize,
    /// Concurrency (number of workers per depth level)
    #[arg(long, default_value_t = 16)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// Stop after indexing this many pages
    #[arg(long)]
    max_pages: Option<usize>,
    /// User-Agent string sent with every request
    #[arg(long, default_value = "linkdex-bot/0.1 (+https://example.com/bot)")]
    user_agent: String,
    /// Recompute PageRank once the crawl finishes
    #[arg(long, default_value_t = false)]
    rank: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let mut seeds = args.seeds.clone();
    if let Some(path) = &args.seeds_file {
        let file = File::open(path).with_context(|| format!("opening seeds file {path}"))?;
        for line in BufReader::new(file).lines() {
            let s = line?.trim().to_string();
            if s.is_empty() || s.starts_with('#') {
                continue;
            }
            seeds.push(s);
        }
    }
    if seeds.is_empty() {
        return Err(anyhow!("no seeds"));
    }

    let store = IndexStore::open(&args.db).with_context(|| format!("opening index store at {}", args.db))?;
    let config = CrawlConfig {
        concurrency: args.concurrency,
        fetch_timeout: Duration::from_secs(args.timeout_secs),
        max_pages: args.max_pages,
    };
    tracing::info!(seeds = seeds.len(), depth = args.depth, concurrency = args.concurrency, db = %args.db, "starting crawl");

    let crawler = Crawler::http(store.clone(), &args.user_agent, config)?;
    let report = crawler.crawl(&seeds, args.depth).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.rank {
        let summary = compute_page_rank(&store, &PageRankConfig::default())?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    store.flush()?;
    Ok(())
}
