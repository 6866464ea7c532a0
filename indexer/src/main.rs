use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linkdex_core::pagerank::{compute_page_rank, PageRankConfig};
use linkdex_core::query::{ScoreWeights, Searcher, DEFAULT_LIMIT};
use linkdex_core::IndexStore;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Maintain and query the crawl index", long_about = None)]
struct Cli {
    /// Index store directory
    #[arg(long, global = true, default_value = "./index")]
    db: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty store (no-op on an existing one)
    Init,
    /// Recompute PageRank over the stored link graph
    Rank {
        #[arg(long, default_value_t = 0.85)]
        damping: f64,
        #[arg(long, default_value_t = 0.15)]
        baseline: f64,
        #[arg(long, default_value_t = 20)]
        iterations: usize,
    },
    /// Run a query and print `score<TAB>url` lines
    Query {
        /// Query words; a page must contain all of them
        #[arg(required = true)]
        words: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        /// Weight of the stored PageRank score
        #[arg(long, default_value_t = 0.0)]
        page_rank_weight: f64,
        /// Weight of the anchor-text score
        #[arg(long, default_value_t = 0.0)]
        link_text_weight: f64,
    },
    /// Print store counters as JSON
    Stats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let store = IndexStore::open(&cli.db).with_context(|| format!("opening index store at {}", cli.db))?;

    match cli.command {
        Commands::Init => {
            let meta = store.meta()?;
            tracing::info!(db = %cli.db, version = meta.version, created_at = %meta.created_at, "store ready");
        }
        Commands::Rank { damping, baseline, iterations } => {
            let summary = compute_page_rank(&store, &PageRankConfig { damping, baseline, iterations })?;
            print_json(&summary)?;
        }
        Commands::Query { words, limit, page_rank_weight, link_text_weight } => {
            let weights = ScoreWeights { page_rank: page_rank_weight, link_text: link_text_weight, ..Default::default() };
            let hits = Searcher::new(&store).with_weights(weights).query(&words.join(" "), limit)?;
            if hits.is_empty() {
                eprintln!("None found");
            }
            for hit in hits {
                println!("{:.6}\t{}", hit.score, hit.url);
            }
        }
        Commands::Stats => print_json(&store.stats()?)?,
    }
    store.flush()?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
