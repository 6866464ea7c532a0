use anyhow::{Context, Result};
use clap::Parser;
use linkdex_core::IndexStore;
use server::build_app_with_store;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "server", about = "Serve search over a crawl index")]
struct Args {
    /// Index store directory
    #[arg(long, default_value = "./index")]
    db: String,
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Token for the admin endpoints; falls back to ADMIN_TOKEN
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let store = IndexStore::open(&args.db).with_context(|| format!("opening index store at {}", args.db))?;
    let stats = store.stats()?;
    tracing::info!(
        db = %args.db,
        indexed_pages = stats.indexed_pages,
        ranked_pages = stats.ranked_pages,
        "index loaded"
    );
    if args.admin_token.is_none() {
        tracing::warn!("no admin token set, /admin endpoints are disabled");
    }

    let app = build_app_with_store(store.clone(), args.admin_token);
    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    store.flush()?;
    tracing::info!("server stopped");
    Ok(())
}
