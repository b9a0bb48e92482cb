mod config;
mod error;
mod extract;
mod models;
mod normalize;
mod pipeline;
mod scrapers;
mod server;
mod storage;
mod tasks;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use normalize::Normalizer;
use pipeline::Pipeline;
use scrapers::HttpFetcher;
use storage::{ListingStore, MemoryStore, PgListingStore};

#[derive(Parser)]
#[command(name = "listing-scout", about = "Real-estate listing scraper and loader")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP trigger (POST /scrape, GET /tasks/:id, GET /health)
    Serve,
    /// Run one scrape in the foreground
    Run {
        /// Number of index pages to walk
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Keep rows in memory and print them as JSON instead of loading the database
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("🏠 Listing Scout - {}{}", config.base_url, config.list_path);

    let fetcher = Arc::new(HttpFetcher::new(&config.user_agent, config.request_timeout)?);
    let normalizer = Normalizer::new(config.id_strategy, config.marketplace_id);

    match cli.command {
        Command::Serve => {
            let store = connect_store(&config).await?;
            let state = server::AppState {
                pipeline: Arc::new(Pipeline::new(fetcher, store, normalizer)),
                tasks: tasks::TaskRegistry::new(),
                config: Arc::new(config.clone()),
            };
            server::serve(config.bind_addr, state).await
        }
        Command::Run { pages, dry_run } => {
            let params = config.scrape_params(pages);

            if dry_run {
                let store = Arc::new(MemoryStore::new());
                let summary = Pipeline::new(fetcher, store.clone(), normalizer)
                    .run(&params)
                    .await?;
                let json = serde_json::to_string_pretty(&store.all().await)?;
                println!("{json}");
                info!("✅ Dry run: {} listings kept in memory", summary.rows_inserted);
                return Ok(());
            }

            let store = connect_store(&config).await?;
            let summary = Pipeline::new(fetcher, store, normalizer).run(&params).await?;
            info!(
                "✅ Loaded {} of {} listings into {}",
                summary.rows_inserted, summary.rows_normalized, config.db.table
            );
            Ok(())
        }
    }
}

async fn connect_store(config: &Config) -> Result<Arc<dyn ListingStore>> {
    let store = PgListingStore::connect(config.db.connect_options(), &config.db.table)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", config.db.host, config.db.port))?;
    info!("💾 Writing listings to {}", store.table());
    Ok(Arc::new(store))
}
