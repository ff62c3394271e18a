use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use sydney_events_scraper::config::Config;
use sydney_events_scraper::pipeline::{IngestService, Trigger};
use sydney_events_scraper::scheduler::Scheduler;
use sydney_events_scraper::server::{self, AppState};
use sydney_events_scraper::storage::{InMemoryStorage, SqliteStorage, Storage};
use sydney_events_scraper::types::EventFilter;
use sydney_events_scraper::{logging, metrics, queries};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sydney_events_scraper")]
#[command(about = "Ingests Sydney events from Eventbrite and serves them over HTTP")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Keep events in memory instead of the SQLite database
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the events API and run scheduled ingestion
    Serve {
        #[arg(long)]
        port: Option<u16>,
        /// Do not ingest at startup or on the interval
        #[arg(long)]
        no_schedule: bool,
    },
    /// Run one ingestion pass and print its summary
    Ingest,
    /// Print a page of stored events as JSON
    Events {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        featured: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 12)]
        limit: u32,
    },
    /// Print the distinct event categories
    Categories,
    /// Mark an event as featured, or clear the flag with --off
    Feature {
        id: Uuid,
        #[arg(long)]
        off: bool,
    },
}

fn open_storage(config: &Config, in_memory: bool) -> anyhow::Result<Arc<dyn Storage>> {
    if in_memory {
        warn!("using in-memory storage; events are lost on exit");
        return Ok(Arc::new(InMemoryStorage::new()));
    }
    let path = &config.storage.database_path;
    let storage = SqliteStorage::open(path)
        .with_context(|| format!("failed to open event store at {}", path.display()))?;
    Ok(Arc::new(storage))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("failed to load configuration")?;
    if let Some(port) = config.metrics.port {
        metrics::init_metrics(port);
    }

    let storage = open_storage(&config, cli.in_memory)?;

    match cli.command {
        Commands::Serve { port, no_schedule } => {
            let service = Arc::new(IngestService::eventbrite(&config.scraper, storage)?);
            if no_schedule {
                info!("scheduled ingestion disabled");
            } else {
                Scheduler::new(Arc::clone(&service), config.scraper.interval()).spawn();
            }
            let port = port.unwrap_or(config.server.port);
            server::start_server(AppState::new(service), port)
                .await
                .context("HTTP server failed")?;
        }
        Commands::Ingest => {
            let service = IngestService::eventbrite(&config.scraper, storage)?;
            let summary = service.run(Trigger::Manual).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.is_success() {
                anyhow::bail!(summary.message());
            }
        }
        Commands::Events {
            category,
            search,
            featured,
            page,
            limit,
        } => {
            let filter = EventFilter {
                category,
                search,
                featured,
                page,
                limit,
            };
            let page = queries::list_events(storage.as_ref(), &filter).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Categories => {
            for category in queries::categories(storage.as_ref()).await? {
                println!("{category}");
            }
        }
        Commands::Feature { id, off } => {
            if !storage.set_featured(id, !off).await? {
                anyhow::bail!("no event with id {id}");
            }
            info!(%id, featured = !off, "updated featured flag");
        }
    }

    Ok(())
}
