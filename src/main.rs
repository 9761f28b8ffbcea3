use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use feed_metadata::db::Database;
use feed_metadata::graph::{Entity, Feed};
use feed_metadata::schema::TableSetup;
use feed_metadata::status::{ClusterManagerBuilder, ClusterManagerConfig, StatusClient};

#[derive(Parser)]
#[command(name = "feedmeta")]
#[command(about = "Feed metadata graph and table schema derivation")]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the metadata database
    Migrate,
    /// List feeds with their category, state and schedule
    Feeds,
    /// Derive DDL fragments from a table setup JSON file
    Derive {
        /// Table setup JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Store the derived strings on this feed
        #[arg(long)]
        feed: Option<Uuid>,
    },
    /// Report cluster and service health from the cluster manager
    Status,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "feed_metadata=info".into()),
    );

    // stdout carries command output
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<Database> {
    let db = match path {
        Some(path) => Database::open(path)?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Migrate => {
            open_database(cli.db)?;
            tracing::info!("Metadata database is up to date");
        }
        Commands::Feeds => {
            let db = open_database(cli.db)?;
            for feed in Feed::list(&db)? {
                let name = match feed.qualified_name() {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!(feed = %feed.id(), error = %e, "Skipping feed");
                        continue;
                    }
                };
                println!(
                    "{}  {:<40} {:<9} {}",
                    feed.id(),
                    name,
                    feed.state()?.as_str(),
                    feed.schedule_period()?.unwrap_or_default()
                );
            }
        }
        Commands::Derive { input, feed } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let mut setup: TableSetup = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", input.display()))?;
            setup.update_metadata_field_values()?;

            if let Some(feed_id) = feed {
                let db = open_database(cli.db)?;
                let feed = Feed::require(&db, feed_id)?;
                feed.store_derived_schema(&setup.derived)?;
                tracing::info!(feed = %feed_id, "Stored derived table metadata");
            }

            println!("{}", serde_json::to_string_pretty(&setup.derived)?);
        }
        Commands::Status => {
            let config = ClusterManagerConfig::from_env()?;
            let client = StatusClient::new(ClusterManagerBuilder::new(config));
            let Some(resource) = client.get_resource().await else {
                anyhow::bail!("cluster manager is unavailable");
            };

            println!("API {}", resource.version());
            for cluster in resource.clusters().await? {
                println!("{}", cluster.display_name.as_deref().unwrap_or(&cluster.name));
                for service in resource.services(&cluster.name).await? {
                    println!(
                        "  {:<24} {:<10} {}",
                        service.name,
                        service.service_state.as_deref().unwrap_or("UNKNOWN"),
                        service.health_summary.as_deref().unwrap_or("UNKNOWN")
                    );
                }
            }
        }
    }

    Ok(())
}
