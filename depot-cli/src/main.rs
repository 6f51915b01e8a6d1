use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(about = "Depot - priority/weight routed file storage")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $DEPOT_CONFIG_FILE)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file and print the URI it can be fetched from
    Store {
        /// File to store
        file: PathBuf,
    },

    /// Probe every configured backend and report readiness
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => match std::env::var(depot::CONFIG_ENV) {
            Ok(path) => PathBuf::from(path),
            Err(_) => bail!(
                "no configuration: pass --config or set {}",
                depot::CONFIG_ENV
            ),
        },
    };

    match cli.command {
        Commands::Store { file } => {
            tracing::info!("storing {} via {}", file.display(), config_path.display());
            let source = depot::FileSource::open(&file).await?;
            let uri = depot::store_with_config(&config_path, &source).await?;
            println!("{uri}");
        }

        Commands::Check => {
            let registry = Arc::new(depot::BackendRegistry::builtin());
            let config = depot::Config::load(&config_path, &registry)?;

            let mut unavailable = 0usize;
            for descriptor in &config.backends {
                let mut backend =
                    registry.construct(&descriptor.kind, Arc::clone(descriptor))?;
                let ready =
                    tokio::time::timeout(config.connect_timeout, backend.prepare())
                        .await
                        .unwrap_or(Ok(false))?;
                println!(
                    "{:<24} priority={:<3} weight={:<5} {}",
                    descriptor.name,
                    descriptor.priority,
                    descriptor.weight,
                    if ready { "ready" } else { "unavailable" }
                );
                if !ready {
                    unavailable += 1;
                }
            }

            if unavailable > 0 {
                bail!("{unavailable} backend(s) unavailable");
            }
        }
    }

    Ok(())
}
