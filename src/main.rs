use anyhow::Context;
use clap::{Parser, Subcommand};
use geonear::seeding::{self, SeedReport};
use geonear::{BackendSelector, Config, NearbyQuery, SelectedBackend, StorageMode};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON or TOML configuration file
    #[arg(short, long, global = true, env = "GEONEAR_CONFIG")]
    config: Option<PathBuf>,

    /// Override the storage mode (memory-geo, spatial-index, auto)
    #[arg(short, long, global = true)]
    mode: Option<StorageMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the cities dataset into the selected backend
    Seed {
        #[arg(short, long, env = "BIGCITIES_FILE_PATH", default_value = "data/big_cities.json")]
        source: PathBuf,

        /// Seed even when the backend already matches the source
        #[arg(long)]
        force: bool,
    },

    /// Find cities near a point
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,

        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,

        /// Search radius in meters
        #[arg(long, default_value_t = geonear::DEFAULT_DISTANCE_METERS)]
        distance: f64,

        #[arg(long, default_value_t = geonear::DEFAULT_MAX_RESULTS)]
        count: usize,

        #[arg(long, default_value_t = 0)]
        min_population: u64,
    },

    /// Check the health of the selected backend
    Health,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let mut config = config.apply_env()?;
    if let Some(mode) = args.mode {
        config.storage.mode = mode;
    }
    Ok(config)
}

fn run_seed(selected: &SelectedBackend, source: PathBuf, force: bool) -> anyhow::Result<()> {
    let backend = selected.backend.as_ref();

    if !force && !seeding::needs_seeding(backend, &source) {
        info!("{} backend is already seeded; use --force to reload", selected.kind());
        return Ok(());
    }

    let records = seeding::load_source(&source)
        .with_context(|| format!("Failed to read {}", source.display()))?;
    info!("Seeding {} locations from {}", records.len(), source.display());

    let SeedReport {
        attempted,
        succeeded,
        failed,
    } = seeding::seed(backend, &records);
    for city in failed.iter().take(20) {
        warn!("Not loaded: {}", city);
    }

    println!(
        "{}",
        serde_json::json!({
            "success": failed.is_empty(),
            "attempted": attempted,
            "succeeded": succeeded,
            "failed": failed.len(),
        })
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geonear=info,info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let selected = BackendSelector::new(config.storage).select()?;

    match args.command {
        Command::Seed { source, force } => run_seed(&selected, source, force)?,
        Command::Nearby {
            latitude,
            longitude,
            distance,
            count,
            min_population,
        } => {
            let query = NearbyQuery::new(latitude, longitude)
                .with_distance(distance)
                .with_count(count)
                .with_min_population(min_population);
            let result = selected.backend.find_nearby(&query)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "success": true,
                    "result": result,
                }))?
            );
        }
        Command::Health => {
            let healthy = selected.backend.health_check();
            println!(
                "{}",
                serde_json::json!({
                    "success": healthy,
                    "backend": selected.kind(),
                    "degraded": selected.degraded,
                })
            );
            if !healthy {
                anyhow::bail!("{} backend failed its health check", selected.kind());
            }
        }
    }

    Ok(())
}
