//! traffic-track: live traffic aggregation and swarm grid simulation.
//!
//! Single-binary Tokio application that:
//! 1. Fetches live traffic for a point or a grid from the configured provider
//! 2. Falls back to synthetic readings when no provider answers
//! 3. Serves the simulated intersection/road grid from a TTL cache
//! 4. Optionally runs the congestion-update and cleanup loops

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use aggregator::{ProviderSet, SyntheticGenerator, TrafficAggregator};
use common::{Error, SharedRng, TrafficConfig};
use store::{MemoryCredentialStore, MemoryGridStore, MemoryReadingStore};
use swarm::SwarmService;

/// Traffic aggregation service
#[derive(Parser)]
#[command(name = "traffic-track", about = "Live traffic aggregation and swarm grid simulation")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Seed for the random source (synthetic data and simulation).
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch live traffic for one point.
    Live {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Search radius in km.
        #[arg(long, default_value_t = 5.0)]
        radius: f64,
    },
    /// Fetch live traffic for a size × size grid around a centre.
    Grid {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long, default_value_t = 5.0)]
        radius: f64,
        #[arg(long, default_value_t = 3)]
        size: usize,
    },
    /// Print the swarm grid snapshot.
    Swarm,
    /// Re-seed the swarm grid with default data.
    Init,
    /// Redraw swarm congestion, then print the new snapshot.
    UpdateCongestion,
    /// Delete every swarm intersection and road.
    Clear,
    /// Purge readings and incidents past the retention window.
    Cleanup,
    /// Run the background loops until Ctrl+C.
    Run,
}

struct App {
    aggregator: Arc<TrafficAggregator>,
    swarm: Arc<SwarmService>,
}

async fn build_app(cfg: &TrafficConfig, rng: SharedRng) -> Result<App, Error> {
    let credentials = MemoryCredentialStore::new();
    if !cfg.api_key.trim().is_empty() {
        let seeded = credentials.save(&cfg.provider, &cfg.api_key).await?;
        info!(
            "Using credential for {} ({})",
            seeded.provider,
            seeded.masked_key()
        );
    } else {
        warn!("No TRAFFIC_API_KEY configured, live requests will use synthetic data");
    }

    let readings = MemoryReadingStore::new();
    let providers = ProviderSet::from_config(cfg, rng.clone())?;
    let aggregator = TrafficAggregator::new(
        Arc::new(credentials),
        Arc::new(readings.clone()),
        Arc::new(readings),
        providers,
        SyntheticGenerator::new(rng.clone()),
        cfg,
    );

    let swarm = SwarmService::new(Arc::new(MemoryGridStore::new()), cfg.swarm.clone(), rng);

    Ok(App {
        aggregator: Arc::new(aggregator),
        swarm: Arc::new(swarm),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(app: &App, cfg: &TrafficConfig, command: Command) -> Result<(), Error> {
    match command {
        Command::Live { lat, lng, radius } => {
            let reading = app.aggregator.fetch_live_traffic_data(lat, lng, radius).await?;
            print_json(&reading)
        }
        Command::Grid {
            lat,
            lng,
            radius,
            size,
        } => {
            let grid = app
                .aggregator
                .fetch_grid_traffic_data(lat, lng, radius, size)
                .await?;
            print_json(&grid)
        }
        Command::Swarm => {
            let snapshot = app.swarm.get_swarm_data().await?;
            print_json(snapshot.as_ref())
        }
        Command::Init => {
            let snapshot = app.swarm.initialize_default_data().await?;
            print_json(&snapshot)
        }
        Command::UpdateCongestion => {
            app.swarm.get_swarm_data().await?;
            app.swarm.update_congestion().await?;
            let snapshot = app.swarm.get_swarm_data().await?;
            print_json(snapshot.as_ref())
        }
        Command::Clear => {
            app.swarm.clear_all_data().await?;
            info!("Swarm data cleared");
            Ok(())
        }
        Command::Cleanup => {
            app.aggregator.cleanup_old_data().await;
            Ok(())
        }
        Command::Run => {
            run_loops(app, cfg).await;
            Ok(())
        }
    }
}

async fn run_loops(app: &App, cfg: &TrafficConfig) {
    if let Err(e) = app.swarm.get_swarm_data().await {
        error!("Initial swarm load failed: {}", e);
    }

    // Task 1: congestion updates
    let congestion_swarm = app.swarm.clone();
    let congestion_every = Duration::from_secs(cfg.timing.congestion_update_interval_secs);
    let congestion_handle = tokio::spawn(async move {
        loop {
            sleep(congestion_every).await;
            if let Err(e) = congestion_swarm.update_congestion().await {
                warn!("Congestion update failed: {}", e);
            }
        }
    });

    // Task 2: retention cleanup
    let cleanup_aggregator = app.aggregator.clone();
    let cleanup_every = Duration::from_secs(cfg.timing.cleanup_interval_secs);
    let cleanup_handle = tokio::spawn(async move {
        loop {
            sleep(cleanup_every).await;
            cleanup_aggregator.cleanup_old_data().await;
        }
    });

    info!(
        "🚦 traffic-track is running (congestion every {}s, cleanup every {}s). Press Ctrl+C to stop.",
        cfg.timing.congestion_update_interval_secs, cfg.timing.cleanup_interval_secs
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = congestion_handle => {
            error!("Congestion task exited: {:?}", r);
        }
        r = cleanup_handle => {
            error!("Cleanup task exited: {:?}", r);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "traffic_track=info,aggregator=info,swarm=info,store=info,\
                 google_roads_client=info,tomtom_client=info,here_client=info"
                    .into()
            }),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let rng = match cli.seed {
        Some(seed) => SharedRng::seeded(seed),
        None => SharedRng::from_entropy(),
    };

    let app = match build_app(&cfg, rng).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(&app, &cfg, cli.command).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::DataSource;

    #[tokio::test]
    async fn test_app_without_key_serves_synthetic_data() {
        let app = build_app(&TrafficConfig::default(), SharedRng::seeded(8))
            .await
            .expect("app should build");

        let reading = app
            .aggregator
            .fetch_live_traffic_data(51.5, -0.09, 2.0)
            .await
            .expect("reading");
        assert_eq!(reading.data_source, DataSource::Static);

        let snapshot = app.swarm.get_swarm_data().await.expect("swarm");
        assert_eq!(snapshot.intersections.len(), 81);
    }

    #[test]
    fn test_cli_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "traffic-track",
            "grid",
            "--lat",
            "51.505",
            "--lng",
            "-0.09",
            "--size",
            "4",
        ])
        .expect("cli should parse");

        match cli.command {
            Command::Grid { lng, size, radius, .. } => {
                assert_eq!(lng, -0.09);
                assert_eq!(size, 4);
                assert_eq!(radius, 5.0);
            }
            _ => panic!("expected grid subcommand"),
        }
    }
}
