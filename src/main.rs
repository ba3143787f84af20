use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bridgesim::{
    annotation::PinState,
    config::{ConfigLoader, ServerConfig},
    rng::RngManager,
    targeting,
    traffic::{Region, TrafficGenerator},
    web,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bridge traffic simulation server")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run the room server
    Serve {
        /// Path to a YAML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,

        /// Override the starting region of new rooms
        #[arg(long)]
        region: Option<Region>,

        /// Override the traffic tick interval in seconds
        #[arg(long)]
        tick_interval: Option<f64>,

        /// Seed every room's random streams
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the traffic generator headless and print each tick
    Simulate {
        #[arg(long, default_value = "mid_rim")]
        region: Region,

        #[arg(long, default_value_t = 20)]
        ticks: u64,

        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.mode {
        Mode::Serve {
            config,
            host,
            port,
            region,
            tick_interval,
            seed,
        } => {
            let mut config = match config {
                Some(path) => ConfigLoader::new(".").load(path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(region) = region {
                config.initial_region = region;
            }
            if let Some(secs) = tick_interval {
                config.tick_interval_secs = secs;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            config.validate()?;
            init_tracing(&config.log_level);

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(web::run(config))
        }
        Mode::Simulate {
            region,
            ticks,
            seed,
        } => {
            init_tracing("info");
            simulate(region, ticks, seed);
            Ok(())
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn simulate(region: Region, ticks: u64, seed: Option<u64>) {
    let mut rng = RngManager::new(seed);
    let pins = PinState::new();
    let mut traffic = TrafficGenerator::new(region, &mut rng.stream("traffic"));
    println!(
        "{} (arrival rate {}, target {}): {} ships at start",
        region,
        region.arrival_rate(),
        region.target_population(),
        traffic.ships().len()
    );
    for _ in 0..ticks {
        let report = traffic.tick(|id| pins.is_pinned(id), &mut rng.stream("traffic"));
        println!(
            "tick {:>4}: +{} arrived, -{} departed, {} ships",
            report.tick,
            report.arrived.len(),
            report.departed.len(),
            report.population
        );
    }
    let targets = targeting::project(traffic.ships(), &pins, &mut rng.stream("targeting"));
    println!("Targeting {} of {} contacts:", targets.len(), traffic.ships().len());
    for target in targets {
        println!(
            "  {} {:<32} {:>6.1} deg {:>6.0} km {:?}/{:?}",
            target.ship_id,
            target.designation.as_deref().unwrap_or("unknown"),
            target.bearing_deg,
            target.distance,
            target.faction,
            target.threat
        );
    }
}
