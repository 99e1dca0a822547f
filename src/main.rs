use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use isocity::cli::commands;
use isocity::config::simulation::SimulationConfig;

#[derive(Parser)]
#[command(name = "isocity")]
#[command(about = "An isometric city-building simulation: tiles, resources, events and wildlife")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation loop against the saved city
    Run {
        /// Stop after this many ticks instead of waiting for ctrl-c
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Show resources, tiles, events and notices of the saved city
    Inspect,

    /// Write the map as JSON
    Export {
        #[arg(short, long, default_value = "city-map.json")]
        output: PathBuf,
    },

    /// Replace the map with an exported JSON file
    Import {
        file: PathBuf,
    },

    /// Change the canvas size multiplier (1, 2, 4 or 8)
    Resize {
        #[arg(short, long)]
        multiplier: u32,
    },

    /// Replace the map with the built-in campus layout
    Layout,

    /// Buy and place a tile
    Place {
        x: usize,
        y: usize,
        tile: u32,
        #[arg(short, long, default_value_t = 0)]
        variant: i32,
    },

    /// Answer an event; picks the best option when none is given
    Respond {
        event: u64,
        #[arg(short, long)]
        option: Option<usize>,
    },
}

fn init_logging(config: &SimulationConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match SimulationConfig::from_file_or_default(Path::new(&cli.config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config);

    let outcome = match cli.command {
        Commands::Run { ticks } => commands::run_simulation(&config, ticks).await,
        Commands::Inspect => commands::inspect(&config),
        Commands::Export { output } => commands::export(&config, &output),
        Commands::Import { file } => commands::import(&config, &file),
        Commands::Resize { multiplier } => commands::resize(&config, multiplier),
        Commands::Layout => commands::layout(&config),
        Commands::Place { x, y, tile, variant } => commands::place(&config, x, y, tile, variant),
        Commands::Respond { event, option } => commands::respond(&config, event, option),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
