//! Discord Container CLI
//!
//! CLI tool for checking URLs against the containment rules and replaying
//! browser scenarios through the engine.

mod simulate;

use std::fs;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dc_core::{ContainerConfig, DomainMatcher, PartitionId, PartitionResolver};

use crate::simulate::{run_simulation, SimulateOptions};

#[derive(Parser)]
#[command(name = "dc-cli")]
#[command(about = "Discord Container containment rules and scenario runner")]
struct Cli {
    /// Config file (JSON); built-in Discord defaults otherwise
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether URLs belong to the contained domain set
    Classify {
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Show which partition a navigation would be reopened in
    Resolve {
        /// Navigation URL
        url: String,

        /// Partition the tab currently runs under
        #[arg(short, long, default_value = dc_core::types::DEFAULT_PARTITION)]
        partition: String,

        /// Partition id of the container
        #[arg(short, long, default_value = "firefox-container-1")]
        target: String,
    },

    /// Print the effective configuration
    Config,

    /// Replay a JSON scenario against an in-memory browser
    Simulate {
        /// Scenario file
        #[arg(short, long)]
        input: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Classify { urls } => cmd_classify(&config, &urls),
        Commands::Resolve {
            url,
            partition,
            target,
        } => cmd_resolve(&config, &url, &partition, &target),
        Commands::Config => cmd_config(&config),
        Commands::Simulate { input } => run_simulation(SimulateOptions { config, input }),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&str>) -> Result<ContainerConfig, String> {
    let Some(path) = path else {
        return Ok(ContainerConfig::default());
    };

    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    ContainerConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

fn cmd_classify(config: &ContainerConfig, urls: &[String]) -> Result<(), String> {
    let matcher = DomainMatcher::new(&config.domains).map_err(|e| e.to_string())?;

    for url in urls {
        let verdict = if !dc_core::url::is_web_url(url) {
            "ignored"
        } else if matcher.classify(url) {
            "contained"
        } else {
            "outside"
        };
        println!("{:<10} {}", verdict, url);
    }

    Ok(())
}

fn cmd_resolve(config: &ContainerConfig, url: &str, partition: &str, target: &str) -> Result<(), String> {
    let matcher = DomainMatcher::new(&config.domains).map_err(|e| e.to_string())?;
    let resolver = PartitionResolver::new(
        matcher,
        PartitionId::new(target),
        config.default_partition.clone(),
    );

    match resolver.resolve(url, &PartitionId::new(partition)) {
        Some(moved) => println!("reopen in {}", moved),
        None => println!("allow"),
    }

    Ok(())
}

fn cmd_config(config: &ContainerConfig) -> Result<(), String> {
    let json = serde_json::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    println!("{}", json);
    Ok(())
}
