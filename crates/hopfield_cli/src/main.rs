pub mod config;
pub mod memory;
pub mod session;

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{error, info, Level};

use crate::config::{Config, LogConfig};
use crate::memory::Memory;

#[derive(Parser)]
#[command(name = "hopfield")]
#[command(about = "Concurrent Hopfield associative memory")]
struct Cli {
    /// Config file (defaults to ./hopfield.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bound (ms) on every single exchange wait
    #[arg(long, global = true)]
    exchange_timeout_ms: Option<u64>,

    /// Block indefinitely at every exchange
    #[arg(long, global = true, conflicts_with = "exchange_timeout_ms")]
    no_timeout: bool,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the patterns, then recall from every probe
    Recall {
        /// Memory file (TOML)
        memory: PathBuf,
        /// Recall rounds per probe
        #[arg(long)]
        rounds: Option<usize>,
    },
    /// Store the patterns, then recall from random seeds
    Random {
        /// Memory file (TOML)
        memory: PathBuf,
        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Number of random seeds to try
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// Recall rounds per seed
        #[arg(long)]
        rounds: Option<usize>,
    },
    /// Store the patterns and print the learned weight matrix
    Weights {
        /// Memory file (TOML)
        memory: PathBuf,
    },
}

fn init_tracing(log: &LogConfig) {
    let level = Level::from_str(&log.level).unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    // Reports go to stdout, logs to stderr
    let installed = if log.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = installed {
        eprintln!("could not install log subscriber: {}", e);
    }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn execute(command: Commands, config: &Config) -> anyhow::Result<()> {
    let network = &config.network;
    match command {
        Commands::Recall { memory, rounds } => {
            let memory = Memory::load(&memory)?;
            let rounds = rounds.unwrap_or(network.recall_rounds);
            for report in session::recall_probes(&memory, network, rounds).await? {
                emit(&report)?;
            }
        }
        Commands::Random {
            memory,
            seed,
            count,
            rounds,
        } => {
            let memory = Memory::load(&memory)?;
            let rounds = rounds.unwrap_or(network.recall_rounds);
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            for report in session::recall_random(&memory, network, rounds, count, &mut rng).await? {
                emit(&report)?;
            }
        }
        Commands::Weights { memory } => {
            let memory = Memory::load(&memory)?;
            emit(&session::weights(&memory, network).await?)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(2);
        }
    };
    if let Some(ms) = cli.exchange_timeout_ms {
        config.network.exchange_timeout_ms = Some(ms);
    }
    if cli.no_timeout {
        config.network.exchange_timeout_ms = None;
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }

    init_tracing(&config.log);
    info!(config = ?config.network, "Starting hopfield");

    if let Err(e) = execute(cli.command, &config).await {
        error!(error = %format!("{:#}", e), "Fatal Error");
        std::process::exit(1);
    }
}
