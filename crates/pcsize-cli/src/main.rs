use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pcsize_cli::{inspect, merge, verify};
use pcsize_core::config::{default_config_path, PcsizeConfig};
use pcsize_protocol::wire::{read_envelope_file, write_envelope_file};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pcsize")]
#[command(about = "pcsize - offline pipeline cache sizing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a recorded envelope
    Inspect {
        /// Envelope file
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compute the reservation for one or more recorded envelopes
    Size {
        /// Envelope files (shards are merged first)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write the re-sized envelope here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,

        /// Decode threads
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Merge shard envelopes into one re-sized envelope
    Merge {
        /// Shard envelope files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Merged envelope file
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,

        /// Decode threads
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,
    },

    /// Check an envelope's reservation against its ledgers
    Verify {
        /// Envelope file
        input: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    pcsize_common::init_logging();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns `Ok(false)` when the command ran but found problems.
fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Inspect { input, json } => {
            let envelope = read_envelope_file(&input)
                .with_context(|| format!("failed to read envelope {}", input.display()))?;
            let summary = inspect::summarize(&envelope);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                inspect::print_summary_pretty(&summary);
            }
        }

        Commands::Size {
            inputs,
            output,
            config,
            jobs,
            json,
        } => {
            let config = load_config(config);
            let merged = merge::merge_files(&inputs, jobs)?;
            let envelope = merged
                .into_envelope(&config.sizing)
                .context("failed to size reservation")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&envelope.reservation)?);
            } else {
                inspect::print_reservation_pretty(&envelope.reservation);
            }
            if let Some(path) = output {
                write_envelope_file(&path, envelope, config.output.compress)
                    .with_context(|| format!("failed to write envelope {}", path.display()))?;
                info!("wrote {}", path.display());
            }
        }

        Commands::Merge {
            inputs,
            output,
            config,
            jobs,
        } => {
            let config = load_config(config);
            let merged = merge::merge_files(&inputs, jobs)?;
            let envelope = merged
                .into_envelope(&config.sizing)
                .context("failed to size merged reservation")?;
            write_envelope_file(&output, envelope, config.output.compress)
                .with_context(|| format!("failed to write envelope {}", output.display()))?;
            info!("merged {} shard(s) into {}", inputs.len(), output.display());
        }

        Commands::Verify {
            input,
            config,
            json,
        } => {
            let config_path = config.unwrap_or_else(default_config_path);
            let failed = verify::run_verify(&input, &config_path, json)?;
            return Ok(!failed);
        }
    }

    Ok(true)
}

fn load_config(path: Option<String>) -> PcsizeConfig {
    let path = path.unwrap_or_else(default_config_path);
    PcsizeConfig::load_or_default(&path)
}
