use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use livecheck_core::{ChallengeSequencer, LivenessConfig};
use livecheck_engine::env_config;
use tracing_subscriber::EnvFilter;

mod replay;

#[derive(Parser)]
#[command(name = "livecheck", version, about = "Active liveness session tools")]
struct Cli {
    /// TOML configuration file; `LIVECHECK_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded session trace through the frame pipeline.
    Replay {
        trace: PathBuf,
        /// Seed for challenge generation (random if omitted).
        #[arg(long)]
        seed: Option<u64>,
        /// Emit one JSON frame report per line instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print a generated challenge sequence.
    Challenges {
        #[arg(long)]
        seed: Option<u64>,
        /// Number of sequences to generate.
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Replay { trace, seed, json } => {
            let trace = replay::load_trace(&trace)?;
            let outcome = replay::run(config, trace, seed).await?;

            for report in &outcome.reports {
                if json {
                    println!("{}", serde_json::to_string(report)?);
                    continue;
                }
                for event in &report.events {
                    println!("{}", replay::describe(event));
                }
            }

            if !json {
                if let Some(last) = outcome.reports.last() {
                    println!(
                        "final: state={:?} progress={:.2} status=\"{}\"",
                        last.status.state, last.status.progress, last.status.status_message
                    );
                }
            }

            Ok(match outcome.success {
                Some(true) => ExitCode::SUCCESS,
                Some(false) => ExitCode::from(1),
                None => ExitCode::from(2),
            })
        }
        Command::Challenges { seed, count } => {
            let mut sequencer =
                seed.map_or_else(ChallengeSequencer::new, ChallengeSequencer::from_seed);
            for _ in 0..count {
                let line: Vec<String> = sequencer
                    .generate(&config)
                    .iter()
                    .map(|c| format!("{} ({})", c.kind, c.instruction))
                    .collect();
                println!("{}", line.join(", "));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Defaults, then the TOML file, then environment overrides.
fn load_config(path: Option<&Path>) -> Result<LivenessConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => LivenessConfig::default(),
    };
    env_config::apply_env(&mut config);
    config.validate().context("invalid liveness configuration")?;
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}
