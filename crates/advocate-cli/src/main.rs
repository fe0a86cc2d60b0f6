//! `advocate` command line.
//!
//! Results go to stdout as JSON; logs and errors go to stderr.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use advocate_runtime::{Orchestrator, ProviderRegistry, RuntimeConfig, RuntimeError};

#[derive(Parser, Debug)]
#[command(name = "advocate")]
#[command(about = "Prepare for medical appointments with AI-generated questions and talking points")]
#[command(version)]
struct Cli {
    /// YAML config file
    #[arg(long, env = "ADVOCATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate questions to ask at an appointment
    Questions {
        #[arg(short, long, default_value = "")]
        symptoms: String,

        /// e.g. general, specialist, follow-up
        #[arg(short = 't', long, default_value = "")]
        appointment_type: String,

        #[arg(short = 'c', long, default_value = "")]
        concerns: String,
    },

    /// Generate talking points for an appointment
    TalkingPoints {
        #[arg(short, long, default_value = "")]
        symptoms: String,

        #[arg(short = 'c', long, default_value = "")]
        concerns: String,
    },

    /// Analyze a medical note (from a file, or stdin)
    Analyze {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show backend availability
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            if let Some(runtime_err) = err.downcast_ref::<RuntimeError>() {
                eprintln!("Hint: {}", runtime_err.hint());
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let orchestrator = Orchestrator::new(config, ProviderRegistry::with_defaults());

    let output = match cli.command {
        Commands::Questions {
            symptoms,
            appointment_type,
            concerns,
        } => serde_json::to_value(
            orchestrator
                .generate_questions(&symptoms, &appointment_type, &concerns)
                .await?,
        )?,

        Commands::TalkingPoints { symptoms, concerns } => serde_json::to_value(
            orchestrator
                .generate_talking_points(&symptoms, &concerns)
                .await?,
        )?,

        Commands::Analyze { file } => {
            let note = read_note(file)?;
            serde_json::to_value(orchestrator.analyze_note(&note).await?)?
        }

        Commands::Status => {
            if let Err(e) = orchestrator.initialize().await {
                tracing::warn!(error = %e, "Initialization failed");
            }
            serde_json::to_value(orchestrator.status())?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)
            .map_err(RuntimeError::from)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn read_note(file: Option<PathBuf>) -> anyhow::Result<String> {
    let note = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading note from stdin")?;
            buf
        }
    };

    if note.trim().is_empty() {
        bail!("note is empty");
    }
    Ok(note)
}

/// Distinct exit status per error kind.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RuntimeError>() {
        Some(RuntimeError::Configuration(_)) => 2,
        Some(RuntimeError::AllBackendsUnavailable) => 3,
        Some(RuntimeError::AllBackendsFailed { .. }) => 4,
        None => 1,
    }
}
