//! BlackBox - Privacy-Preserving Agent Wrapper
//!
//! Command-line access to the redactor and to stored, attested outcomes.

use anyhow::{bail, Context, Result};
use blackbox::{
    config::BlackBoxConfig,
    privacy::Redactor,
    storage::{open_store, StorageKind},
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "blackbox")]
#[command(version)]
#[command(about = "Privacy-preserving wrapper for opaque agents")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BLACKBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count PII occurrences per pattern
    Scan {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Redact PII from text or JSON
    Redact {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show a stored outcome
    Outcome {
        /// Request id of the outcome
        request_id: String,
    },

    /// Verify the attestation chain of the configured store
    Verify,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (stderr, so command output stays clean)
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("blackbox={}", log_level).into());
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => BlackBoxConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BlackBoxConfig::default(),
    };
    config.apply_env();
    config.validate()?;

    match cli.command {
        Commands::Scan { file } => run_scan(&config, file.as_deref()).await?,
        Commands::Redact { file } => run_redact(&config, file.as_deref()).await?,
        Commands::Outcome { request_id } => show_outcome(&config, &request_id).await?,
        Commands::Verify => run_verify(&config).await?,
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            tokio::io::stdin().read_to_string(&mut input).await?;
            Ok(input)
        }
    }
}

fn build_redactor(config: &BlackBoxConfig) -> Result<Redactor> {
    let catalog = config.privacy.catalog()?;
    Ok(Redactor::new(Arc::new(catalog)))
}

async fn run_scan(config: &BlackBoxConfig, file: Option<&Path>) -> Result<()> {
    let redactor = build_redactor(config)?;
    let input = read_input(file).await?;
    let report = redactor.scan(&input);

    if report.is_clean() {
        println!("No PII found");
        return Ok(());
    }

    println!("{:<22} {:<16} {:>6}", "PATTERN", "TOKEN", "COUNT");
    for finding in &report.findings {
        println!(
            "{:<22} {:<16} {:>6}",
            finding.pattern, finding.token, finding.count
        );
    }
    println!();
    println!("Total: {}", report.total());
    Ok(())
}

async fn run_redact(config: &BlackBoxConfig, file: Option<&Path>) -> Result<()> {
    let redactor = build_redactor(config)?;
    let input = read_input(file).await?;

    // Structured input keeps its shape; anything else is redacted as text
    match serde_json::from_str::<serde_json::Value>(&input) {
        Ok(value) if value.is_object() || value.is_array() => {
            let redacted = redactor.redact(&value);
            println!("{}", serde_json::to_string_pretty(&redacted)?);
        }
        _ => print!("{}", redactor.redact_str(&input)),
    }
    Ok(())
}

async fn show_outcome(config: &BlackBoxConfig, request_id: &str) -> Result<()> {
    warn_if_ephemeral(config);
    let store = open_store(&config.storage).await?;
    let outcome = store.get(request_id).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_verify(config: &BlackBoxConfig) -> Result<()> {
    warn_if_ephemeral(config);
    let store = open_store(&config.storage).await?;
    let outcomes = store.list().await?;
    let verification = blackbox::attestation::verify_chain(&outcomes);

    println!("Outcomes: {}", verification.length);
    println!("Head:     {}", verification.head);
    match &verification.broken {
        None => {
            println!("  ✓ Attestation chain intact");
            Ok(())
        }
        Some(broken) => {
            println!(
                "  ✗ Chain broken at #{} ({}): {}",
                broken.index, broken.request_id, broken.reason
            );
            bail!("attestation chain verification failed")
        }
    }
}

fn warn_if_ephemeral(config: &BlackBoxConfig) {
    if config.storage.backend == StorageKind::Memory {
        tracing::warn!("Storage backend is 'memory'; no outcomes persist between runs");
    }
}

fn show_config(config: Option<&BlackBoxConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
