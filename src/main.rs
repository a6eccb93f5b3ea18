//! dirsum CLI - directory tree digest utility
//!
//! Scans a directory, hashes every regular file in parallel and prints one
//! digest for the whole tree, saving it into a per-run session folder.

use anyhow::Context;
use clap::Parser;
use dirsum::config::{CliArgs, DigestConfig, OutputFormat};
use dirsum::core::{DigestEngine, DigestReport};
use dirsum::error::DigestError;
use dirsum::progress::ProgressReporter;
use dirsum::session::Session;
use dirsum::tree::validate_root;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit code when the run was interrupted
const EXIT_CANCELLED: i32 = 130;
/// Exit code when the digest was computed but could not be saved
const EXIT_OUTPUT: i32 = 2;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Handle result
    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        let code = match e.downcast_ref::<DigestError>() {
            Some(DigestError::Cancelled) => EXIT_CANCELLED,
            Some(DigestError::OutputWrite { .. }) => EXIT_OUTPUT,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = DigestConfig::from_cli(&args).map_err(DigestError::config)?;
    validate_root(&config.root)?;

    let base = match &config.output_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Cannot determine current directory")?,
    };
    let session = Session::create(&base)?;
    let log_path = config.log_file.clone().unwrap_or_else(|| session.log_path());
    init_logging(args.verbose, &log_path)?;

    if !args.quiet && config.output_format == OutputFormat::Text {
        println!("Session: {}", session.id());
    }
    info!(session = %session.id(), started = ?session.started_at(), "Session started");
    info!(root = %config.root.display(), algorithm = %config.algorithm, "Working directory");

    let progress = if config.progress {
        ProgressReporter::new()
    } else {
        ProgressReporter::disabled()
    };
    let engine = DigestEngine::new(config.clone()).with_progress(progress);

    // SIGINT/SIGTERM only raise the flag; workers notice it at their next check
    engine.cancel_on_signals()?;

    let report = engine.execute().await?;
    print_report(&report, &config, args.quiet)?;

    if config.write_digest {
        let path = session
            .write_digest(report.algorithm, &report.digest)
            .context("Digest was computed but could not be saved")?;
        if !args.quiet && config.output_format == OutputFormat::Text {
            println!("Saved to {}", path.display());
        }
    }

    Ok(())
}

fn print_report(report: &DigestReport, config: &DigestConfig, quiet: bool) -> anyhow::Result<()> {
    match config.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text if quiet => println!("{}", report.digest),
        OutputFormat::Text => {
            report.print_summary();
            println!("\nHash: {}", report.digest);
        }
    }
    Ok(())
}

fn init_logging(verbose: u8, log_path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Cannot open log file {}", log_path.display()))?;

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dirsum={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();

    Ok(())
}
