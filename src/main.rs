// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! mediashelf: metadata-driven media library organizer

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, info, warn};

use mediashelf::config::AppConfig;
use mediashelf::engine::{Engine, EngineEvent};
use mediashelf::executor::{ProgressItem, RunOutcome, RunState};
use mediashelf::preview::{category_counts, describe_counts};
use mediashelf::{ExtensionSet, Result};

/// mediashelf CLI - organize media files by their metadata
#[derive(Parser, Debug)]
#[command(name = "mediashelf")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Organize audio, video, image and ebook files by metadata", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "mediashelf.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show where a sample of files would be placed, without touching them
    Preview {
        /// Directory to scan
        source: PathBuf,

        /// Output directory used for full destination paths
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of files to analyze (default from config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show absolute paths instead of paths relative to the roots
        #[arg(long)]
        full_paths: bool,

        /// Hide these extensions from the result (e.g. --exclude .pdf)
        #[arg(long, num_args = 1..)]
        exclude: Vec<String>,
    },

    /// Copy or move every selected file into the output directory
    Organize {
        /// Directory to scan
        source: PathBuf,

        /// Directory receiving the organized tree
        output: PathBuf,

        /// Operation mode: copy or move (default from config)
        #[arg(short, long)]
        mode: Option<String>,

        /// Only organize these extensions (e.g. --only .mp3 .flac)
        #[arg(long, num_args = 1..)]
        only: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "mediashelf.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load(&cli.config)?;

    // Initialize tracing
    let filter = if cli.trace {
        "trace".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else if cli.quiet {
        "warn".to_string()
    } else {
        config.logging_level.clone()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("mediashelf v{}", env!("CARGO_PKG_VERSION"));
    }

    match cli.command {
        Commands::Preview { source, output, limit, full_paths, exclude } => {
            run_preview(config, source, output, limit, full_paths, exclude).await
        }
        Commands::Organize { source, output, mode, only } => {
            run_organize(config, source, output, mode, only).await
        }
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

/// Analyze a sample of the source and print the planned destinations
async fn run_preview(
    config: AppConfig,
    source: PathBuf,
    output: Option<PathBuf>,
    limit: Option<usize>,
    full_paths: bool,
    exclude: Vec<String>,
) -> Result<()> {
    let limit = limit.unwrap_or(config.preview_limit);
    let mut engine = Engine::new(config);
    engine.set_source_dir(source);
    if let Some(output) = output {
        engine.set_output_dir(output);
    }
    if full_paths {
        engine.set_show_full_paths(true);
    }

    let selection = exclude
        .iter()
        .fold(engine.config().selected_extensions(), |set, ext| set.without(ext));

    let engine = Arc::new(engine);
    stop_on_signal(Arc::clone(&engine));

    let outcome = engine.start_analyze(limit)?.drain(log_event).await?;

    let visible = engine.filter_preview(&selection);
    for record in &visible {
        println!("{}  ->  {}", record.display_source, record.display_destination);
    }

    println!();
    println!(
        "Showing {} of {} analyzed ({} matching files in source)",
        visible.len(),
        outcome.processed,
        outcome.total
    );
    if !visible.is_empty() {
        println!("Found: {}", describe_counts(&category_counts(visible.iter())));
    }
    if outcome.state == RunState::Cancelled {
        warn!("Preview was stopped before it finished");
    }

    Ok(())
}

/// Organize the whole source tree
async fn run_organize(
    config: AppConfig,
    source: PathBuf,
    output: PathBuf,
    mode: Option<String>,
    only: Vec<String>,
) -> Result<()> {
    let mut engine = Engine::new(config);
    engine.set_source_dir(source);
    engine.set_output_dir(output);
    if let Some(mode) = mode {
        engine.set_operation_mode(&mode)?;
    }
    if !only.is_empty() {
        engine.set_selected_extensions(&ExtensionSet::from_iter(&only));
    }
    engine.config().validate()?;

    let engine = Arc::new(engine);
    stop_on_signal(Arc::clone(&engine));
    info!("Organizer active. Press Ctrl+C to stop after the current file.");

    let outcome = engine.start_organize()?.drain(log_event).await?;
    print_outcome(&outcome);

    Ok(())
}

fn log_event(event: EngineEvent) {
    match event {
        EngineEvent::Status(message) => info!("{}", message),
        EngineEvent::Progress(progress) => match progress.item {
            ProgressItem::File(path) => {
                debug!("[{}/{}] {:?}", progress.processed, progress.total, path)
            }
            ProgressItem::Complete => debug!("Run finished after {} files", progress.processed),
        },
    }
}

fn print_outcome(outcome: &RunOutcome) {
    let label = match outcome.state {
        RunState::Cancelled => "Stopped",
        _ => "Done",
    };
    println!(
        "{}: {} of {} files placed, {} failed",
        label, outcome.succeeded, outcome.total, outcome.failed
    );
}

/// Ask the engine to stop on Ctrl+C or SIGTERM
fn stop_on_signal(engine: Arc<Engine>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, stopping..."),
            _ = terminate => info!("Received SIGTERM, stopping..."),
        }

        engine.stop();
    });
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            let default_config = AppConfig::default();
            default_config.save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Operation mode: {}", config.operation_mode);
            println!("  Selected extensions: {}", config.selected_extensions().len());
            println!("  Preview limit: {}", config.preview_limit);
        }
    }

    Ok(())
}
