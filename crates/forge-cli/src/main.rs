//! Forge - app-builder pipeline from the terminal
//!
//! - Streamed chat completions with cancel and supersede
//! - Build log streaming with artifact download links
//! - Debounced live preview rendered to a file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use forge_core::constants::http::DEFAULT_CHAT_MODEL;
use forge_core::{paths, ForgeConfig};

mod commands;

/// Forge - streamed chat, builds, and live preview
#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Streamed chat, build logs, and live preview for Forge projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides the config file and FORGE_BACKEND_URL)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Config file (defaults to ~/.forge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with a model; each line is a new turn
    Chat {
        /// Model to stream from
        #[arg(short, long, default_value = DEFAULT_CHAT_MODEL)]
        model: String,
    },

    /// Build a project and stream its log
    Build {
        /// Project id
        project: String,
    },

    /// Render stdin edits into a live preview file
    Preview {
        /// HTML file the preview is written to
        #[arg(short, long)]
        out: PathBuf,

        /// Language of the edited source (html, css, javascript, svg)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Read or write project files
    Files {
        #[command(subcommand)]
        action: FilesCommands,
    },
}

#[derive(Subcommand)]
enum FilesCommands {
    /// Print a project file
    Read { project: String, file: String },
    /// Replace a project file with stdin (or --from)
    Write {
        project: String,
        file: String,
        /// Read content from this local file instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
    },
}

/// Log to ~/.forge/logs/forge.log; stdout carries the streamed output
fn init_logging() {
    let log_dir = paths::logs_dir();
    std::fs::create_dir_all(&log_dir).ok();

    // Create null device path based on platform
    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let Ok(log_file) = std::fs::File::create(log_dir.join("forge.log"))
        .or_else(|_| std::fs::File::create(null_device))
    else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
}

/// Config file, then environment, then command-line flags
fn load_config(cli: &Cli) -> Result<ForgeConfig> {
    let path = cli.config.clone().unwrap_or_else(paths::config_file);
    let mut config = ForgeConfig::load_from_path(&path)?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(backend) = &cli.backend {
        config.backend_url = backend.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::info!("Using backend {}", config.backend_url);

    match cli.command {
        Commands::Chat { model } => commands::chat::run(&config, model).await,
        Commands::Build { project } => commands::build::run(&config, project).await,
        Commands::Preview { out, language } => {
            commands::preview::run(&config, out, language).await
        }
        Commands::Files { action } => match action {
            FilesCommands::Read { project, file } => {
                commands::files::read(&config, &project, &file).await
            }
            FilesCommands::Write {
                project,
                file,
                from,
            } => commands::files::write(&config, &project, &file, from).await,
        },
    }
}
