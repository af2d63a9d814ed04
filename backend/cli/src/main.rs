mod analyze_cmd;
mod ask_cmd;
mod config;
mod config_cmd;
mod render;
mod session;
mod upload_cmd;
mod watch_cmd;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use assetlens_logging::{init_logger, LogTarget};
use assetlens_media::LocalUploadStore;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "assetlens")]
#[command(about = "AssetLens: equipment inspection from photos, camera frames and questions")]
#[command(version)]
struct Cli {
    /// Machine id used to look up equipment documentation
    #[arg(long, global = true)]
    machine: Option<String>,

    /// Config file (default: $ASSETLENS_CONFIG_DIR/config.yaml or ~/.assetlens/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single image
    Analyze { image: PathBuf },
    /// Ask a question about the equipment
    Ask {
        text: String,
        /// Speak the reply
        #[arg(long)]
        voice: bool,
    },
    /// Interactive session on stdin
    Chat {
        #[arg(long)]
        voice: bool,
    },
    /// Watch a directory and analyze its newest image as a camera feed
    Watch {
        dir: PathBuf,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Store an image or PDF; images are analyzed
    Upload { file: PathBuf },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config with secrets masked
    Show,
    /// Validate the effective config
    Check,
    /// Write a starter config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = config::resolve_path(cli.config.as_deref());

    if let Commands::Config { action: ConfigAction::Init } = &cli.command {
        return config_cmd::init(&path).await;
    }

    let cfg = config::load(&path).await?;
    let logging = cfg.logging.clone().unwrap_or_default();
    init_logger(
        logging.dir.as_deref().map(Path::new),
        logging.level.as_deref().unwrap_or("info"),
        LogTarget::Stderr,
    );
    info!(config = %path.display(), "AssetLens starting");

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => config_cmd::show(&cfg),
            ConfigAction::Check => config_cmd::check(&path, &cfg).await,
            ConfigAction::Init => Ok(()),
        };
    }

    let pipeline = session::build(&cfg, cli.machine.clone())?;

    match cli.command {
        Commands::Analyze { image } => analyze_cmd::run(&pipeline, &image).await?,
        Commands::Ask { text, voice } => ask_cmd::ask(&pipeline, &text, voice).await?,
        Commands::Chat { voice } => ask_cmd::chat(&pipeline, voice).await?,
        Commands::Watch { dir, interval_ms } => {
            let interval = interval_ms
                .or(cfg.camera.as_ref().and_then(|c| c.interval_ms))
                .unwrap_or(1000);
            watch_cmd::run(&pipeline, &dir, Duration::from_millis(interval)).await?
        }
        Commands::Upload { file } => {
            let root = cfg.uploads.as_ref().and_then(|u| u.dir.clone()).unwrap_or_else(|| "uploads".into());
            upload_cmd::run(&pipeline, &LocalUploadStore::new(root), &file).await?
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
