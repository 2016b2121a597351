//! bumperd - timed privilege grants
//!
//! `bumperd grant ...` manages grants from the command line;
//! `bumperd run` is the background service that takes expired ones back.

use anyhow::{Context, Result};
use bumper_config::{load_config, load_config_or_default};
use bumperd::{App, GrantCommands, Service};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// bumperd - Temporary privilege elevation with automatic expiry
#[derive(Parser, Debug)]
#[command(name = "bumperd")]
#[command(about = "Temporary privilege elevation with automatic expiry", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/bumper/config.toml)
    #[arg(short, long, env = "BUMPER_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory override (or set BUMPER_DATA_DIR env var)
    #[arg(short, long, env = "BUMPER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (default: info for `run`, warn otherwise)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Subject to act as (ID, login or email)
    #[arg(short, long, env = "BUMPER_ACTOR")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage grants
    #[command(subcommand)]
    Grant(GrantCommand),

    /// Run the expiry service
    Run,
}

#[derive(Subcommand, Debug)]
enum GrantCommand {
    /// Elevate a subject for a number of minutes
    Add {
        /// Subject ID, login or email
        subject: String,

        /// Duration in minutes (default from config)
        #[arg(short, long)]
        minutes: Option<u32>,
    },

    /// List stored grants with time remaining
    List,

    /// Revoke every expired grant now
    ClearExpired,

    /// Revoke a subject's grant regardless of expiry
    Revoke {
        /// Subject ID, login or email
        subject: String,
    },
}

fn init_logging(args: &Args) {
    let default_level = match args.command {
        Command::Run => "info",
        Command::Grant(_) => "warn",
    };
    let level = args.log_level.as_deref().unwrap_or(default_level);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn open_app(args: &Args) -> Result<App> {
    let mut policy = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let path = bumper_util::config_path_without_env();
            load_config_or_default(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?
        }
    };

    if let Some(data_dir) = &args.data_dir {
        policy.service.data_dir = data_dir.clone();
    }

    info!(
        data_dir = %policy.service.data_dir.display(),
        subject_count = policy.subjects.len(),
        "Configuration loaded"
    );

    App::open(policy)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args);

    if bumper_util::is_mock_time_active() {
        warn!(now = %bumper_util::now(), "Mock time is active, grants use a fake clock");
    }

    let app = open_app(&args)?;

    let report = match &args.command {
        Command::Run => {
            info!(version = env!("CARGO_PKG_VERSION"), "bumperd starting");
            Service::new(&app).run().await?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Grant(command) => {
            let commands = GrantCommands::new(&app.manager, &app.directory);
            let actor = args.actor.as_deref();
            let now = bumper_util::now();

            match command {
                GrantCommand::Add { subject, minutes } => {
                    commands.add(actor, subject, *minutes, now)
                }
                GrantCommand::List => commands.list(actor, now),
                GrantCommand::ClearExpired => commands.clear_expired(actor, now),
                GrantCommand::Revoke { subject } => commands.revoke(actor, subject),
            }
        }
    };

    report.print();
    Ok(ExitCode::from(report.exit_code() as u8))
}
