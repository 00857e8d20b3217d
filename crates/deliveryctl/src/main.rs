//! deliveryctl - command-line front end for the delivery backend
//!
//! Opens the on-disk store, wires up every service and runs one
//! subcommand against it. Commands that act for a user default to the
//! logged-in session.

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use delivery_config::load_or_default;
use delivery_core::{DeliveryApp, LogNotifier};
use delivery_store::SqliteStore;
use delivery_util::{STORE_FILENAME, default_config_path};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

/// deliveryctl - manage the local delivery store
#[derive(Parser, Debug)]
#[command(name = "deliveryctl")]
#[command(about = "Accounts, cart, orders and coupons of the delivery client", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/delivery/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set DELIVERY_DATA_DIR env var)
    #[arg(short, long, env = "DELIVERY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Act as this user instead of the logged-in one
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

fn open_app(args: &Args) -> Result<DeliveryApp> {
    let mut settings = load_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(dir) = &args.data_dir {
        settings.app.data_dir = dir.clone();
    }

    let db_path = settings.app.data_dir.join(STORE_FILENAME);
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open store at {:?}", db_path))?;

    info!(db_path = %db_path.display(), "Store opened");

    DeliveryApp::new(settings, Arc::new(store), Arc::new(LogNotifier))
        .context("Failed to initialize delivery app")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "deliveryctl starting");

    let app = open_app(&args)?;
    commands::run(&app, args.user.as_deref(), args.command).await
}
