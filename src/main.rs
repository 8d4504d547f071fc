//! Switchboard Server
//!
//! Run with: cargo run --bin switchboard
//!
//! # Configuration
//!
//! Settings come from `--config <path>` or the first config.toml found in
//! the usual locations, then environment overrides, then command-line flags.
//! - `SWITCHBOARD_HOST`, `SWITCHBOARD_PORT`: Listen address (default: 0.0.0.0:12345)
//! - `SWITCHBOARD_MAILBOX_CAPACITY`: Per-client outbound queue size (default: 256)
//! - `SWITCHBOARD_LOG_LEVEL`, `SWITCHBOARD_LOG_FORMAT`: Logging (default: info, pretty)
//! - `RUST_LOG`: Full filter directive, takes precedence over the log level

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use switchboard::api::{serve, AppState};
use switchboard::config::{generate_default_config, Config, LoggingConfig};
use switchboard::websocket::Hub;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time WebSocket broadcast hub")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broadcast server (default)
    Serve,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Config { output }) = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("Failed to write config to {:?}", path))?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let (mut config, source) = match &cli.config {
        Some(path) => (Config::load_with_env(path)?, Some(path.clone())),
        None => Config::load_default()?,
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(&config.logging);

    tracing::info!("Starting Switchboard v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }
    tracing::info!(
        mailbox_capacity = config.hub.mailbox_capacity,
        "Hub configured"
    );

    let hub = Hub::spawn(config.hub.clone());
    let state = AppState::new(hub, config.server.clone());

    serve(state, &config.server).await?;

    tracing::info!("Switchboard stopped");
    Ok(())
}

/// Install the global tracing subscriber
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("switchboard={},tower_http=info", logging.level))
    });

    let (pretty, json) = if logging.format == "json" {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}
