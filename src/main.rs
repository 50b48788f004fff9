//! CLI entry point for `tool-server`.
//!
//! # Usage
//!
//! Serve the mock stage over gRPC:
//! ```bash
//! tool-server serve --config config/tool_server.toml --port 50061
//! ```
//!
//! Print the effective configuration:
//! ```bash
//! tool-server check-config
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tool_server::command::ResultCode;
use tool_server::config::{ServerConfig, DEFAULT_CONFIG_PATH};
use tool_server::error::ToolServerError;
use tool_server::grpc::start_server;
use tool_server::instruments::MockStage;
use tool_server::logging::{self, TracingConfig};
use tool_server::server::ToolServer;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tool-server")]
#[command(about = "Laboratory instrument control server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gRPC server for the mock stage instrument
    Serve {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,

        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,
    },

    /// Load, validate and print the effective configuration
    CheckConfig {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port, host } => {
            let config = load_config(&config, port, host)?;
            serve(config).await
        }
        Commands::CheckConfig { config } => {
            let config = load_config(&config, None, None)?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: &Path, port: Option<u16>, host: Option<String>) -> Result<ServerConfig> {
    let mut config = ServerConfig::load_from(path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }
    config.validate()?;
    Ok(config)
}

async fn serve(config: ServerConfig) -> Result<()> {
    logging::init(TracingConfig::from_config(&config)?)?;
    let addr = config.socket_addr()?;

    let server = Arc::new(ToolServer::new(
        MockStage::new(),
        config.dispatch.settings(),
    ));
    info!(
        name = %config.application.name,
        tool_type = server.tool_type(),
        "Tool server starting"
    );

    if let Some(payload) = config.startup.clone() {
        let reply = server.configure(payload).await;
        match reply.result {
            ResultCode::Success => info!("Startup configuration applied"),
            // The instrument may come up later; a supervisor can reconfigure over RPC.
            ResultCode::DriverError => {
                warn!(
                    error = %reply.error_message,
                    "Startup configuration failed; serving in FAILED state"
                );
            }
            code => {
                return Err(ToolServerError::StartupConfiguration {
                    code,
                    message: reply.error_message,
                }
                .into());
            }
        }
    }

    start_server(
        Arc::clone(&server),
        addr,
        config.server.concurrency_limit,
        shutdown_signal(),
    )
    .await?;

    server.shutdown().await?;
    info!("Tool server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler unavailable; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
