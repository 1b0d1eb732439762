//! Blaze MCP Server - Main binary

use std::sync::Arc;

use anyhow::{Context, Result};
use blaze_mcp::transport::{MessageHandler, SseTransport, StdioTransport, Transport};
use blaze_mcp::{McpServer, ServerConfig, TransportMode};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "blaze-mcp")]
#[command(about = "Blaze FHIR Model Context Protocol Server")]
#[command(version)]
struct Cli {
    /// Transport mode (defaults to BLAZE_MCP_TRANSPORT, then stdio)
    #[arg(long, value_enum)]
    transport: Option<TransportMode>,

    /// Host for the SSE server (defaults to BLAZE_MCP_HOST, then 0.0.0.0)
    #[arg(long)]
    host: Option<String>,

    /// Port for the SSE server (defaults to BLAZE_MCP_PORT, then 8000)
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BLAZE_MCP_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str, transport: TransportMode) {
    // Logs always go to stderr; stdout carries the stdio protocol stream
    let verbose = transport == TransportMode::Sse;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(verbose)
                .with_file(verbose)
                .with_line_number(verbose)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::EnvFilter::new(log_level))
        .init();
}

async fn run<T: Transport>(
    transport: T,
    handler: Arc<dyn MessageHandler + Send + Sync>,
    name: &str,
) {
    let shutdown_signal = async {
        match signal::ctrl_c().await {
            Ok(_) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    };

    tokio::select! {
        result = transport.start(handler) => {
            match result {
                Ok(_) => info!("{} transport completed successfully", name),
                Err(e) => error!("{} transport error: {:#}", name, e),
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, stopping {} transport", name);
            if let Err(e) = transport.shutdown().await {
                error!("Error during {} transport shutdown: {}", name, e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = ServerConfig::from_env().context("Failed to load configuration")?;
    if let Some(transport) = cli.transport {
        config.transport = transport;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    init_tracing(&cli.log_level, config.transport);

    info!("Starting Blaze MCP Server v{}", blaze_mcp::VERSION);
    info!("Server configuration: {:?}", config);

    let transport_mode = config.transport;
    let (host, port) = (config.host.clone(), config.port);
    let server = Arc::new(McpServer::from_config(config));
    let handler: Arc<dyn MessageHandler + Send + Sync> = server.clone();

    match transport_mode {
        TransportMode::Stdio => {
            info!("Starting stdio transport for MCP client integration");
            run(StdioTransport::new(), handler, "stdio").await;
        }
        TransportMode::Sse => {
            run(SseTransport::new(host, port), handler, "SSE").await;
        }
    }

    server.close().await;
    info!("Blaze MCP Server shutdown complete");
    Ok(())
}
