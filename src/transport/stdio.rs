//! Standard I/O transport implementation

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{McpMessage, MessageHandler};

/// Standard I/O transport for local CLI integration with MCP clients
pub struct StdioTransport {
    shutdown_signal: watch::Sender<bool>,
}

impl StdioTransport {
    /// Create a new stdio transport instance
    pub fn new() -> Self {
        let (shutdown_signal, _) = watch::channel(false);
        Self { shutdown_signal }
    }

    fn is_shutdown_requested(&self) -> bool {
        *self.shutdown_signal.borrow()
    }

    fn request_shutdown(&self) {
        self.shutdown_signal.send_replace(true);
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Send one JSON-RPC message as a single line.
async fn write_message<W>(writer: &mut W, message: &McpMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json_str = message
        .to_json_string()
        .context("Failed to serialize message to JSON")?;

    debug!("Sending message: {}", json_str);

    writer
        .write_all(json_str.as_bytes())
        .await
        .context("Failed to write message to stdout")?;
    writer
        .write_all(b"\n")
        .await
        .context("Failed to write newline to stdout")?;
    writer.flush().await.context("Failed to flush stdout")?;
    Ok(())
}

/// Turn one inbound line into the response to write, if any.
async fn process_line(
    line: &str,
    handler: &(dyn MessageHandler + Send + Sync),
) -> Option<McpMessage> {
    let message = match McpMessage::parse(line) {
        Ok(message) => message,
        Err(e) => {
            warn!("Rejecting inbound message: {} - Line: {}", e, line);
            return Some(e.to_response());
        }
    };

    debug!("Processing message: {:?}", message);
    match handler.handle_message(message).await {
        Ok(response) => response,
        Err(e) => {
            error!("Handler error: {}", e);
            None
        }
    }
}

/// Main message processing loop over any line-oriented reader and writer.
///
/// Returns when the reader reaches EOF or `shutdown` flips to true.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    handler: Arc<dyn MessageHandler + Send + Sync>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut writer = BufWriter::new(writer);

    info!("Starting stdio message processing loop");

    loop {
        if *shutdown.borrow() {
            info!("Shutdown requested, stopping message processing");
            break;
        }

        let line = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };

        let Some(line) = line else {
            debug!("EOF received on stdin");
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Received line: {}", trimmed);

        if let Some(response) = process_line(trimmed, handler.as_ref()).await {
            if let Err(e) = write_message(&mut writer, &response).await {
                error!("Failed to send response: {}", e);
            }
        }
    }

    if let Err(e) = writer.flush().await {
        warn!("Failed to flush output during shutdown: {}", e);
    }
    info!("Message processing loop ended");
    Ok(())
}

#[async_trait]
impl super::Transport for StdioTransport {
    /// Start the stdio transport and begin message processing
    async fn start(&self, handler: Arc<dyn MessageHandler + Send + Sync>) -> Result<()> {
        info!("Starting stdio transport for MCP communication");

        self.shutdown_signal.send_replace(false);
        let reader = BufReader::new(tokio::io::stdin());
        serve(
            reader,
            tokio::io::stdout(),
            handler,
            self.shutdown_signal.subscribe(),
        )
        .await
    }

    /// Shutdown the stdio transport
    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down stdio transport");
        self.request_shutdown();
        Ok(())
    }
}
