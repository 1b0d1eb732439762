//! # Blaze MCP Server
//!
//! Model Context Protocol server that exposes a Blaze FHIR server to MCP
//! clients: CRUD, search, terminology, patient compartment, quality measures,
//! GraphQL and Blaze maintenance operations, each as a tool.

pub mod client;
pub mod config;
pub mod prompts;
pub mod resources;
pub mod server;
pub mod tools;
pub mod transport;

// Re-export commonly used types
pub use client::{BlazeClient, ClientError};
pub use config::{ServerConfig, TransportMode};
pub use server::McpServer;
pub use tools::{ToolDispatcher, ToolError, ToolOutcome};

/// Current version of the MCP server
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
