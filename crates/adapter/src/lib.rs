//! MCP adapter for `OpenAPI` descriptions.
//!
//! Loads a description at startup, turns every operation into an MCP tool, and serves those
//! tools over stdio or streamable HTTP.

pub mod config;
pub mod error;
pub mod logging;
pub mod server;

pub use config::{Cli, LogFormat, Transport};
pub use error::{AdapterError, Result};
pub use server::OpenApiMcpServer;
