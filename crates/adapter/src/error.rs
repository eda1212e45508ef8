//! Error types for the MCP adapter.

use openapi_mcp_tools::OpenApiToolsError;
use thiserror::Error;

/// Main error type for the adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Configuration errors (unreadable file, conflicting flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (transport failed to start)
    #[error("Startup error: {0}")]
    Startup(String),

    /// Tool source errors (description unusable, duplicate tool names)
    #[error(transparent)]
    Tools(#[from] OpenApiToolsError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
