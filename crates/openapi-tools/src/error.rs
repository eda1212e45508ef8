//! Error types for `openapi-mcp-tools`.

use openapi_mcp_http::HttpToolsError;
use thiserror::Error;

/// Main error type for `OpenAPI` tooling.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid base URL, bad filter patterns).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (spec unusable, hash mismatch under the `fail` policy).
    #[error("Startup error: {0}")]
    Startup(String),

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    OpenApiSpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {source}")]
    OpenApiSpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Two operations produced the same tool name.
    #[error("Duplicate tool name '{name}': produced by both {first} and {second}")]
    DuplicateToolName {
        name: String,
        first: String,
        second: String,
    },

    /// A call named a tool that was never generated.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A call was missing required arguments or carried unusable values.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The outbound request could not be performed.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpToolsError),
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
