//! Command-line and file configuration for the adapter.
//!
//! Every flag has an environment variable fallback. An optional YAML file supplies the full
//! [`ApiServerConfig`]; flags and environment variables override the fields they name.

use crate::error::{AdapterError, Result};
use clap::{Parser, ValueEnum};
use openapi_mcp_tools::ApiServerConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// How MCP messages reach the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout.
    Stdio,
    /// MCP streamable HTTP on `/mcp`.
    Http,
}

/// Log line encoding on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "openapi-mcp-adapter",
    version,
    about = "Expose the operations of an OpenAPI description as MCP tools"
)]
pub struct Cli {
    /// Path to the `OpenAPI` description (YAML or JSON)
    #[arg(long, env = "OPENAPI_SPEC")]
    pub spec: Option<String>,

    /// Base URL of the upstream API; overrides the description's `servers`
    #[arg(long, env = "API_BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token sent as `Authorization` on every upstream request
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// YAML file holding the full server configuration
    #[arg(long, env = "OPENAPI_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, env = "OPENAPI_MCP_TRANSPORT", default_value_t = Transport::Stdio)]
    pub transport: Transport,

    /// Listen address for the HTTP transport
    #[arg(long, env = "OPENAPI_MCP_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Default log filter; `RUST_LOG` takes precedence when set
    #[arg(long, env = "OPENAPI_MCP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, env = "OPENAPI_MCP_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Build the tool source configuration: file first, then flag and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed.
    pub fn api_config(&self) -> Result<ApiServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => ApiServerConfig::default(),
        };

        if let Some(spec) = &self.spec {
            config.spec.clone_from(spec);
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }
        if let Some(token) = &self.token {
            config.bearer_token = Some(token.clone());
        }
        Ok(config)
    }
}

/// Read an [`ApiServerConfig`] from a YAML (or JSON) file.
///
/// # Errors
///
/// Returns [`AdapterError::Config`] naming the file when it cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<ApiServerConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AdapterError::Config(format!("failed to read {}: {e}", path.display())))?;
    serde_yaml::from_str(&content)
        .map_err(|e| AdapterError::Config(format!("failed to parse {}: {e}", path.display())))
}
