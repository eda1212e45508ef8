//! `OpenAPI` → MCP tool bridge.
//!
//! Each operation in an `OpenAPI` description becomes one MCP tool. Its parameter and body
//! schemas are resolved, sanitized and normalized into a single flat input object, and
//! `tools/call` arguments are routed back onto path, query, header and body of one HTTP request.

pub mod config;
pub mod description;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod normalize;
pub mod resolver;
pub mod routing;
pub mod runtime;
pub mod sanitize;
pub mod schema;

pub use config::ApiServerConfig;
pub use error::{OpenApiToolsError, Result};
pub use runtime::OpenApiToolSource;
