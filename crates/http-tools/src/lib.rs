//! Outbound HTTP plumbing for openapi-mcp.
//!
//! The tool dispatcher in `openapi-mcp-tools` builds fully routed [`client::HttpRequest`]s and
//! hands them to an [`client::HttpClient`]. This crate owns that seam and the production
//! `reqwest` implementation, so the dispatcher can be exercised without a network.

pub mod client;

pub use client::{HttpClient, HttpRequest, HttpResponse, HttpToolsError, ReqwestHttpClient};
