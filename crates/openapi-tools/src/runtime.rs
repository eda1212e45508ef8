//! `OpenAPI` tool source runtime.
//!
//! Loads a description, generates the tool list once, and serves `tools/call` by dispatching
//! outbound HTTP requests. Everything is computed up front; the source is immutable afterwards
//! and safe to share behind an `Arc`.

use crate::config::{ApiServerConfig, DEFAULT_BASE_URL, HashPolicy};
use crate::description::ApiDescription;
use crate::dispatch::{Dispatcher, InvocationResult};
use crate::error::{OpenApiToolsError, Result};
use crate::generator::{GeneratedTool, generate_tools};
use openapi_mcp_http::HttpClient;
use rmcp::model::{CallToolResult, JsonObject, Tool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Tools generated from one `OpenAPI` description, plus the dispatcher that serves them.
#[derive(Debug)]
pub struct OpenApiToolSource {
    title: Option<String>,
    version: Option<String>,
    tools: Vec<Tool>,
    dispatcher: Dispatcher,
}

impl OpenApiToolSource {
    /// Load the configured description and build the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the description cannot be read or parsed, fails the hash check under
    /// [`HashPolicy::Fail`], yields duplicate tool names, or the base URL is invalid.
    pub fn build(config: &ApiServerConfig, client: Arc<dyn HttpClient>) -> Result<Self> {
        let description = ApiDescription::load(&config.spec)?;
        verify_spec_hash(config, &description)?;
        Self::from_description(&description, config, client)
    }

    /// Build the source from an already parsed description. `config.spec` is not read.
    ///
    /// # Errors
    ///
    /// Returns an error if tool generation fails or the base URL is invalid.
    pub fn from_description(
        description: &ApiDescription,
        config: &ApiServerConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let base_url = resolve_base_url(config.base_url.as_deref(), description.server_url())?;
        let generated = generate_tools(description, &config.auto_discover)?;

        let tools: Vec<Tool> = generated.iter().map(GeneratedTool::to_mcp_tool).collect();
        let routes = generated.into_iter().map(|t| (t.name, t.route)).collect();

        let dispatcher = Dispatcher::new(routes, &base_url, client)?
            .with_bearer_token(config.bearer_token.clone())
            .with_default_headers(config.headers.clone());

        info!(
            spec = %description.location(),
            base_url = %dispatcher.base_url(),
            tools = tools.len(),
            "OpenAPI tool source ready"
        );

        Ok(Self {
            title: description.title().map(str::to_string),
            version: description.version().map(str::to_string),
            tools,
            dispatcher,
        })
    }

    /// `info.title` of the description.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// `info.version` of the description.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.dispatcher.base_url()
    }

    /// List the MCP `Tool`s exposed by this source.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    /// Execute a tool call. Failures are reported as error results, never as `Err`.
    pub async fn invoke(&self, name: &str, arguments: Option<JsonObject>) -> InvocationResult {
        let arguments = arguments.unwrap_or_default();
        self.dispatcher.dispatch(name, &arguments).await
    }

    /// [`Self::invoke`], shaped as an MCP `CallToolResult`.
    pub async fn call_tool(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        self.invoke(name, arguments).await.into()
    }
}

fn verify_spec_hash(config: &ApiServerConfig, description: &ApiDescription) -> Result<()> {
    let Some(expected) = &config.spec_hash else {
        return Ok(());
    };
    let actual = description.content_hash();
    if actual == expected {
        debug!(spec = %config.spec, "spec hash verified");
        return Ok(());
    }

    match config.spec_hash_policy {
        HashPolicy::Fail => Err(OpenApiToolsError::Startup(format!(
            "Spec hash mismatch. Expected: {expected}, Got: {actual}"
        ))),
        HashPolicy::Warn => {
            warn!(spec = %config.spec, expected = %expected, actual = %actual, "spec hash mismatch");
            Ok(())
        }
        HashPolicy::Ignore => Ok(()),
    }
}

/// Configured URL, else the description's first absolute server URL, else [`DEFAULT_BASE_URL`].
fn resolve_base_url(configured: Option<&str>, from_description: Option<&str>) -> Result<String> {
    let candidate = match configured {
        Some(url) => url.to_string(),
        None => match from_description {
            Some(url) if is_usable_server_url(url) => url.to_string(),
            Some(url) => {
                warn!(server = %url, "description server URL is relative or templated; using default");
                DEFAULT_BASE_URL.to_string()
            }
            None => {
                warn!(default = DEFAULT_BASE_URL, "no base URL configured or described; using default");
                DEFAULT_BASE_URL.to_string()
            }
        },
    };

    Url::parse(&candidate)
        .map_err(|e| OpenApiToolsError::Config(format!("Invalid baseUrl '{candidate}': {e}")))?;
    Ok(candidate.trim_end_matches('/').to_string())
}

fn is_usable_server_url(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://")) && !url.contains('{')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use openapi_mcp_http::ReqwestHttpClient;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    const SPEC: &str = r"
openapi: 3.0.3
info: { title: Inventory, version: 2.0.0 }
servers:
  - url: https://inventory.example.com/api
paths:
  /items/{id}:
    get:
      operationId: getItem
      parameters:
        - { name: id, in: path, required: true, schema: { type: string } }
        - { name: verbose, in: query, schema: { type: boolean } }
  /items:
    post:
      operationId: createItem
      requestBody:
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name: { type: string }
                qty: { type: integer, maximum: .inf }
";

    async fn spawn_inventory_server() -> (String, tokio::sync::oneshot::Sender<()>) {
        async fn get_item(
            Path(id): Path<String>,
            Query(query): Query<HashMap<String, String>>,
            headers: HeaderMap,
        ) -> (StatusCode, axum::Json<Value>) {
            if id == "missing" {
                return (
                    StatusCode::NOT_FOUND,
                    axum::Json(json!({"message": "not found"})),
                );
            }
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            (
                StatusCode::OK,
                axum::Json(json!({"id": id, "verbose": query.get("verbose"), "auth": auth})),
            )
        }

        async fn create_item(axum::Json(body): axum::Json<Value>) -> axum::Json<Value> {
            axum::Json(json!({"created": body}))
        }

        let app = Router::new()
            .route("/api/items/{id}", get(get_item))
            .route("/api/items", axum::routing::post(create_item));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        tokio::spawn(async move { server.await });

        (format!("http://{addr}/api"), shutdown_tx)
    }

    fn write_spec(dir: &tempfile::TempDir, content: &str) -> String {
        let path = dir.path().join("openapi.yaml");
        fs::write(&path, content).expect("write spec");
        path.to_string_lossy().to_string()
    }

    fn result_text(result: &CallToolResult) -> String {
        let v = serde_json::to_value(result).expect("CallToolResult serializes");
        v.get("content")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
            .expect("content[0].text")
            .to_string()
    }

    #[test]
    fn base_url_precedence() {
        assert_eq!(
            resolve_base_url(Some("https://override.test/"), Some("https://spec.test")).expect("url"),
            "https://override.test"
        );
        assert_eq!(
            resolve_base_url(None, Some("https://spec.test/v2")).expect("url"),
            "https://spec.test/v2"
        );
        assert_eq!(
            resolve_base_url(None, Some("/relative")).expect("url"),
            DEFAULT_BASE_URL
        );
        assert_eq!(
            resolve_base_url(None, Some("https://{region}.spec.test")).expect("url"),
            DEFAULT_BASE_URL
        );
        assert_eq!(resolve_base_url(None, None).expect("url"), DEFAULT_BASE_URL);
        assert!(matches!(
            resolve_base_url(Some("not a url"), None),
            Err(OpenApiToolsError::Config(_))
        ));
    }

    #[test]
    fn build_lists_tools_with_normalized_schemas() {
        let dir = tempdir().expect("tempdir");
        let config = ApiServerConfig {
            spec: write_spec(&dir, SPEC),
            ..ApiServerConfig::default()
        };
        let source =
            OpenApiToolSource::build(&config, Arc::new(ReqwestHttpClient::new())).expect("build");

        assert_eq!(source.title(), Some("Inventory"));
        assert_eq!(source.version(), Some("2.0.0"));
        assert_eq!(source.base_url(), "https://inventory.example.com/api");

        let tools = source.list_tools();
        let names: Vec<_> = tools.iter().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec!["getItem", "createItem"]);

        let create = Value::Object((*tools[1].input_schema).clone());
        assert_eq!(
            create,
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "qty": {"type": "integer"}
                },
                "required": ["name"]
            })
        );
    }

    #[test]
    fn hash_policy_controls_mismatch_handling() {
        let dir = tempdir().expect("tempdir");
        let spec = write_spec(&dir, SPEC);
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

        let failing = ApiServerConfig {
            spec: spec.clone(),
            spec_hash: Some("sha256:deadbeef".to_string()),
            spec_hash_policy: HashPolicy::Fail,
            ..ApiServerConfig::default()
        };
        let err = OpenApiToolSource::build(&failing, client.clone()).unwrap_err();
        assert!(err.to_string().contains("Spec hash mismatch"));

        let warning = ApiServerConfig {
            spec_hash_policy: HashPolicy::Warn,
            ..failing.clone()
        };
        assert!(OpenApiToolSource::build(&warning, client.clone()).is_ok());

        let description = ApiDescription::load(&spec).expect("load");
        let matching = ApiServerConfig {
            spec_hash: Some(description.content_hash().to_string()),
            ..failing
        };
        assert!(OpenApiToolSource::build(&matching, client).is_ok());
    }

    #[test]
    fn build_fails_on_missing_spec_and_duplicate_names() {
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        let missing = ApiServerConfig {
            spec: "/no/such/openapi.json".to_string(),
            ..ApiServerConfig::default()
        };
        assert!(matches!(
            OpenApiToolSource::build(&missing, client.clone()),
            Err(OpenApiToolsError::OpenApiSpecReadFile { .. })
        ));

        let dir = tempdir().expect("tempdir");
        let duplicate = ApiServerConfig {
            spec: write_spec(
                &dir,
                "paths: { /a: { get: { operationId: x } }, /b: { get: { operationId: x } } }",
            ),
            ..ApiServerConfig::default()
        };
        assert!(matches!(
            OpenApiToolSource::build(&duplicate, client),
            Err(OpenApiToolsError::DuplicateToolName { .. })
        ));
    }

    #[tokio::test]
    async fn call_tool_round_trips_through_http() {
        let (base, shutdown) = spawn_inventory_server().await;
        let description = ApiDescription::parse(SPEC, "inline").expect("parse");
        let config = ApiServerConfig {
            base_url: Some(base),
            bearer_token: Some("t0k".to_string()),
            ..ApiServerConfig::default()
        };
        let source = OpenApiToolSource::from_description(
            &description,
            &config,
            Arc::new(ReqwestHttpClient::new()),
        )
        .expect("source");

        let args = |v: Value| v.as_object().cloned();

        let result = source
            .call_tool("getItem", args(json!({"id": "42", "verbose": true})))
            .await;
        assert_ne!(result.is_error, Some(true));
        let body: Value = serde_json::from_str(&result_text(&result)).expect("json");
        assert_eq!(body, json!({"id": "42", "verbose": "true", "auth": "Bearer t0k"}));

        let result = source
            .call_tool("createItem", args(json!({"name": "bolt", "qty": 3})))
            .await;
        let body: Value = serde_json::from_str(&result_text(&result)).expect("json");
        assert_eq!(body, json!({"created": {"name": "bolt", "qty": 3}}));

        let result = source.call_tool("getItem", args(json!({"id": "missing"}))).await;
        assert_eq!(result.is_error, Some(true));
        let body: Value = serde_json::from_str(&result_text(&result)).expect("json");
        assert_eq!(body, json!({"message": "not found"}));

        let result = source.call_tool("getItem", None).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).contains("missing required argument(s): id"));

        let result = source.call_tool("deleteEverything", None).await;
        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).contains("Tool not found"));

        let _ = shutdown.send(());
    }
}
