//! Map tool calls back onto HTTP requests and interpret the answers.

use crate::error::{OpenApiToolsError, Result};
use crate::routing::{BodyMode, QueryRoute, QueryStyle, REQUEST_BODY_ARGUMENT, RoutingRecord};
use base64::Engine as _;
use mime::Mime;
use openapi_mcp_http::client::encode_query_component;
use openapi_mcp_http::{HttpClient, HttpRequest, HttpResponse};
use regex::{Captures, Regex};
use rmcp::model::{CallToolResult, Content, JsonObject};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};
use url::Url;

static PATH_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}/]+)\}").expect("placeholder pattern is valid"));

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Payload),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON body, or the raw text when the body is not JSON.
    Json(Value),
    Image { data: Vec<u8>, mime_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorPayload {
    /// JSON error body returned by the origin.
    Structured(Value),
    Message(String),
}

impl InvocationResult {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, InvocationResult::Error(_))
    }
}

impl From<InvocationResult> for CallToolResult {
    fn from(result: InvocationResult) -> Self {
        match result {
            InvocationResult::Success(Payload::Json(body)) => {
                let text = match body {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                CallToolResult::success(vec![Content::text(text)])
            }
            InvocationResult::Success(Payload::Image { data, mime_type }) => {
                let b64 = base64::engine::general_purpose::STANDARD.encode(data);
                CallToolResult::success(vec![Content::image(b64, mime_type)])
            }
            InvocationResult::Error(ErrorPayload::Structured(body)) => {
                CallToolResult::error(vec![Content::text(body.to_string())])
            }
            InvocationResult::Error(ErrorPayload::Message(message)) => {
                CallToolResult::error(vec![Content::text(message)])
            }
        }
    }
}

/// Routes tool calls to HTTP. Built once at startup and never mutated.
pub struct Dispatcher {
    routes: HashMap<String, RoutingRecord>,
    base_url: String,
    bearer_token: Option<String>,
    default_headers: Vec<(String, String)>,
    client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.routes.len())
            .field("base_url", &self.base_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL.
    pub fn new(
        routes: HashMap<String, RoutingRecord>,
        base_url: &str,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        Url::parse(base_url).map_err(|e| {
            OpenApiToolsError::Config(format!("Invalid baseUrl '{base_url}': {e}"))
        })?;

        Ok(Self {
            routes,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
            default_headers: Vec::new(),
            client,
        })
    }

    /// Attach `Authorization: Bearer <token>` to every request. Empty tokens are ignored.
    #[must_use]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Headers sent with every request, before any header arguments.
    #[must_use]
    pub fn with_default_headers(
        mut self,
        headers: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.default_headers = headers.into_iter().collect();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute one tool call. Every failure becomes an error result.
    pub async fn dispatch(&self, tool_name: &str, arguments: &JsonObject) -> InvocationResult {
        match self.try_dispatch(tool_name, arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "tool call failed");
                InvocationResult::Error(ErrorPayload::Message(e.to_string()))
            }
        }
    }

    async fn try_dispatch(&self, tool_name: &str, arguments: &JsonObject) -> Result<InvocationResult> {
        let route = self
            .routes
            .get(tool_name)
            .ok_or_else(|| OpenApiToolsError::ToolNotFound(tool_name.to_string()))?;

        let request = self.build_request(route, arguments)?;
        let method = request.method.clone();
        let response = self.client.execute(request).await?;

        debug!(
            tool = %tool_name,
            method = %method,
            status = response.status.as_u16(),
            "tool call completed"
        );
        Ok(interpret_response(response))
    }

    /// Build the outbound request for `route` from flat `arguments`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::InvalidArguments`] when a required argument is absent
    /// (`null` counts as absent) or a path placeholder has no value.
    pub fn build_request(&self, route: &RoutingRecord, arguments: &JsonObject) -> Result<HttpRequest> {
        let mut missing: Vec<&str> = Vec::new();
        for name in route.path_params.iter().chain(&route.required) {
            if present(arguments, name).is_none() && !missing.contains(&name.as_str()) {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(OpenApiToolsError::InvalidArguments(format!(
                "missing required argument(s): {}",
                missing.join(", ")
            )));
        }

        for name in arguments.keys() {
            if !route.is_routed(name) {
                debug!(argument = %name, "ignoring unknown argument");
            }
        }

        let url = self.build_url(route, arguments)?;

        let query = route
            .query_params
            .iter()
            .filter_map(|q| present(arguments, &q.name).map(|v| (q, v)))
            .flat_map(|(q, v)| serialize_query(q, v, route.required.contains(&q.name)))
            .collect();

        let mut headers = self.default_headers.clone();
        for name in &route.header_params {
            if let Some(value) = present(arguments, name) {
                headers.push((name.clone(), value_to_string(value)));
            }
        }
        if let Some(token) = &self.bearer_token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let body = match route.body_mode {
            BodyMode::None => None,
            BodyMode::Flattened => Some(Value::Object(
                route
                    .body_params
                    .iter()
                    .filter_map(|name| present(arguments, name).map(|v| (name.clone(), v.clone())))
                    .collect(),
            )),
            BodyMode::Wrapped => present(arguments, REQUEST_BODY_ARGUMENT).cloned(),
        };

        Ok(HttpRequest {
            method: route.method.clone(),
            url,
            headers,
            query,
            body,
        })
    }

    fn build_url(&self, route: &RoutingRecord, arguments: &JsonObject) -> Result<Url> {
        let mut unbound: Vec<String> = Vec::new();
        let path = PATH_PLACEHOLDER.replace_all(&route.path_template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match present(arguments, name) {
                Some(value) => encode_query_component(&value_to_string(value)),
                None => {
                    unbound.push(name.to_string());
                    String::new()
                }
            }
        });
        if !unbound.is_empty() {
            return Err(OpenApiToolsError::InvalidArguments(format!(
                "no value for path placeholder(s): {}",
                unbound.join(", ")
            )));
        }
        // URL parsing collapses dot segments, which would move the call to another endpoint.
        if path.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(OpenApiToolsError::InvalidArguments(format!(
                "path arguments must not form '.' or '..' segments: {path}"
            )));
        }

        let separator = if path.starts_with('/') { "" } else { "/" };
        let raw = format!("{}{separator}{path}", self.base_url);
        Url::parse(&raw)
            .map_err(|e| OpenApiToolsError::InvalidArguments(format!("invalid request URL: {e}")))
    }
}

/// The argument's value unless it is absent or `null`.
fn present<'a>(arguments: &'a JsonObject, name: &str) -> Option<&'a Value> {
    arguments.get(name).filter(|v| !v.is_null())
}

fn interpret_response(response: HttpResponse) -> InvocationResult {
    let HttpResponse {
        status,
        content_type,
        body,
    } = response;

    if status.is_success() {
        if is_image_content_type(content_type.as_deref()) {
            let mime_type = content_type.unwrap_or_else(|| "image/*".to_string());
            return InvocationResult::Success(Payload::Image {
                data: body,
                mime_type,
            });
        }
        return InvocationResult::Success(Payload::Json(parse_body(
            &body,
            content_type.as_deref(),
        )));
    }

    let value = parse_body(&body, content_type.as_deref());
    let structured = match &value {
        Value::Object(_) | Value::Array(_) => true,
        Value::String(_) => false,
        _ => is_json_content_type(content_type.as_deref()),
    };
    if structured {
        return InvocationResult::Error(ErrorPayload::Structured(value));
    }

    let text = match value {
        Value::String(text) => text,
        _ => String::from_utf8_lossy(&body).into_owned(),
    };
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let text = text.trim();
    let message = if text.is_empty() {
        format!("HTTP {} {reason}", status.as_u16())
    } else {
        format!("HTTP {} {reason}: {text}", status.as_u16())
    };
    InvocationResult::Error(ErrorPayload::Message(message))
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.parse::<Mime>().ok())
        .is_some_and(|m| m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
}

fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.parse::<Mime>().ok())
        .is_some_and(|m| m.type_() == mime::IMAGE)
}

/// JSON when the body parses, the text otherwise; bytes that are not UTF-8 become a base64
/// envelope.
fn parse_body(bytes: &[u8], content_type: Option<&str>) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        Err(_) => json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        }),
    }
}

fn serialize_query(route: &QueryRoute, value: &Value, required: bool) -> Vec<(String, String)> {
    let name = route.name.as_str();
    let is_empty = match value {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    };
    if is_empty {
        return if required {
            vec![(name.to_string(), String::new())]
        } else {
            Vec::new()
        };
    }

    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(value_to_string).collect();
            match route.style {
                QueryStyle::Form if route.explode => items
                    .into_iter()
                    .map(|v| (name.to_string(), v))
                    .collect(),
                QueryStyle::Form | QueryStyle::DeepObject => {
                    vec![(name.to_string(), items.join(","))]
                }
                QueryStyle::SpaceDelimited => vec![(name.to_string(), items.join(" "))],
                QueryStyle::PipeDelimited => vec![(name.to_string(), items.join("|"))],
            }
        }
        Value::Object(map) => match route.style {
            QueryStyle::DeepObject => map
                .iter()
                .map(|(k, v)| (format!("{name}[{k}]"), value_to_string(v)))
                .collect(),
            QueryStyle::Form if route.explode => map
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect(),
            QueryStyle::Form => {
                let parts: Vec<String> = map
                    .iter()
                    .flat_map(|(k, v)| [k.clone(), value_to_string(v)])
                    .collect();
                vec![(name.to_string(), parts.join(","))]
            }
            QueryStyle::SpaceDelimited | QueryStyle::PipeDelimited => {
                vec![(name.to_string(), value.to_string())]
            }
        },
        scalar => vec![(name.to_string(), value_to_string(scalar))],
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
