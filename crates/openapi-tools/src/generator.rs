//! Turn description operations into MCP tools plus their routing records.

use crate::config::AutoDiscoverConfig;
use crate::description::{ApiDescription, Operation, ParameterLocation, RequestBody};
use crate::error::{OpenApiToolsError, Result};
use crate::normalize::normalize_schema;
use crate::resolver::SchemaResolver;
use crate::routing::{BodyMode, QueryStyle, REQUEST_BODY_ARGUMENT, RouteTarget, RoutingRecord};
use crate::sanitize::sanitize;
use crate::schema::{Schema, SchemaNode};
use reqwest::Method;
use rmcp::model::{JsonObject, Tool, ToolAnnotations};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::debug;

/// Longest synthesized tool name.
const MAX_TOOL_NAME_LEN: usize = 64;

/// One generated tool: what clients see, plus how calls are routed.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTool {
    pub name: String,
    pub description: String,
    pub input_schema: JsonObject,
    pub route: RoutingRecord,
}

impl GeneratedTool {
    #[must_use]
    pub fn to_mcp_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(self.input_schema.clone()),
        );
        tool.annotations = Some(annotations_for_method(&self.route.method));
        tool
    }
}

/// Generate one tool per operation admitted by `discover`, in document order.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::DuplicateToolName`] when two operations map to the same name.
pub fn generate_tools(
    description: &ApiDescription,
    discover: &AutoDiscoverConfig,
) -> Result<Vec<GeneratedTool>> {
    let resolver = SchemaResolver::new(description.root());
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut tools = Vec::new();

    for operation in description.operations() {
        if !discover.allows(operation.method.as_str(), &operation.path) {
            debug!(operation = %operation.label(), "operation filtered out");
            continue;
        }

        let tool = generate_tool(&resolver, &operation);
        match owners.entry(tool.name.clone()) {
            Entry::Occupied(first) => {
                return Err(OpenApiToolsError::DuplicateToolName {
                    name: tool.name,
                    first: first.get().clone(),
                    second: operation.label(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(operation.label());
            }
        }

        debug!(tool = %tool.name, operation = %operation.label(), "generated tool");
        tools.push(tool);
    }

    Ok(tools)
}

/// Build the tool and routing record for a single operation.
#[must_use]
pub fn generate_tool(resolver: &SchemaResolver<'_>, operation: &Operation) -> GeneratedTool {
    let name = operation
        .operation_id
        .clone()
        .unwrap_or_else(|| generate_canonical_name(operation.method.as_str(), &operation.path));
    let description = operation
        .summary
        .clone()
        .or_else(|| operation.description.clone())
        .unwrap_or_else(|| format!("Calls {} {}", operation.method, operation.path));

    let mut route = RoutingRecord::new(operation.method.clone(), operation.path.clone());
    let mut properties = JsonObject::new();
    let mut required: Vec<String> = Vec::new();

    for parameter in &operation.parameters {
        let target = match parameter.location {
            ParameterLocation::Path => RouteTarget::Path,
            ParameterLocation::Query => {
                let style = QueryStyle::parse(parameter.style.as_deref());
                RouteTarget::Query {
                    style,
                    explode: parameter.explode.unwrap_or(style.default_explode()),
                }
            }
            ParameterLocation::Header => RouteTarget::Header,
            ParameterLocation::Cookie => {
                debug!(parameter = %parameter.name, "ignoring cookie parameter");
                continue;
            }
        };

        let mut schema = project(resolver, parameter.schema.as_ref());
        if parameter.description.is_some() {
            schema.description.clone_from(&parameter.description);
        }

        properties.insert(parameter.name.clone(), schema.to_json());
        required.retain(|r| r != &parameter.name);
        if parameter.required {
            required.push(parameter.name.clone());
        }
        route.route(&parameter.name, target);
    }

    if let Some(body) = &operation.request_body {
        attach_body(
            resolver,
            body,
            &operation.label(),
            &mut properties,
            &mut required,
            &mut route,
        );
    }

    route.required.clone_from(&required);

    let mut input_schema = JsonObject::new();
    input_schema.insert("type".to_string(), Value::String("object".to_string()));
    input_schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        input_schema.insert("required".to_string(), Value::from(required));
    }

    GeneratedTool {
        name,
        description,
        input_schema,
        route,
    }
}

fn attach_body(
    resolver: &SchemaResolver<'_>,
    body: &RequestBody,
    operation: &str,
    properties: &mut JsonObject,
    required: &mut Vec<String>,
    route: &mut RoutingRecord,
) {
    let schema = project(resolver, Some(&body.schema));
    let flattenable = !schema.properties.is_empty() && schema.admits_type("object");
    let collides = schema.properties.keys().any(|name| route.is_routed(name));

    if flattenable && !collides {
        for (name, property) in &schema.properties {
            properties.insert(name.clone(), property.to_json());
            route.route(name, RouteTarget::Body);
        }
        for name in &schema.required {
            if schema.properties.contains_key(name) && !required.contains(name) {
                required.push(name.clone());
            }
        }
        route.body_mode = BodyMode::Flattened;
        return;
    }

    if flattenable {
        debug!(operation = %operation, "body properties collide with parameters; wrapping body");
    }

    let mut wrapped = schema;
    if wrapped.description.is_none() {
        wrapped.description.clone_from(&body.description);
    }
    properties.insert(REQUEST_BODY_ARGUMENT.to_string(), wrapped.to_json());
    required.retain(|r| r != REQUEST_BODY_ARGUMENT);
    if body.required {
        required.push(REQUEST_BODY_ARGUMENT.to_string());
    }
    route.route(REQUEST_BODY_ARGUMENT, RouteTarget::Body);
    route.body_mode = BodyMode::Wrapped;
}

/// Resolve, sanitize and normalize one schema position.
fn project(resolver: &SchemaResolver<'_>, node: Option<&SchemaNode>) -> Schema {
    normalize_schema(&sanitize(&resolver.resolve(node)))
}

/// Synthesize a tool name from method and path: `get /pets/{id}` becomes `get_pets_id`.
#[must_use]
pub fn generate_canonical_name(method: &str, path: &str) -> String {
    let mut name = String::with_capacity(method.len() + path.len() + 1);
    for c in format!("{}_{}", method.to_lowercase(), path).chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }

    let mut name = name.trim_matches('_').to_string();
    name.truncate(MAX_TOOL_NAME_LEN);
    name
}

/// MCP behaviour hints from HTTP method semantics.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => (Some(true), Some(false), Some(true)),
        Method::POST => (Some(false), Some(false), Some(false)),
        Method::PUT | Method::DELETE => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent; do not guess.
        Method::PATCH => (Some(false), Some(true), None),
        _ => (None, None, None),
    };

    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}
