//! The `OpenAPI` description document and the operations it declares.

use crate::error::{OpenApiToolsError, Result};
use crate::schema::{Literal, SchemaNode, literal_key};
use reqwest::Method;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Upper bound on `$ref` hops when following references to parameters, bodies and path items.
const MAX_REFERENCE_HOPS: usize = 32;

/// A parsed description (YAML or JSON; JSON is a YAML subset).
#[derive(Debug, Clone)]
pub struct ApiDescription {
    root: Literal,
    location: String,
    content_hash: String,
}

impl ApiDescription {
    /// Read and parse a description from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a YAML/JSON mapping.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| OpenApiToolsError::OpenApiSpecReadFile {
                path: path.to_string(),
                source: e,
            })?;
        Self::parse(&content, path)
    }

    /// Parse a description held in memory. `location` is only used in messages.
    ///
    /// # Errors
    ///
    /// Returns an error if `content` is not a YAML/JSON mapping.
    pub fn parse(content: &str, location: &str) -> Result<Self> {
        let root: Literal =
            serde_yaml::from_str(content).map_err(|e| OpenApiToolsError::OpenApiSpecParse {
                location: location.to_string(),
                source: e,
            })?;
        if !root.is_mapping() {
            return Err(OpenApiToolsError::Startup(format!(
                "OpenAPI description '{location}' is not an object"
            )));
        }

        let content_hash = format!("sha256:{}", hex::encode(Sha256::digest(content.as_bytes())));
        Ok(Self {
            root,
            location: location.to_string(),
            content_hash,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Literal {
        &self.root
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// `sha256:<hex>` of the raw document text.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.root
            .get("info")
            .and_then(|info| info.get("title"))
            .and_then(Literal::as_str)
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.root
            .get("info")
            .and_then(|info| info.get("version"))
            .and_then(Literal::as_str)
    }

    /// URL of the first entry in `servers`, as written.
    #[must_use]
    pub fn server_url(&self) -> Option<&str> {
        self.root
            .get("servers")
            .and_then(Literal::as_sequence)
            .and_then(|servers| servers.first())
            .and_then(|server| server.get("url"))
            .and_then(Literal::as_str)
    }

    /// Look up a local reference (`#/components/schemas/Pet`).
    #[must_use]
    pub fn lookup(&self, reference: &str) -> Option<&Literal> {
        lookup_pointer(&self.root, reference)
    }

    /// Every operation in the description, in document order.
    ///
    /// Path items and their `parameters` entries may be `$ref`s; unresolvable entries are
    /// skipped with a warning.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        let Some(paths) = self.root.get("paths").and_then(Literal::as_mapping) else {
            warn!(location = %self.location, "OpenAPI description declares no paths");
            return Vec::new();
        };

        let mut operations = Vec::new();
        for (path_key, raw_item) in paths {
            let Some(path) = path_key.as_str() else {
                continue;
            };
            let Some(item) = self.follow(raw_item).and_then(Literal::as_mapping) else {
                warn!(path = %path, "skipping unusable path item");
                continue;
            };

            let shared = self.parameters(item.get("parameters"));

            for (key, raw_operation) in item {
                let Some(key) = key.as_str() else {
                    continue;
                };
                if key == "parameters" {
                    continue;
                }
                let Some(method) = parse_method(key) else {
                    continue;
                };
                let Some(op) = raw_operation.as_mapping() else {
                    warn!(method = %method, path = %path, "skipping malformed operation");
                    continue;
                };

                let mut parameters = shared.clone();
                parameters.extend(self.parameters(op.get("parameters")));

                operations.push(Operation {
                    operation_id: string_field(op, "operationId"),
                    method,
                    path: path.to_string(),
                    summary: string_field(op, "summary"),
                    description: string_field(op, "description"),
                    parameters,
                    request_body: op
                        .get("requestBody")
                        .and_then(|body| self.request_body(body)),
                });
            }
        }
        operations
    }

    fn parameters(&self, raw: Option<&Literal>) -> Vec<Parameter> {
        raw.and_then(Literal::as_sequence)
            .map(|seq| seq.iter().filter_map(|p| self.parameter(p)).collect())
            .unwrap_or_default()
    }

    fn parameter(&self, raw: &Literal) -> Option<Parameter> {
        let map = self.follow(raw)?.as_mapping()?;
        let name = map.get("name").and_then(Literal::as_str)?.to_string();
        let location = match map.get("in").and_then(Literal::as_str) {
            Some("path") => ParameterLocation::Path,
            Some("query") => ParameterLocation::Query,
            Some("header") => ParameterLocation::Header,
            Some("cookie") => ParameterLocation::Cookie,
            other => {
                warn!(parameter = %name, location = ?other, "skipping parameter with unknown location");
                return None;
            }
        };

        let schema = map.get("schema").map(SchemaNode::from_literal).or_else(|| {
            first_media_schema(map.get("content"), |_| true).map(SchemaNode::from_literal)
        });

        Some(Parameter {
            name,
            // Path parameters are always required, whatever the document says.
            required: location == ParameterLocation::Path
                || map.get("required").and_then(Literal::as_bool).unwrap_or(false),
            location,
            description: string_field(map, "description"),
            schema,
            style: string_field(map, "style"),
            explode: map.get("explode").and_then(Literal::as_bool),
        })
    }

    fn request_body(&self, raw: &Literal) -> Option<RequestBody> {
        let map = self.follow(raw)?.as_mapping()?;
        let content = map.get("content");

        let schema = first_media_schema(content, |media| media == "application/json")
            .or_else(|| first_media_schema(content, |media| media.contains("json")));

        let Some(schema) = schema else {
            debug!("request body has no JSON media type; ignoring it");
            return None;
        };

        Some(RequestBody {
            required: map.get("required").and_then(Literal::as_bool).unwrap_or(false),
            description: string_field(map, "description"),
            schema: SchemaNode::from_literal(schema),
        })
    }

    /// Follow a chain of `$ref`s to the literal it finally names.
    fn follow<'a>(&'a self, mut value: &'a Literal) -> Option<&'a Literal> {
        for _ in 0..MAX_REFERENCE_HOPS {
            let Some(reference) = value.get("$ref").and_then(Literal::as_str) else {
                return Some(value);
            };
            match self.lookup(reference) {
                Some(target) => value = target,
                None => {
                    warn!(reference = %reference, "unresolved $ref");
                    return None;
                }
            }
        }
        warn!("$ref chain too long; giving up");
        None
    }
}

/// Resolve a local JSON pointer (`#/a/b~1c`) against `root`.
#[must_use]
pub fn lookup_pointer<'a>(root: &'a Literal, reference: &str) -> Option<&'a Literal> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }

    pointer
        .strip_prefix('/')?
        .split('/')
        .try_fold(root, |node, raw| {
            let segment = raw.replace("~1", "/").replace("~0", "~");
            match node {
                Literal::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| seq.get(i)),
                Literal::Mapping(map) => map
                    .iter()
                    .find(|(k, _)| literal_key(k).as_deref() == Some(segment.as_str()))
                    .map(|(_, v)| v),
                _ => None,
            }
        })
}

fn parse_method(key: &str) -> Option<Method> {
    Some(match key {
        "get" => Method::GET,
        "put" => Method::PUT,
        "post" => Method::POST,
        "delete" => Method::DELETE,
        "options" => Method::OPTIONS,
        "head" => Method::HEAD,
        "patch" => Method::PATCH,
        "trace" => Method::TRACE,
        _ => return None,
    })
}

fn string_field(map: &serde_yaml::Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(Literal::as_str).map(str::to_string)
}

fn first_media_schema(
    content: Option<&Literal>,
    accept: impl Fn(&str) -> bool,
) -> Option<&Literal> {
    content?
        .as_mapping()?
        .iter()
        .find(|(media, _)| media.as_str().is_some_and(&accept))
        .and_then(|(_, media)| media.get("schema"))
}

/// One HTTP operation.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub method: Method,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Path-item parameters first, then the operation's own.
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
}

impl Operation {
    /// `"GET /pets/{id}"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub description: Option<String>,
    pub schema: Option<SchemaNode>,
    pub style: Option<String>,
    pub explode: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RequestBody {
    pub required: bool,
    pub description: Option<String>,
    pub schema: SchemaNode,
}
