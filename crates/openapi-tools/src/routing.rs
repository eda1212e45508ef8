//! Where each flat tool argument goes on the outbound HTTP request.

use reqwest::Method;

/// Name of the single argument that carries a non-flattened request body.
pub const REQUEST_BODY_ARGUMENT: &str = "requestBody";

/// Query serialization style (`OpenAPI` `style`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStyle {
    #[default]
    Form,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl QueryStyle {
    /// Parse a declared style; unknown or absent values fall back to `form`.
    #[must_use]
    pub fn parse(style: Option<&str>) -> Self {
        match style {
            Some("spaceDelimited") => Self::SpaceDelimited,
            Some("pipeDelimited") => Self::PipeDelimited,
            Some("deepObject") => Self::DeepObject,
            _ => Self::Form,
        }
    }

    /// `explode` when the parameter leaves it unset.
    #[must_use]
    pub fn default_explode(self) -> bool {
        matches!(self, Self::Form | Self::DeepObject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRoute {
    pub name: String,
    pub style: QueryStyle,
    pub explode: bool,
}

/// How the request body is assembled from arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    #[default]
    None,
    /// Each body property is its own argument; the body is the object of those present.
    Flattened,
    /// The [`REQUEST_BODY_ARGUMENT`] argument is sent verbatim.
    Wrapped,
}

/// Target bucket for [`RoutingRecord::route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Path,
    Query { style: QueryStyle, explode: bool },
    Header,
    Body,
}

/// Routing metadata for one tool.
///
/// Every argument name sits in at most one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRecord {
    pub method: Method,
    pub path_template: String,
    pub path_params: Vec<String>,
    pub query_params: Vec<QueryRoute>,
    pub header_params: Vec<String>,
    pub body_params: Vec<String>,
    pub body_mode: BodyMode,
    /// Arguments that must be present (non-null) for a call to proceed.
    pub required: Vec<String>,
}

impl RoutingRecord {
    #[must_use]
    pub fn new(method: Method, path_template: impl Into<String>) -> Self {
        Self {
            method,
            path_template: path_template.into(),
            path_params: Vec::new(),
            query_params: Vec::new(),
            header_params: Vec::new(),
            body_params: Vec::new(),
            body_mode: BodyMode::None,
            required: Vec::new(),
        }
    }

    /// Route `name` to `target`, moving it out of whichever bucket held it before.
    pub fn route(&mut self, name: &str, target: RouteTarget) {
        self.unroute(name);
        let name = name.to_string();
        match target {
            RouteTarget::Path => self.path_params.push(name),
            RouteTarget::Query { style, explode } => self.query_params.push(QueryRoute {
                name,
                style,
                explode,
            }),
            RouteTarget::Header => self.header_params.push(name),
            RouteTarget::Body => self.body_params.push(name),
        }
    }

    fn unroute(&mut self, name: &str) {
        self.path_params.retain(|n| n != name);
        self.query_params.retain(|q| q.name != name);
        self.header_params.retain(|n| n != name);
        self.body_params.retain(|n| n != name);
    }

    /// Whether `name` is routed anywhere.
    #[must_use]
    pub fn is_routed(&self, name: &str) -> bool {
        self.path_params
            .iter()
            .chain(&self.header_params)
            .chain(&self.body_params)
            .any(|n| n == name)
            || self.query_params.iter().any(|q| q.name == name)
    }

    /// All routed argument names, bucket by bucket.
    pub fn argument_names(&self) -> impl Iterator<Item = &str> {
        self.path_params
            .iter()
            .map(String::as_str)
            .chain(self.query_params.iter().map(|q| q.name.as_str()))
            .chain(self.header_params.iter().map(String::as_str))
            .chain(self.body_params.iter().map(String::as_str))
    }
}
