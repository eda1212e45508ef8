//! Typed JSON-Schema-like nodes read from an `OpenAPI` description.
//!
//! Descriptions are loaded with `serde_yaml`, so literal values stay [`Literal`]s
//! (`serde_yaml::Value`). Unlike `serde_json::Value`, they can carry `.inf` and `.nan` as
//! numbers; overflowing literals such as `1e400` arrive as strings. The sanitizer handles both.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A literal value as written in the description.
pub type Literal = serde_yaml::Value;

/// A schema position: either a `$ref` or an inline schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// `{"$ref": "#/components/schemas/Pet"}`. Sibling keywords are ignored.
    Reference(String),
    Schema(Box<Schema>),
}

/// The `type` keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaType {
    Single(String),
    Union(Vec<String>),
}

/// The `additionalProperties` keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

/// An inline schema. Structural keywords are typed; everything else is kept verbatim in
/// [`Schema::extra`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub schema_type: Option<SchemaType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub format: Option<String>,

    pub properties: BTreeMap<String, SchemaNode>,
    pub required: Vec<String>,
    pub additional_properties: Option<AdditionalProperties>,
    pub pattern_properties: BTreeMap<String, SchemaNode>,
    pub items: Option<Box<SchemaNode>>,

    pub all_of: Vec<SchemaNode>,
    pub any_of: Vec<SchemaNode>,
    pub one_of: Vec<SchemaNode>,

    pub enum_values: Vec<Literal>,
    pub const_value: Option<Literal>,
    pub default: Option<Literal>,

    pub minimum: Option<Literal>,
    pub maximum: Option<Literal>,
    pub exclusive_minimum: Option<Literal>,
    pub exclusive_maximum: Option<Literal>,
    pub multiple_of: Option<Literal>,
    pub min_length: Option<Literal>,
    pub max_length: Option<Literal>,
    pub pattern: Option<String>,
    pub min_items: Option<Literal>,
    pub max_items: Option<Literal>,
    pub unique_items: Option<Literal>,

    /// Keywords without a typed slot (`example`, `nullable`, `x-*`, ...).
    pub extra: BTreeMap<String, Literal>,
}

impl SchemaNode {
    /// Interpret a literal found at a schema position.
    ///
    /// Anything that is not a mapping (booleans, nulls, garbage) becomes an empty, unconstrained
    /// schema.
    #[must_use]
    pub fn from_literal(value: &Literal) -> Self {
        let Some(map) = value.as_mapping() else {
            return SchemaNode::Schema(Box::default());
        };
        if let Some(reference) = map.get("$ref").and_then(Literal::as_str) {
            return SchemaNode::Reference(reference.to_string());
        }
        SchemaNode::Schema(Box::new(Schema::from_mapping(map)))
    }

    /// Whether this node, or any node below it, is still a `$ref`.
    #[must_use]
    pub fn contains_reference(&self) -> bool {
        match self {
            SchemaNode::Reference(_) => true,
            SchemaNode::Schema(schema) => schema.contains_reference(),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            SchemaNode::Reference(reference) => serde_json::json!({ "$ref": reference }),
            SchemaNode::Schema(schema) => schema.to_json(),
        }
    }
}

impl From<Schema> for SchemaNode {
    fn from(schema: Schema) -> Self {
        SchemaNode::Schema(Box::new(schema))
    }
}

impl Schema {
    /// `{"type": "string"}`: the permissive placeholder and normalization fallback.
    #[must_use]
    pub fn string() -> Self {
        Self {
            schema_type: Some(SchemaType::Single("string".to_string())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_mapping(map: &serde_yaml::Mapping) -> Self {
        let mut schema = Schema::default();

        for (key, value) in map {
            let Some(key) = literal_key(key) else {
                continue;
            };

            match key.as_str() {
                "type" => schema.schema_type = parse_type(value),
                "title" => schema.title = value.as_str().map(str::to_string),
                "description" => schema.description = value.as_str().map(str::to_string),
                "format" => schema.format = value.as_str().map(str::to_string),
                "pattern" => schema.pattern = value.as_str().map(str::to_string),
                "properties" => schema.properties = parse_node_map(value),
                "patternProperties" => schema.pattern_properties = parse_node_map(value),
                "required" => {
                    schema.required = value
                        .as_sequence()
                        .map(|seq| {
                            seq.iter()
                                .filter_map(Literal::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                }
                "additionalProperties" => {
                    schema.additional_properties = match value {
                        Literal::Bool(b) => Some(AdditionalProperties::Allowed(*b)),
                        Literal::Mapping(_) => Some(AdditionalProperties::Schema(Box::new(
                            SchemaNode::from_literal(value),
                        ))),
                        _ => None,
                    };
                }
                "items" => schema.items = Some(Box::new(SchemaNode::from_literal(value))),
                "allOf" => schema.all_of = parse_node_list(value),
                "anyOf" => schema.any_of = parse_node_list(value),
                "oneOf" => schema.one_of = parse_node_list(value),
                "enum" => {
                    schema.enum_values = value.as_sequence().cloned().unwrap_or_default();
                }
                "const" => schema.const_value = Some(value.clone()),
                "default" => schema.default = Some(value.clone()),
                "minimum" => schema.minimum = Some(value.clone()),
                "maximum" => schema.maximum = Some(value.clone()),
                "exclusiveMinimum" => schema.exclusive_minimum = Some(value.clone()),
                "exclusiveMaximum" => schema.exclusive_maximum = Some(value.clone()),
                "multipleOf" => schema.multiple_of = Some(value.clone()),
                "minLength" => schema.min_length = Some(value.clone()),
                "maxLength" => schema.max_length = Some(value.clone()),
                "minItems" => schema.min_items = Some(value.clone()),
                "maxItems" => schema.max_items = Some(value.clone()),
                "uniqueItems" => schema.unique_items = Some(value.clone()),
                _ => {
                    schema.extra.insert(key, value.clone());
                }
            }
        }

        schema
    }

    /// Numeric-valued keywords a strict validator may choke on, by keyword name.
    pub(crate) fn numeric_keywords_mut(&mut self) -> [(&'static str, &mut Option<Literal>); 7] {
        [
            ("default", &mut self.default),
            ("const", &mut self.const_value),
            ("minimum", &mut self.minimum),
            ("maximum", &mut self.maximum),
            ("exclusiveMinimum", &mut self.exclusive_minimum),
            ("exclusiveMaximum", &mut self.exclusive_maximum),
            ("multipleOf", &mut self.multiple_of),
        ]
    }

    /// True when the schema constrains nothing a validator can check a type against.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.schema_type.is_none()
            && self.enum_values.is_empty()
            && self.const_value.is_none()
            && self.all_of.is_empty()
            && self.any_of.is_empty()
            && self.one_of.is_empty()
            && self.properties.is_empty()
            && self.items.is_none()
    }

    /// Whether `type` is absent or includes `name`.
    #[must_use]
    pub fn admits_type(&self, name: &str) -> bool {
        match &self.schema_type {
            None => true,
            Some(SchemaType::Single(t)) => t == name,
            Some(SchemaType::Union(types)) => types.iter().any(|t| t == name),
        }
    }

    #[must_use]
    pub fn contains_reference(&self) -> bool {
        let in_additional = matches!(
            &self.additional_properties,
            Some(AdditionalProperties::Schema(node)) if node.contains_reference()
        );

        in_additional
            || self.items.as_ref().is_some_and(|n| n.contains_reference())
            || self
                .properties
                .values()
                .chain(self.pattern_properties.values())
                .chain(&self.all_of)
                .chain(&self.any_of)
                .chain(&self.one_of)
                .any(SchemaNode::contains_reference)
    }

    /// Serialize as JSON Schema, omitting empty containers.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();

        match &self.schema_type {
            Some(SchemaType::Single(t)) => {
                out.insert("type".to_string(), Value::String(t.clone()));
            }
            Some(SchemaType::Union(types)) => {
                out.insert("type".to_string(), Value::from(types.clone()));
            }
            None => {}
        }
        insert_str(&mut out, "title", self.title.as_deref());
        insert_str(&mut out, "description", self.description.as_deref());
        insert_str(&mut out, "format", self.format.as_deref());

        if !self.properties.is_empty() {
            out.insert("properties".to_string(), node_map_to_json(&self.properties));
        }
        if !self.required.is_empty() {
            out.insert("required".to_string(), Value::from(self.required.clone()));
        }
        match &self.additional_properties {
            Some(AdditionalProperties::Allowed(b)) => {
                out.insert("additionalProperties".to_string(), Value::Bool(*b));
            }
            Some(AdditionalProperties::Schema(node)) => {
                out.insert("additionalProperties".to_string(), node.to_json());
            }
            None => {}
        }
        if !self.pattern_properties.is_empty() {
            out.insert(
                "patternProperties".to_string(),
                node_map_to_json(&self.pattern_properties),
            );
        }
        if let Some(items) = &self.items {
            out.insert("items".to_string(), items.to_json());
        }

        for (key, list) in [
            ("allOf", &self.all_of),
            ("anyOf", &self.any_of),
            ("oneOf", &self.one_of),
        ] {
            if !list.is_empty() {
                out.insert(
                    key.to_string(),
                    Value::Array(list.iter().map(SchemaNode::to_json).collect()),
                );
            }
        }

        if !self.enum_values.is_empty() {
            out.insert(
                "enum".to_string(),
                Value::Array(self.enum_values.iter().map(literal_to_json).collect()),
            );
        }

        for (key, value) in [
            ("const", &self.const_value),
            ("default", &self.default),
            ("minimum", &self.minimum),
            ("maximum", &self.maximum),
            ("exclusiveMinimum", &self.exclusive_minimum),
            ("exclusiveMaximum", &self.exclusive_maximum),
            ("multipleOf", &self.multiple_of),
            ("minLength", &self.min_length),
            ("maxLength", &self.max_length),
            ("minItems", &self.min_items),
            ("maxItems", &self.max_items),
            ("uniqueItems", &self.unique_items),
        ] {
            if let Some(value) = value {
                out.insert(key.to_string(), literal_to_json(value));
            }
        }
        insert_str(&mut out, "pattern", self.pattern.as_deref());

        for (key, value) in &self.extra {
            out.insert(key.clone(), literal_to_json(value));
        }

        Value::Object(out)
    }
}

/// Convert a description literal to JSON. Non-finite numbers have no JSON form and become `null`.
#[must_use]
pub fn literal_to_json(value: &Literal) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Mapping keys as strings; YAML allows numeric and boolean keys (`200:`), which we stringify.
pub(crate) fn literal_key(key: &Literal) -> Option<String> {
    match key {
        Literal::String(s) => Some(s.clone()),
        Literal::Number(n) => Some(n.to_string()),
        Literal::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_type(value: &Literal) -> Option<SchemaType> {
    match value {
        Literal::String(s) => Some(SchemaType::Single(s.clone())),
        Literal::Sequence(seq) => Some(SchemaType::Union(
            seq.iter()
                .filter_map(Literal::as_str)
                .map(str::to_string)
                .collect(),
        )),
        _ => None,
    }
}

fn parse_node_map(value: &Literal) -> BTreeMap<String, SchemaNode> {
    let Some(map) = value.as_mapping() else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| Some((literal_key(k)?, SchemaNode::from_literal(v))))
        .collect()
}

fn parse_node_list(value: &Literal) -> Vec<SchemaNode> {
    value
        .as_sequence()
        .map(|seq| seq.iter().map(SchemaNode::from_literal).collect())
        .unwrap_or_default()
}

fn node_map_to_json(map: &BTreeMap<String, SchemaNode>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

fn insert_str(out: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        out.insert(key.to_string(), Value::String(v.to_string()));
    }
}
