//! Reduce a schema to the keyword subset MCP clients validate against.
//!
//! The output is rebuilt field by field from the input, so anything without an allow-listed
//! keyword (extensions, `nullable`, `discriminator`, ...) cannot leak through.

use crate::sanitize::sanitize;
use crate::schema::{AdditionalProperties, Schema, SchemaNode, SchemaType};
use std::collections::BTreeMap;

/// Keywords that may appear in a normalized schema.
pub const ALLOWED_KEYWORDS: &[&str] = &[
    "type",
    "properties",
    "required",
    "description",
    "enum",
    "items",
    "anyOf",
    "oneOf",
    "allOf",
    "const",
    "default",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "format",
    "additionalProperties",
    "patternProperties",
    "title",
];

pub const VALID_TYPES: &[&str] = &[
    "string", "number", "integer", "boolean", "object", "array", "null",
];

pub const ALLOWED_FORMATS: &[&str] = &[
    "email",
    "uri",
    "uuid",
    "ipv4",
    "ipv6",
    "date-time",
    "date",
    "time",
];

/// Normalize an optional schema; only an absent input yields `None`.
#[must_use]
pub fn normalize(schema: Option<&Schema>) -> Option<Schema> {
    schema.map(normalize_schema)
}

/// Normalize a schema. Children are sanitized before being normalized.
#[must_use]
pub fn normalize_schema(schema: &Schema) -> Schema {
    let Schema {
        schema_type,
        title,
        description,
        format,
        properties,
        required,
        additional_properties,
        pattern_properties,
        items,
        all_of,
        any_of,
        one_of,
        enum_values,
        const_value,
        default,
        minimum,
        maximum,
        exclusive_minimum,
        exclusive_maximum,
        multiple_of,
        min_length,
        max_length,
        pattern,
        min_items,
        max_items,
        unique_items,
        extra: _,
    } = schema;

    let mut out = Schema {
        schema_type: schema_type.as_ref().and_then(normalize_type),
        title: title.clone(),
        description: description.clone(),
        format: format
            .clone()
            .filter(|f| ALLOWED_FORMATS.contains(&f.as_str())),
        properties: normalize_children(properties),
        required: dedup(required.iter().cloned()),
        additional_properties: additional_properties.as_ref().map(|extra| match extra {
            AdditionalProperties::Allowed(b) => AdditionalProperties::Allowed(*b),
            AdditionalProperties::Schema(node) => {
                AdditionalProperties::Schema(Box::new(normalize_child(node)))
            }
        }),
        pattern_properties: normalize_children(pattern_properties),
        items: items.as_deref().map(|node| Box::new(normalize_child(node))),
        all_of: all_of.iter().map(normalize_child).collect(),
        any_of: any_of.iter().map(normalize_child).collect(),
        one_of: one_of.iter().map(normalize_child).collect(),
        enum_values: dedup(enum_values.iter().cloned()),
        const_value: const_value.clone(),
        default: default.clone(),
        minimum: minimum.clone(),
        maximum: maximum.clone(),
        exclusive_minimum: exclusive_minimum.clone(),
        exclusive_maximum: exclusive_maximum.clone(),
        multiple_of: multiple_of.clone(),
        min_length: min_length.clone(),
        max_length: max_length.clone(),
        pattern: pattern.clone(),
        min_items: min_items.clone(),
        max_items: max_items.clone(),
        unique_items: unique_items.clone(),
        extra: BTreeMap::new(),
    };

    if out.is_unconstrained() {
        out.schema_type = Some(SchemaType::Single("string".to_string()));
    }
    out
}

/// Sanitize then normalize a child position. A leftover `$ref` has no allow-listed keyword
/// and falls back to a string schema.
fn normalize_child(node: &SchemaNode) -> SchemaNode {
    match node {
        SchemaNode::Schema(schema) => SchemaNode::from(normalize_schema(&sanitize(schema))),
        SchemaNode::Reference(_) => SchemaNode::from(Schema::string()),
    }
}

fn normalize_children(map: &BTreeMap<String, SchemaNode>) -> BTreeMap<String, SchemaNode> {
    map.iter()
        .map(|(name, node)| (name.clone(), normalize_child(node)))
        .collect()
}

fn normalize_type(schema_type: &SchemaType) -> Option<SchemaType> {
    let valid = |name: &str| VALID_TYPES.contains(&name);
    match schema_type {
        SchemaType::Single(name) => valid(name.as_str()).then(|| SchemaType::Single(name.clone())),
        SchemaType::Union(names) => {
            let kept = dedup(names.iter().filter(|n| valid(n.as_str())).cloned());
            (!kept.is_empty()).then_some(SchemaType::Union(kept))
        }
    }
}

fn dedup<T: PartialEq>(values: impl Iterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
