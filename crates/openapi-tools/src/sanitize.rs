//! Strip values that strict JSON-Schema validators reject.
//!
//! Numbers are kept only when finite and within the IEEE-754 safe-integer range. Annotation-only
//! keywords that some validators treat as unknown are removed outright.
//!
//! `serde_yaml` reads overflowing literals such as `1e400` as strings, so numeric-looking text is
//! checked as well. Bounds must be real numbers; anything else in a bound position is dropped.

use crate::schema::{AdditionalProperties, Literal, Schema, SchemaNode};
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

/// 2^53 - 1.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Keywords whose value must be a finite, safe number.
const BOUND_KEYWORDS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

static NUMERIC_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("numeric pattern is valid")
});

const ANNOTATION_KEYWORDS: &[&str] = &[
    "example",
    "examples",
    "deprecated",
    "readOnly",
    "writeOnly",
    "xml",
    "style",
    "explode",
    "nullable",
];

/// Return a sanitized copy of `schema`, recursing through every child position.
#[must_use]
pub fn sanitize(schema: &Schema) -> Schema {
    let mut out = schema.clone();

    for (keyword, slot) in out.numeric_keywords_mut() {
        let drop = match slot.as_ref() {
            None => false,
            Some(value) if BOUND_KEYWORDS.contains(&keyword) => !is_safe_number(value),
            Some(value) => is_unsafe_number(value),
        };
        if drop {
            trace!(keyword, "dropping out-of-range numeric keyword");
            *slot = None;
        }
    }
    out.enum_values.retain(|value| !is_unsafe_number(value));

    for keyword in ANNOTATION_KEYWORDS {
        out.extra.remove(*keyword);
    }

    for node in out.properties.values_mut() {
        sanitize_in_place(node);
    }
    for node in out.pattern_properties.values_mut() {
        sanitize_in_place(node);
    }
    if let Some(items) = out.items.as_deref_mut() {
        sanitize_in_place(items);
    }
    if let Some(AdditionalProperties::Schema(node)) = out.additional_properties.as_mut() {
        sanitize_in_place(node);
    }
    for node in out
        .all_of
        .iter_mut()
        .chain(out.any_of.iter_mut())
        .chain(out.one_of.iter_mut())
    {
        sanitize_in_place(node);
    }

    out
}

fn sanitize_in_place(node: &mut SchemaNode) {
    if let SchemaNode::Schema(schema) = node {
        **schema = sanitize(schema);
    }
}

/// A number (or numeric-looking text) that is non-finite or whose magnitude exceeds
/// [`MAX_SAFE_INTEGER`].
#[must_use]
pub fn is_unsafe_number(value: &Literal) -> bool {
    match value {
        Literal::Number(number) => number.as_f64().is_none_or(out_of_range),
        Literal::String(text) => numeric_text(text).is_some_and(out_of_range),
        _ => false,
    }
}

/// A real number literal that is finite and within the safe range.
#[must_use]
pub fn is_safe_number(value: &Literal) -> bool {
    matches!(value, Literal::Number(_)) && !is_unsafe_number(value)
}

fn out_of_range(f: f64) -> bool {
    !f.is_finite() || f.abs() > MAX_SAFE_INTEGER
}

fn numeric_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if NUMERIC_TEXT.is_match(text) {
        text.parse().ok()
    } else {
        None
    }
}
