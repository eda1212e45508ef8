//! Local `$ref` resolution for schema nodes.
//!
//! References are JSON pointers into the description itself (`#/components/schemas/Pet`).
//! Resolution never fails. Each of these becomes the permissive placeholder `{"type": "string"}`:
//! a dangling reference, a reference back into the chain currently being expanded, a reference
//! nested more than [`MAX_REFERENCE_NESTING`] deep, any reference once a single resolution has
//! spent [`MAX_REFERENCE_EXPANSIONS`], and nesting deeper than [`MAX_RESOLVE_DEPTH`].
//!
//! `allOf` is flattened while resolving: the branches are merged into their host, so the
//! output never contains `allOf`.

use crate::description::lookup_pointer;
use crate::schema::{AdditionalProperties, Literal, Schema, SchemaNode, SchemaType};
use tracing::{debug, warn};

/// Deepest nesting expanded before substituting the placeholder.
pub const MAX_RESOLVE_DEPTH: usize = 64;

/// Most `$ref`s expanded inside one another on a single branch.
pub const MAX_REFERENCE_NESTING: usize = 4;

/// Most `$ref`s expanded in total while resolving one schema position.
pub const MAX_REFERENCE_EXPANSIONS: usize = 512;

/// Expands every `$ref` below a schema node against one description root.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver<'a> {
    root: &'a Literal,
}

/// Per-resolution bookkeeping: the reference chain being expanded and the work spent so far.
#[derive(Debug, Default)]
struct Walk {
    active: Vec<String>,
    expansions: usize,
}

impl<'a> SchemaResolver<'a> {
    #[must_use]
    pub fn new(root: &'a Literal) -> Self {
        Self { root }
    }

    /// Resolve `node` into a schema free of references. `None` yields the placeholder.
    #[must_use]
    pub fn resolve(&self, node: Option<&SchemaNode>) -> Schema {
        let mut walk = Walk::default();
        match node {
            Some(node) => self.resolve_node(node, &mut walk, 0),
            None => Schema::string(),
        }
    }

    fn resolve_node(&self, node: &SchemaNode, walk: &mut Walk, depth: usize) -> Schema {
        if depth > MAX_RESOLVE_DEPTH {
            debug!(depth, "schema nesting too deep; substituting placeholder");
            return Schema::string();
        }
        match node {
            SchemaNode::Reference(reference) => self.resolve_reference(reference, walk, depth),
            SchemaNode::Schema(schema) => self.resolve_schema(schema, walk, depth),
        }
    }

    fn resolve_reference(&self, reference: &str, walk: &mut Walk, depth: usize) -> Schema {
        if walk.active.iter().any(|r| r == reference) {
            debug!(reference = %reference, "cyclic $ref; substituting placeholder");
            return Schema::string();
        }
        if walk.active.len() >= MAX_REFERENCE_NESTING {
            debug!(reference = %reference, "$ref nesting limit reached; substituting placeholder");
            return Schema::string();
        }
        if walk.expansions >= MAX_REFERENCE_EXPANSIONS {
            debug!(reference = %reference, "$ref expansion budget spent; substituting placeholder");
            return Schema::string();
        }
        let Some(target) = lookup_pointer(self.root, reference) else {
            warn!(reference = %reference, "unresolved $ref; substituting placeholder");
            return Schema::string();
        };

        let target = SchemaNode::from_literal(target);
        walk.expansions += 1;
        walk.active.push(reference.to_string());
        let resolved = self.resolve_node(&target, walk, depth + 1);
        walk.active.pop();
        resolved
    }

    fn resolve_schema(&self, schema: &Schema, walk: &mut Walk, depth: usize) -> Schema {
        let mut child = |node: &SchemaNode| SchemaNode::from(self.resolve_node(node, walk, depth + 1));

        let mut out = schema.clone();
        out.properties = schema
            .properties
            .iter()
            .map(|(name, node)| (name.clone(), child(node)))
            .collect();
        out.pattern_properties = schema
            .pattern_properties
            .iter()
            .map(|(pattern, node)| (pattern.clone(), child(node)))
            .collect();
        out.items = schema.items.as_deref().map(|node| Box::new(child(node)));
        out.additional_properties = match &schema.additional_properties {
            Some(AdditionalProperties::Schema(node)) => {
                Some(AdditionalProperties::Schema(Box::new(child(node))))
            }
            other => other.clone(),
        };
        out.any_of = schema.any_of.iter().map(&mut child).collect();
        out.one_of = schema.one_of.iter().map(&mut child).collect();

        out.all_of = Vec::new();
        if !schema.all_of.is_empty() {
            let branches: Vec<Schema> = schema
                .all_of
                .iter()
                .map(|node| self.resolve_node(node, walk, depth + 1))
                .collect();
            merge_all_of(&mut out, branches);
        }

        out
    }
}

/// Fold resolved `allOf` branches into `host`.
///
/// When anything involved describes an object, the result is one object schema holding the
/// union of all properties (later branches win) and all required names. Otherwise the branches
/// only fill keywords the host leaves unset, so `allOf: [{$ref: Color}]` stays an enum.
fn merge_all_of(host: &mut Schema, branches: Vec<Schema>) {
    let object_like = |s: &Schema| {
        !s.properties.is_empty()
            || matches!(&s.schema_type, Some(SchemaType::Single(t)) if t == "object")
    };

    if object_like(host) || branches.iter().any(object_like) {
        for branch in branches {
            host.properties.extend(branch.properties);
            for name in branch.required {
                if !host.required.contains(&name) {
                    host.required.push(name);
                }
            }
            if host.description.is_none() {
                host.description = branch.description;
            }
            if host.additional_properties.is_none() {
                host.additional_properties = branch.additional_properties;
            }
        }
        host.schema_type = Some(SchemaType::Single("object".to_string()));
        return;
    }

    for branch in branches {
        fill_missing(host, branch);
    }
}

fn fill_missing(host: &mut Schema, branch: Schema) {
    fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
        if slot.is_none() {
            *slot = value;
        }
    }

    fill(&mut host.schema_type, branch.schema_type);
    fill(&mut host.title, branch.title);
    fill(&mut host.description, branch.description);
    fill(&mut host.format, branch.format);
    fill(&mut host.items, branch.items);
    fill(&mut host.const_value, branch.const_value);
    fill(&mut host.default, branch.default);
    fill(&mut host.minimum, branch.minimum);
    fill(&mut host.maximum, branch.maximum);
    fill(&mut host.exclusive_minimum, branch.exclusive_minimum);
    fill(&mut host.exclusive_maximum, branch.exclusive_maximum);
    fill(&mut host.multiple_of, branch.multiple_of);
    fill(&mut host.min_length, branch.min_length);
    fill(&mut host.max_length, branch.max_length);
    fill(&mut host.pattern, branch.pattern);
    fill(&mut host.min_items, branch.min_items);
    fill(&mut host.max_items, branch.max_items);
    fill(&mut host.unique_items, branch.unique_items);
    if host.enum_values.is_empty() {
        host.enum_values = branch.enum_values;
    }
    if host.any_of.is_empty() {
        host.any_of = branch.any_of;
    }
    if host.one_of.is_empty() {
        host.one_of = branch.one_of;
    }
    for (key, value) in branch.extra {
        host.extra.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPONENTS: &str = r"
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name: { type: string }
        owner: { $ref: '#/components/schemas/Owner' }
        tags: { type: array, items: { $ref: '#/components/schemas/Tag' } }
    Owner:
      type: object
      properties:
        id: { $ref: '#/components/schemas/Id' }
    Id: { type: integer, format: int64 }
    Tag: { type: string }
    Node:
      type: object
      properties:
        value: { type: string }
        children: { type: array, items: { $ref: '#/components/schemas/Node' } }
    Color: { type: string, enum: [red, green] }
    Named:
      type: object
      required: [name]
      properties: { name: { type: string } }
    Aged:
      required: [age]
      properties: { age: { type: integer } }
";

    fn root() -> Literal {
        serde_yaml::from_str(COMPONENTS).expect("yaml")
    }

    fn reference(target: &str) -> SchemaNode {
        SchemaNode::Reference(format!("#/components/schemas/{target}"))
    }

    #[test]
    fn reference_chains_resolve_fully() {
        let root = root();
        let resolved = SchemaResolver::new(&root).resolve(Some(&reference("Pet")));

        assert!(!resolved.contains_reference());
        let json = resolved.to_json();
        assert_eq!(json["properties"]["owner"]["properties"]["id"]["type"], "integer");
        assert_eq!(json["properties"]["tags"]["items"]["type"], "string");
        assert!(!json.to_string().contains("$ref"));
    }

    #[test]
    fn self_reference_terminates_with_placeholder() {
        let root = root();
        let resolved = SchemaResolver::new(&root).resolve(Some(&reference("Node")));

        assert!(!resolved.contains_reference());
        let json = resolved.to_json();
        assert_eq!(json["properties"]["value"]["type"], "string");
        assert_eq!(
            json["properties"]["children"]["items"],
            serde_json::json!({"type": "string"})
        );
    }

    #[test]
    fn unresolved_reference_becomes_string() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        assert_eq!(resolver.resolve(Some(&reference("Missing"))), Schema::string());
        assert_eq!(
            resolver.resolve(Some(&SchemaNode::Reference("other.yaml#/Pet".to_string()))),
            Schema::string()
        );
        assert_eq!(resolver.resolve(None), Schema::string());
    }

    #[test]
    fn all_of_objects_merge_properties_and_required() {
        let root = root();
        let node = SchemaNode::from(Schema {
            description: Some("A person".to_string()),
            all_of: vec![reference("Named"), reference("Aged")],
            ..Schema::default()
        });
        let resolved = SchemaResolver::new(&root).resolve(Some(&node));

        assert!(resolved.all_of.is_empty());
        assert_eq!(resolved.schema_type, Some(SchemaType::Single("object".to_string())));
        assert_eq!(resolved.required, vec!["name".to_string(), "age".to_string()]);
        assert!(resolved.properties.contains_key("name"));
        assert!(resolved.properties.contains_key("age"));
        assert_eq!(resolved.description.as_deref(), Some("A person"));
    }

    #[test]
    fn all_of_scalar_branch_fills_host_keywords() {
        let root = root();
        let node = SchemaNode::from(Schema {
            description: Some("Paint color".to_string()),
            all_of: vec![reference("Color")],
            ..Schema::default()
        });
        let resolved = SchemaResolver::new(&root).resolve(Some(&node));

        assert_eq!(resolved.schema_type, Some(SchemaType::Single("string".to_string())));
        assert_eq!(resolved.enum_values.len(), 2);
        assert_eq!(resolved.description.as_deref(), Some("Paint color"));
    }

    /// `count` components, each with one property referencing every component.
    fn densely_linked(count: usize) -> Literal {
        let mut yaml = String::from("components:\n  schemas:\n");
        for i in 0..count {
            yaml.push_str(&format!("    S{i}:\n      type: object\n      properties:\n"));
            for j in 0..count {
                yaml.push_str(&format!(
                    "        p{j}: {{ $ref: '#/components/schemas/S{j}' }}\n"
                ));
            }
        }
        serde_yaml::from_str(&yaml).expect("yaml")
    }

    fn count_nodes(json: &serde_json::Value) -> usize {
        match json {
            serde_json::Value::Object(map) => 1 + map.values().map(count_nodes).sum::<usize>(),
            serde_json::Value::Array(items) => 1 + items.iter().map(count_nodes).sum::<usize>(),
            _ => 1,
        }
    }

    #[test]
    fn densely_linked_components_resolve_with_bounded_work() {
        let root = densely_linked(12);
        let started = std::time::Instant::now();
        let resolved = SchemaResolver::new(&root).resolve(Some(&reference("S0")));

        assert!(!resolved.contains_reference());
        let json = resolved.to_json();
        assert_eq!(json["properties"]["p1"]["type"], "object");
        // Every expansion contributes at most one object plus its 12 property slots.
        assert!(count_nodes(&json) < (MAX_REFERENCE_EXPANSIONS + 1) * 40);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn reference_nesting_is_capped() {
        let root = densely_linked(MAX_REFERENCE_NESTING + 2);
        let resolved = SchemaResolver::new(&root).resolve(Some(&reference("S0")));

        // S0 -> S1 -> S2 -> S3 are expanded; S3's own references are placeholders.
        let mut json = &resolved.to_json();
        for step in 1..MAX_REFERENCE_NESTING {
            json = &json["properties"][format!("p{step}")];
            assert_eq!(json["type"], "object", "level {step}");
        }
        assert_eq!(json["properties"]["p5"], serde_json::json!({"type": "string"}));
    }

    #[test]
    fn depth_bound_stops_pathological_nesting() {
        let mut node = SchemaNode::from(Schema::string());
        for _ in 0..(MAX_RESOLVE_DEPTH * 2) {
            node = SchemaNode::from(Schema {
                items: Some(Box::new(node)),
                ..Schema::default()
            });
        }
        let root = root();
        let resolved = SchemaResolver::new(&root).resolve(Some(&node));
        assert!(!resolved.contains_reference());
    }
}
