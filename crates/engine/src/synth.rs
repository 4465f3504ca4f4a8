//! Example value synthesis.
//!
//! Produces a representative JSON value for a schema node. Decision order (first match wins):
//!
//! 1. explicit `example`
//! 2. `default`
//! 3. first `enum` value
//! 4. `$ref` → resolve and recurse (placeholder string if the ref cannot be resolved)
//! 5. dispatch on `type` (format / property-name heuristics for strings)
//!
//! Synthesis never fails. Every `$ref` is expanded at most once per call: a ref seen again
//! (through a cycle or a sibling property) yields "omit this field". A hard depth bound backs
//! the visited set.

use crate::clock::Clock;
use crate::composition::flatten_schema;
use crate::resolver::SchemaResolver;
use crate::schema::{InlineSchema, SchemaNode, SchemaType};
use chrono::SecondsFormat;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;

pub const EXAMPLE_EMAIL: &str = "user@example.com";
pub const EXAMPLE_UUID: &str = "123e4567-e89b-12d3-a456-426614174000";
pub const EXAMPLE_URL: &str = "https://example.com";
pub const EXAMPLE_ID: &str = "abc123";
pub const EXAMPLE_NAME: &str = "example-name";
pub const EXAMPLE_TOKEN: &str = "your-token-here";
pub const EXAMPLE_STRING: &str = "example-string";

const EXAMPLE_NUMBER: i64 = 10;
// int64 fields are usually identifiers, where `1` reads better.
const EXAMPLE_INT64: i64 = 1;

/// Property-name substrings checked (in order) for strings without a known format.
const NAME_HINTS: [(&str, &str); 5] = [
    ("id", EXAMPLE_ID),
    ("name", EXAMPLE_NAME),
    ("email", EXAMPLE_EMAIL),
    ("url", EXAMPLE_URL),
    ("token", EXAMPLE_TOKEN),
];

pub struct ExampleSynthesizer<'a> {
    resolver: &'a SchemaResolver,
    clock: &'a dyn Clock,
    max_depth: usize,
}

#[derive(Default)]
struct Walk {
    /// Refs already expanded during this call.
    visited: HashSet<String>,
    depth: usize,
}

impl<'a> ExampleSynthesizer<'a> {
    #[must_use]
    pub fn new(resolver: &'a SchemaResolver, clock: &'a dyn Clock, max_depth: usize) -> Self {
        Self {
            resolver,
            clock,
            max_depth,
        }
    }

    /// Synthesize a value for `node`, filling the property `property_name` of its enclosing
    /// object (if any). `None` means "omit this field".
    #[must_use]
    pub fn synthesize(&self, node: &SchemaNode, property_name: Option<&str>) -> Option<Value> {
        self.walk_node(node, property_name, &mut Walk::default())
    }

    /// Synthesize a value for an already-inline schema (e.g. a resolved component schema).
    #[must_use]
    pub fn synthesize_schema(
        &self,
        schema: &InlineSchema,
        property_name: Option<&str>,
    ) -> Option<Value> {
        self.walk_inline(schema, property_name, &mut Walk::default())
    }

    fn walk_node(&self, node: &SchemaNode, name: Option<&str>, walk: &mut Walk) -> Option<Value> {
        if walk.depth >= self.max_depth {
            tracing::debug!(depth = walk.depth, "example synthesis depth bound reached");
            return None;
        }

        walk.depth += 1;
        let out = match node {
            SchemaNode::Reference(reference) => self.walk_reference(reference, name, walk),
            SchemaNode::Inline(schema) => self.walk_inline(schema, name, walk),
        };
        walk.depth -= 1;
        out
    }

    fn walk_reference(
        &self,
        reference: &str,
        name: Option<&str>,
        walk: &mut Walk,
    ) -> Option<Value> {
        if walk.visited.contains(reference) {
            tracing::debug!(reference, "$ref already expanded during example synthesis; omitting field");
            return None;
        }

        let schema = match self.resolver.resolve(reference) {
            Ok(schema) => schema,
            Err(e) => {
                tracing::debug!(reference, error = %e, "unresolved $ref during example synthesis");
                return Some(Value::String(format!("<unresolved: {reference}>")));
            }
        };

        walk.visited.insert(reference.to_string());
        self.walk_inline(&schema, name, walk)
    }

    fn walk_inline(
        &self,
        schema: &InlineSchema,
        name: Option<&str>,
        walk: &mut Walk,
    ) -> Option<Value> {
        if let Some(example) = &schema.example {
            return Some(example.clone());
        }
        if let Some(default) = &schema.default {
            return Some(default.clone());
        }
        if let Some(first) = schema.enumeration.first() {
            return Some(first.clone());
        }

        match schema.schema_type {
            Some(SchemaType::String) => Some(Value::String(
                self.string_example(schema.format.as_deref(), name),
            )),
            Some(SchemaType::Number | SchemaType::Integer) => {
                let n = if schema.format.as_deref() == Some("int64") {
                    EXAMPLE_INT64
                } else {
                    EXAMPLE_NUMBER
                };
                Some(Value::from(n))
            }
            Some(SchemaType::Boolean) => Some(Value::Bool(true)),
            Some(SchemaType::Array) => {
                let item = schema
                    .items
                    .as_ref()
                    .and_then(|items| self.walk_node(items, name, walk))
                    .unwrap_or_else(|| Value::String(EXAMPLE_STRING.to_string()));
                Some(Value::Array(vec![item]))
            }
            Some(SchemaType::Object) => Some(self.object_example(schema, walk)),
            None if !schema.properties.is_empty() || !schema.all_of.is_empty() => {
                Some(self.object_example(schema, walk))
            }
            None => {
                let first = schema.union_branches().first()?;
                self.walk_node(first, name, walk)
            }
        }
    }

    fn object_example(&self, schema: &InlineSchema, walk: &mut Walk) -> Value {
        let mut out = Map::new();

        if schema.all_of.is_empty() && schema.union_branches().is_empty() {
            for (prop_name, prop) in &schema.properties {
                if let Some(v) = self.walk_node(prop, Some(prop_name), walk) {
                    out.insert(prop_name.clone(), v);
                }
            }
            return Value::Object(out);
        }

        // Composite object: merge branches first, then walk the merged property set.
        let flattened = flatten_schema(self.resolver, schema);
        let props: IndexMap<String, SchemaNode> = flattened.properties;
        for (prop_name, prop) in &props {
            if let Some(v) = self.walk_node(prop, Some(prop_name), walk) {
                out.insert(prop_name.clone(), v);
            }
        }
        Value::Object(out)
    }

    fn string_example(&self, format: Option<&str>, name: Option<&str>) -> String {
        match format {
            Some("email") => EXAMPLE_EMAIL.to_string(),
            Some("date-time") => self
                .clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            Some("date") => self.clock.now().date_naive().to_string(),
            Some("uuid") => EXAMPLE_UUID.to_string(),
            Some("uri" | "url") => EXAMPLE_URL.to_string(),
            _ => string_example_for_name(name).to_string(),
        }
    }
}

fn string_example_for_name(name: Option<&str>) -> &'static str {
    let Some(name) = name else {
        return EXAMPLE_STRING;
    };
    let lower = name.to_ascii_lowercase();
    NAME_HINTS
        .iter()
        .find(|(hint, _)| lower.contains(hint))
        .map_or(EXAMPLE_STRING, |(_, value)| value)
}
