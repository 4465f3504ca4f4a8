//! `allOf` / `oneOf` flattening for request bodies.
//!
//! - `oneOf` / `anyOf`: only the first declared branch is used. This is a simplification, not a
//!   schema-accurate rendering; the example renderer calls it out in the generated code.
//! - `allOf`: branches are merged in order; a later branch's property replaces an earlier one
//!   with the same name, and `required` sets are unioned.
//! - Direct `properties` / `required` are merged after `allOf`.

use crate::resolver::SchemaResolver;
use crate::schema::{InlineSchema, SchemaNode};
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedBody {
    pub properties: IndexMap<String, SchemaNode>,
    pub required: IndexSet<String>,
    /// Alternative count of the first union encountered (set when a branch was picked by policy).
    pub union_variants: Option<usize>,
}

impl FlattenedBody {
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    /// `(name, schema, required)` in merged order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &SchemaNode, bool)> {
        self.properties
            .iter()
            .map(|(name, node)| (name.as_str(), node, self.is_required(name)))
    }

    /// `true` when the body was a `oneOf`/`anyOf` with more than one alternative.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.union_variants.is_some_and(|n| n > 1)
    }
}

/// Flatten a request body schema node into one property/required set.
///
/// Unresolvable branches are skipped.
#[must_use]
pub fn flatten_request_body(resolver: &SchemaResolver, node: &SchemaNode) -> FlattenedBody {
    let mut out = FlattenedBody::default();
    let mut expanding = Vec::new();
    flatten_node(resolver, node, &mut out, &mut expanding);
    out
}

/// Flatten an already-inline schema.
#[must_use]
pub fn flatten_schema(resolver: &SchemaResolver, schema: &InlineSchema) -> FlattenedBody {
    let mut out = FlattenedBody::default();
    let mut expanding = Vec::new();
    flatten_inline(resolver, schema, &mut out, &mut expanding);
    out
}

fn flatten_node(
    resolver: &SchemaResolver,
    node: &SchemaNode,
    out: &mut FlattenedBody,
    expanding: &mut Vec<String>,
) {
    match node {
        SchemaNode::Inline(schema) => flatten_inline(resolver, schema, out, expanding),
        SchemaNode::Reference(reference) => {
            if expanding.contains(reference) {
                tracing::debug!(%reference, "cyclic composition branch skipped");
                return;
            }
            match resolver.resolve(reference) {
                Ok(schema) => {
                    expanding.push(reference.clone());
                    flatten_inline(resolver, &schema, out, expanding);
                    expanding.pop();
                }
                Err(e) => {
                    tracing::debug!(%reference, error = %e, "unresolved composition branch skipped");
                }
            }
        }
    }
}

fn flatten_inline(
    resolver: &SchemaResolver,
    schema: &InlineSchema,
    out: &mut FlattenedBody,
    expanding: &mut Vec<String>,
) {
    let branches = schema.union_branches();
    if let Some(first) = branches.first() {
        if branches.len() > 1 {
            tracing::debug!(
                variants = branches.len(),
                "union schema: using the first declared variant"
            );
        }
        out.union_variants.get_or_insert(branches.len());
        flatten_node(resolver, first, out, expanding);
    }

    for branch in &schema.all_of {
        flatten_node(resolver, branch, out, expanding);
    }

    for (name, prop) in &schema.properties {
        out.properties.insert(name.clone(), prop.clone());
    }
    out.required.extend(schema.required.iter().cloned());
}
