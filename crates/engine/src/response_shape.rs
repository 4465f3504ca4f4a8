//! Success-response shape detection.
//!
//! Classifies the declared success response of an operation so generated code can show how to
//! unwrap it: a top-level array, a single wrapped resource (`{"droplet": {...}}`), a union of
//! wrapped resources where only one key is present at runtime, or a flat resource.

use crate::composition::flatten_schema;
use crate::config::IMPORTANT_FIELDS;
use crate::operation::{OperationDescriptor, ResponseDescriptor};
use crate::resolver::SchemaResolver;
use crate::schema::{InlineSchema, ResolvedSchema, SchemaNode, SchemaType};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::sync::Arc;

const SUCCESS_STATUSES: [u16; 4] = [200, 201, 202, 204];

/// Wrapper keys that never count as the resource itself.
const AUXILIARY_KEYS: [&str; 4] = ["action", "actions", "links", "meta"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Single,
    Union,
    Array,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseVariant {
    pub key: String,
    pub is_array: bool,
    pub important_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseShape {
    pub status: String,
    pub kind: ShapeKind,
    /// One entry per candidate for `Union`; at most one for `Single`; none for `Array`.
    pub variants: Vec<ResponseVariant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_resource: Option<String>,
    pub wrapper_keys: Vec<String>,
    pub has_actions: bool,
    /// Identifier fields of the top-level resource (flat `Single`) or array items (`Array`).
    pub important_fields: Vec<String>,
}

/// Pick the success status key: 200, 201, 202, 204 literally, then the same set by numeric
/// value in ascending order.
#[must_use]
pub fn select_success_status<V>(responses: &IndexMap<String, V>) -> Option<&str> {
    for status in SUCCESS_STATUSES {
        if let Some((key, _)) = responses.get_key_value(status.to_string().as_str()) {
            return Some(key);
        }
    }

    let mut numeric: Vec<(u16, &str)> = responses
        .keys()
        .filter_map(|k| k.trim().parse::<u16>().ok().map(|n| (n, k.as_str())))
        .collect();
    numeric.sort_by_key(|(n, _)| *n);
    numeric
        .into_iter()
        .find(|(n, _)| SUCCESS_STATUSES.contains(n))
        .map(|(_, k)| k)
}

/// Analyze the success response of `operation`. `None` when there is no success response or
/// it declares no JSON schema.
#[must_use]
pub fn analyze(resolver: &SchemaResolver, operation: &OperationDescriptor) -> Option<ResponseShape> {
    let status = select_success_status(&operation.responses)?;
    let ResponseDescriptor {
        schema: Some(node), ..
    } = &operation.responses[status]
    else {
        return None;
    };

    let root = match resolver.resolve_node(node) {
        Ok(root) => root,
        Err(e) => {
            tracing::debug!(status, error = %e, "response schema could not be resolved");
            return None;
        }
    };

    if root.schema_type == Some(SchemaType::Array) {
        return Some(ResponseShape {
            status: status.to_string(),
            kind: ShapeKind::Array,
            variants: Vec::new(),
            primary_resource: None,
            wrapper_keys: Vec::new(),
            has_actions: false,
            important_fields: root
                .items
                .as_ref()
                .map(|items| important_fields_of(resolver, items))
                .unwrap_or_default(),
        });
    }

    // Property sets to scan: one per union variant, or the flattened root.
    let mut scopes: Vec<IndexMap<String, SchemaNode>> = Vec::new();
    let branches = root.union_branches();
    if branches.is_empty() {
        scopes.push(flatten_schema(resolver, &root).properties);
    } else {
        for branch in branches {
            if let Some(schema) = resolve_logged(resolver, branch) {
                scopes.push(flatten_schema(resolver, &schema).properties);
            }
        }
    }

    let mut wrappers: IndexMap<String, bool> = IndexMap::new();
    let mut flat_fields: IndexSet<String> = IndexSet::new();
    for props in &scopes {
        for (key, prop) in props {
            if let Some(is_array) = wrapper_kind(resolver, prop) {
                wrappers.entry(key.clone()).or_insert(is_array);
            }
        }
        for field in IMPORTANT_FIELDS {
            if props.contains_key(field) {
                flat_fields.insert(field.to_string());
            }
        }
    }

    let wrapper_keys: Vec<String> = wrappers.keys().cloned().collect();
    let has_actions = wrapper_keys
        .iter()
        .any(|k| k == "action" || k == "actions");

    let variants: Vec<ResponseVariant> = wrappers
        .iter()
        .filter(|(key, _)| !AUXILIARY_KEYS.contains(&key.as_str()))
        .map(|(key, is_array)| ResponseVariant {
            key: key.clone(),
            is_array: *is_array,
            important_fields: scopes
                .iter()
                .find_map(|props| props.get(key))
                .map(|prop| important_fields_of(resolver, prop))
                .unwrap_or_default(),
        })
        .collect();

    let kind = if variants.len() > 1 {
        ShapeKind::Union
    } else {
        ShapeKind::Single
    };

    // Flat fields only matter when there is no wrapped resource.
    let mut important_fields: Vec<String> = if variants.is_empty() {
        flat_fields.into_iter().collect()
    } else {
        Vec::new()
    };
    sort_important(&mut important_fields);

    Some(ResponseShape {
        status: status.to_string(),
        kind,
        primary_resource: wrapper_keys.first().cloned(),
        variants,
        wrapper_keys,
        has_actions,
        important_fields,
    })
}

/// `Some(is_array)` when a property holds a wrapped resource.
fn wrapper_kind(resolver: &SchemaResolver, prop: &SchemaNode) -> Option<bool> {
    match prop {
        SchemaNode::Reference(reference) => {
            let is_array = resolver
                .resolve(reference)
                .is_ok_and(|s| s.schema_type == Some(SchemaType::Array));
            Some(is_array)
        }
        SchemaNode::Inline(schema) if schema.schema_type == Some(SchemaType::Array) => {
            let items = schema.items.as_ref()?;
            match items {
                SchemaNode::Reference(_) => Some(true),
                SchemaNode::Inline(item) => is_resource(item).then_some(true),
            }
        }
        SchemaNode::Inline(schema) => is_resource(schema).then_some(false),
    }
}

fn is_resource(schema: &InlineSchema) -> bool {
    schema.is_object_like() || (schema.schema_type.is_none() && !schema.all_of.is_empty())
}

/// Important identifier fields of a resource node (items for arrays).
fn important_fields_of(resolver: &SchemaResolver, node: &SchemaNode) -> Vec<String> {
    let Some(schema) = resolve_logged(resolver, node) else {
        return Vec::new();
    };
    let resource = if schema.schema_type == Some(SchemaType::Array) {
        let Some(item) = schema
            .items
            .as_ref()
            .and_then(|items| resolve_logged(resolver, items))
        else {
            return Vec::new();
        };
        item
    } else {
        schema
    };
    let props = flatten_schema(resolver, &resource).properties;
    IMPORTANT_FIELDS
        .iter()
        .filter(|f| props.contains_key(**f))
        .map(|f| (*f).to_string())
        .collect()
}

fn resolve_logged(resolver: &SchemaResolver, node: &SchemaNode) -> Option<Arc<ResolvedSchema>> {
    resolver
        .resolve_node(node)
        .inspect_err(|e| tracing::debug!(error = %e, "skipping unresolved response branch"))
        .ok()
}

fn sort_important(fields: &mut [String]) {
    fields.sort_by_key(|f| IMPORTANT_FIELDS.iter().position(|i| *i == f.as_str()));
}
