//! Operation lookup over a loaded `OpenAPI` document.
//!
//! Descriptors are built fresh on every lookup; the document is the source of truth.

use crate::error::{EngineError, Result};
use crate::resolver::SchemaResolver;
use crate::schema::{ResolvedSchema, SchemaNode};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Parameter location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
    /// Parameter-level `example` (or the first of `examples`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBodyDescriptor {
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub path: String,
    /// Upper-case HTTP method.
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyDescriptor>,
    /// Status code (as written in the document) → response.
    pub responses: IndexMap<String, ResponseDescriptor>,
}

impl OperationDescriptor {
    pub fn parameters_in(
        &self,
        location: ParamLocation,
    ) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }
}

/// A compact listing entry (used for API overviews and search).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

/// Look up `method path` in the document.
///
/// # Errors
///
/// Returns [`EngineError::PathNotFound`] if the path is not declared, or
/// [`EngineError::OperationNotFound`] if the path has no operation for `method`.
pub fn get_operation(
    resolver: &SchemaResolver,
    path: &str,
    method: &str,
) -> Result<OperationDescriptor> {
    let not_found = || EngineError::PathNotFound {
        path: path.to_string(),
    };

    let raw_item = resolver
        .document()
        .get("paths")
        .and_then(|p| p.get(path))
        .ok_or_else(not_found)?;
    let path_item = resolver.deref_value(raw_item).map_err(|e| {
        tracing::warn!(path, error = %e, "path item $ref could not be resolved");
        not_found()
    })?;

    let method_lc = method.to_ascii_lowercase();
    let operation = HTTP_METHODS
        .contains(&method_lc.as_str())
        .then(|| path_item.get(&method_lc))
        .flatten()
        .filter(|op| op.is_object())
        .ok_or_else(|| EngineError::OperationNotFound {
            path: path.to_string(),
            method: method.to_ascii_uppercase(),
        })?;

    let parameters = merge_parameters(
        resolver,
        path_item.get("parameters"),
        operation.get("parameters"),
    );

    let request_body = operation
        .get("requestBody")
        .and_then(|raw| match resolver.deref_value(raw) {
            Ok(body) => Some(parse_request_body(body)),
            Err(e) => {
                tracing::warn!(path, error = %e, "requestBody $ref could not be resolved");
                None
            }
        });

    let mut responses = IndexMap::new();
    if let Some(raw_responses) = operation.get("responses").and_then(Value::as_object) {
        for (status, raw) in raw_responses {
            match resolver.deref_value(raw) {
                Ok(resp) => {
                    responses.insert(status.clone(), parse_response(resp));
                }
                Err(e) => {
                    tracing::warn!(path, status = %status, error = %e, "response $ref could not be resolved");
                }
            }
        }
    }

    Ok(OperationDescriptor {
        path: path.to_string(),
        method: method_lc.to_ascii_uppercase(),
        operation_id: str_field(operation, "operationId"),
        summary: str_field(operation, "summary"),
        description: str_field(operation, "description"),
        tags: string_list(operation.get("tags")),
        deprecated: bool_field(operation, "deprecated"),
        parameters,
        request_body,
        responses,
    })
}

/// List every operation in document order.
#[must_use]
pub fn list_operations(document: &Value) -> Vec<OperationSummary> {
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        // Keys are visited in document order; only HTTP method keys are operations.
        for (key, op) in item {
            if !HTTP_METHODS.contains(&key.as_str()) || !op.is_object() {
                continue;
            }
            out.push(OperationSummary {
                method: key.to_ascii_uppercase(),
                path: path.clone(),
                operation_id: str_field(op, "operationId"),
                summary: str_field(op, "summary"),
                tags: string_list(op.get("tags")),
                deprecated: bool_field(op, "deprecated"),
            });
        }
    }
    out
}

/// Look up `#/components/schemas/<name>`.
///
/// # Errors
///
/// Returns [`EngineError::SchemaNotFound`] if the schema is not declared (or its ref chain is
/// broken).
pub fn get_schema(resolver: &SchemaResolver, name: &str) -> Result<Arc<ResolvedSchema>> {
    let escaped = name.replace('~', "~0").replace('/', "~1");
    resolver
        .resolve(&format!("#/components/schemas/{escaped}"))
        .map_err(|e| {
            tracing::debug!(name, error = %e, "schema lookup failed");
            EngineError::SchemaNotFound {
                name: name.to_string(),
            }
        })
}

/// Names declared under `components.schemas`, in document order.
#[must_use]
pub fn schema_names(document: &Value) -> Vec<String> {
    document
        .pointer("/components/schemas")
        .and_then(Value::as_object)
        .map(|schemas| schemas.keys().cloned().collect())
        .unwrap_or_default()
}

fn merge_parameters(
    resolver: &SchemaResolver,
    path_item_params: Option<&Value>,
    operation_params: Option<&Value>,
) -> Vec<ParameterDescriptor> {
    let mut merged: Vec<ParameterDescriptor> = Vec::new();
    let mut index: HashMap<(ParamLocation, String), usize> = HashMap::new();

    let all = [path_item_params, operation_params]
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flatten();

    for raw in all {
        let Some(param) = parse_parameter(resolver, raw) else {
            continue;
        };
        let key = (param.location, param.name.clone());
        if let Some(i) = index.get(&key).copied() {
            merged[i] = param;
        } else {
            index.insert(key, merged.len());
            merged.push(param);
        }
    }

    merged
}

fn parse_parameter(resolver: &SchemaResolver, raw: &Value) -> Option<ParameterDescriptor> {
    let param = match resolver.deref_value(raw) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "skipping parameter with unresolved $ref");
            return None;
        }
    };

    let name = str_field(param, "name")?;
    let Some(location) = param
        .get("in")
        .and_then(Value::as_str)
        .and_then(ParamLocation::parse)
    else {
        tracing::warn!(name = %name, "skipping parameter with unknown location");
        return None;
    };

    let schema = param
        .get("schema")
        .or_else(|| {
            param
                .get("content")
                .and_then(Value::as_object)
                .and_then(select_media)
                .and_then(|(_, media)| media.get("schema"))
        })
        .map(SchemaNode::from_value);

    let example = param.get("example").cloned().or_else(|| {
        param
            .get("examples")
            .and_then(Value::as_object)
            .and_then(|examples| examples.values().next())
            .and_then(|ex| resolver.deref_value(ex).ok())
            .and_then(|ex| ex.get("value"))
            .cloned()
    });

    Some(ParameterDescriptor {
        // Path params are always required.
        required: location == ParamLocation::Path || bool_field(param, "required"),
        name,
        location,
        description: str_field(param, "description"),
        schema,
        example,
        deprecated: bool_field(param, "deprecated"),
    })
}

fn parse_request_body(body: &Value) -> RequestBodyDescriptor {
    let media = body
        .get("content")
        .and_then(Value::as_object)
        .and_then(select_media);
    RequestBodyDescriptor {
        required: bool_field(body, "required"),
        description: str_field(body, "description"),
        content_type: media.map(|(ct, _)| ct.to_string()),
        schema: media
            .and_then(|(_, m)| m.get("schema"))
            .map(SchemaNode::from_value),
    }
}

fn parse_response(resp: &Value) -> ResponseDescriptor {
    let media = resp
        .get("content")
        .and_then(Value::as_object)
        .and_then(select_media);
    ResponseDescriptor {
        description: str_field(resp, "description"),
        content_type: media.map(|(ct, _)| ct.to_string()),
        schema: media
            .and_then(|(_, m)| m.get("schema"))
            .map(SchemaNode::from_value),
    }
}

/// Select a JSON-ish media type, falling back to the first declared one.
fn select_media(content: &Map<String, Value>) -> Option<(&str, &Value)> {
    if let Some(mt) = content.get("application/json") {
        return Some(("application/json", mt));
    }
    content
        .iter()
        .find(|(k, _)| k.to_ascii_lowercase().contains("json"))
        .or_else(|| content.iter().next())
        .map(|(k, v)| (k.as_str(), v))
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(v: &Value, key: &str) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
