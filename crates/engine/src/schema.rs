//! Tagged schema model.
//!
//! Raw OpenAPI JSON is parsed into [`SchemaNode`], which is either a `$ref` pointer or an inline
//! schema. A JSON object carrying a string `$ref` is always a reference; its sibling keys are
//! ignored, so a reference must be resolved before it can be inspected.

use indexmap::{IndexMap, IndexSet};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Reference(String),
    Inline(Box<InlineSchema>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineSchema {
    pub schema_type: Option<SchemaType>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub properties: IndexMap<String, SchemaNode>,
    pub items: Option<SchemaNode>,
    pub required: IndexSet<String>,
    pub enumeration: Vec<Value>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub all_of: Vec<SchemaNode>,
    pub one_of: Vec<SchemaNode>,
    pub any_of: Vec<SchemaNode>,
}

/// An inline schema with no unresolved top-level `$ref`.
///
/// Only [`crate::resolver::SchemaResolver`] constructs these.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema(pub(crate) InlineSchema);

impl std::ops::Deref for ResolvedSchema {
    type Target = InlineSchema;

    fn deref(&self) -> &InlineSchema {
        &self.0
    }
}

impl ResolvedSchema {
    #[must_use]
    pub fn into_inner(self) -> InlineSchema {
        self.0
    }
}

impl SchemaNode {
    /// Parse a raw JSON schema value. Total: anything that is not a schema object becomes an
    /// empty inline schema.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Inline(Box::default());
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            return Self::Reference(reference.to_string());
        }

        Self::Inline(Box::new(InlineSchema::from_object(obj)))
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Reference(r) => Some(r),
            Self::Inline(_) => None,
        }
    }

    #[must_use]
    pub fn as_inline(&self) -> Option<&InlineSchema> {
        match self {
            Self::Reference(_) => None,
            Self::Inline(s) => Some(s),
        }
    }

    /// Render back to JSON Schema. Only the modelled keywords survive.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Reference(r) => json!({ "$ref": r }),
            Self::Inline(schema) => schema.to_value(),
        }
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl InlineSchema {
    /// Parse the inline part of a schema value, ignoring any `$ref`.
    pub(crate) fn from_value(value: &Value) -> Self {
        value.as_object().map(Self::from_object).unwrap_or_default()
    }

    fn from_object(obj: &serde_json::Map<String, Value>) -> Self {
        let schema_type = match obj.get("type") {
            Some(Value::String(t)) => SchemaType::parse(t),
            // OpenAPI 3.1 allows `type: [string, "null"]`.
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null")
                .and_then(SchemaType::parse),
            _ => None,
        };

        let properties = obj
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, v)| (name.clone(), SchemaNode::from_value(v)))
                    .collect()
            })
            .unwrap_or_default();

        let required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            schema_type,
            format: obj.get("format").and_then(Value::as_str).map(str::to_string),
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            properties,
            items: obj.get("items").map(SchemaNode::from_value),
            required,
            enumeration: obj
                .get("enum")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            default: obj.get("default").cloned(),
            example: obj.get("example").cloned(),
            all_of: parse_branches(obj.get("allOf")),
            one_of: parse_branches(obj.get("oneOf")),
            any_of: parse_branches(obj.get("anyOf")),
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        if let Some(t) = self.schema_type {
            out.insert("type".to_string(), json!(t.as_str()));
        }
        if let Some(format) = &self.format {
            out.insert("format".to_string(), json!(format));
        }
        if let Some(desc) = &self.description {
            out.insert("description".to_string(), json!(desc));
        }
        if !self.properties.is_empty() {
            let props: Map<String, Value> = self
                .properties
                .iter()
                .map(|(name, node)| (name.clone(), node.to_value()))
                .collect();
            out.insert("properties".to_string(), Value::Object(props));
        }
        if !self.required.is_empty() {
            out.insert("required".to_string(), json!(self.required));
        }
        if let Some(items) = &self.items {
            out.insert("items".to_string(), items.to_value());
        }
        if !self.enumeration.is_empty() {
            out.insert("enum".to_string(), json!(self.enumeration));
        }
        if let Some(default) = &self.default {
            out.insert("default".to_string(), default.clone());
        }
        if let Some(example) = &self.example {
            out.insert("example".to_string(), example.clone());
        }
        for (key, branches) in [
            ("allOf", &self.all_of),
            ("oneOf", &self.one_of),
            ("anyOf", &self.any_of),
        ] {
            if !branches.is_empty() {
                let values: Vec<Value> = branches.iter().map(SchemaNode::to_value).collect();
                out.insert(key.to_string(), Value::Array(values));
            }
        }
        Value::Object(out)
    }

    /// `true` for `type: object`, or for untyped schemas that declare `properties`.
    #[must_use]
    pub fn is_object_like(&self) -> bool {
        self.schema_type == Some(SchemaType::Object)
            || (self.schema_type.is_none() && !self.properties.is_empty())
    }

    /// The alternatives of a union schema (`oneOf`, falling back to `anyOf`).
    #[must_use]
    pub fn union_branches(&self) -> &[SchemaNode] {
        if self.one_of.is_empty() {
            &self.any_of
        } else {
            &self.one_of
        }
    }
}

fn parse_branches(value: Option<&Value>) -> Vec<SchemaNode> {
    value
        .and_then(Value::as_array)
        .map(|branches| branches.iter().map(SchemaNode::from_value).collect())
        .unwrap_or_default()
}
