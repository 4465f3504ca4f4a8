//! MCP tool surface.
//!
//! Tool failures (unknown API, missing operation, bad arguments) are returned as tool results with
//! `isError: true`; only an unknown tool name is a protocol-level error.

use crate::error::{Result, ServerError};
use crate::registry::{ApiSpec, SpecRegistry};
use apiscope_engine::{ExampleEngine, SchemaNode, get_operation, get_schema};
use regex::{Regex, RegexBuilder};
use rmcp::model::{CallToolResult, Content, JsonObject, Tool, ToolAnnotations};
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Error)]
#[error("Unknown tool: {0}")]
pub struct UnknownTool(pub String);

pub struct ToolHandler {
    registry: Arc<SpecRegistry>,
    engine: Arc<ExampleEngine>,
}

impl ToolHandler {
    #[must_use]
    pub fn new(registry: Arc<SpecRegistry>, engine: Arc<ExampleEngine>) -> Self {
        Self { registry, engine }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<ExampleEngine> {
        &self.engine
    }

    /// The tool definitions advertised by `tools/list`.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        let api_path_method = json!({
            "type": "object",
            "properties": {
                "api": {"type": "string", "description": "API name (see list_apis)"},
                "path": {"type": "string", "description": "Path template, e.g. /pets/{petId}"},
                "method": {"type": "string", "description": "HTTP method (case-insensitive)"}
            },
            "required": ["api", "path", "method"]
        });

        vec![
            tool(
                "list_apis",
                "List the loaded APIs with title, version, and operation count.",
                json!({"type": "object", "properties": {}}),
                true,
            ),
            tool(
                "search_operations",
                "Search operations by path, operationId, summary, or tag. The query is a \
                 case-insensitive regular expression (plain text works too).",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string"},
                        "api": {"type": "string", "description": "Restrict to one API"},
                        "limit": {"type": "integer", "minimum": 1, "default": DEFAULT_SEARCH_LIMIT}
                    },
                    "required": ["query"]
                }),
                true,
            ),
            tool(
                "get_endpoint_details",
                "Describe one operation (parameters, request body, responses) with a generated \
                 code example.",
                api_path_method.clone(),
                true,
            ),
            tool(
                "get_schema",
                "Show a named component schema and a synthesized example value.",
                json!({
                    "type": "object",
                    "properties": {
                        "api": {"type": "string"},
                        "name": {"type": "string", "description": "Name under components.schemas"}
                    },
                    "required": ["api", "name"]
                }),
                true,
            ),
            tool(
                "generate_code_example",
                "Generate a ready-to-run client code example for one operation.",
                api_path_method,
                true,
            ),
            tool(
                "reload_specs",
                "Reload spec files from disk and drop cached examples.",
                json!({"type": "object", "properties": {}}),
                false,
            ),
        ]
    }

    /// Run a tool.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownTool`] if `name` is not one of [`Self::tools`].
    pub async fn call(
        &self,
        name: &str,
        args: &JsonObject,
    ) -> std::result::Result<CallToolResult, UnknownTool> {
        let outcome = match name {
            "list_apis" => Ok(self.list_apis()),
            "search_operations" => self.search_operations(args),
            "get_endpoint_details" => self.get_endpoint_details(args),
            "get_schema" => self.get_schema(args),
            "generate_code_example" => self.generate_code_example(args),
            "reload_specs" => self.reload_specs().await,
            _ => return Err(UnknownTool(name.to_string())),
        };

        Ok(match outcome {
            Ok(body) => {
                let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
                CallToolResult::success(vec![Content::text(text)])
            }
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "tool call failed");
                CallToolResult {
                    content: vec![Content::text(e.to_string())],
                    structured_content: None,
                    is_error: Some(true),
                    meta: None,
                }
            }
        })
    }

    fn list_apis(&self) -> Value {
        let apis: Vec<Value> = self
            .registry
            .list()
            .iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "title": spec.title,
                    "version": spec.version,
                    "operations": spec.operations.len(),
                })
            })
            .collect();
        json!({ "apis": apis })
    }

    fn search_operations(&self, args: &JsonObject) -> Result<Value> {
        let query = str_arg(args, "query")?;
        let limit = match args.get("limit") {
            None | Some(Value::Null) => DEFAULT_SEARCH_LIMIT,
            Some(v) => v
                .as_u64()
                .filter(|n| *n >= 1)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    ServerError::InvalidArguments("'limit' must be a positive integer".to_string())
                })?,
        };
        let specs = match opt_str_arg(args, "api")? {
            Some(api) => vec![self.registry.require(api)?],
            None => self.registry.list(),
        };

        let pattern = search_pattern(query)?;
        let mut total = 0usize;
        let mut results = Vec::new();
        for spec in &specs {
            for op in &spec.operations {
                let matched = pattern.is_match(&op.path)
                    || op.operation_id.as_deref().is_some_and(|s| pattern.is_match(s))
                    || op.summary.as_deref().is_some_and(|s| pattern.is_match(s))
                    || op.tags.iter().any(|t| pattern.is_match(t));
                if !matched {
                    continue;
                }
                total += 1;
                if results.len() < limit {
                    results.push(json!({
                        "api": spec.name,
                        "method": op.method,
                        "path": op.path,
                        "operationId": op.operation_id,
                        "summary": op.summary,
                        "deprecated": op.deprecated,
                    }));
                }
            }
        }

        Ok(json!({ "query": query, "total": total, "results": results }))
    }

    fn get_endpoint_details(&self, args: &JsonObject) -> Result<Value> {
        let (spec, path, method) = self.api_path_method(args)?;
        let resolver = self.engine.resolver(&spec.name, &spec.document);
        let operation = get_operation(&resolver, path, method)?;
        let entry = self
            .engine
            .build_example(&spec.name, &spec.document, &operation)?;

        Ok(json!({
            "api": spec.name,
            "operation": operation,
            "responseShape": entry.response_shape,
            "example": entry.example,
        }))
    }

    fn get_schema(&self, args: &JsonObject) -> Result<Value> {
        let spec = self.registry.require(str_arg(args, "api")?)?;
        let name = str_arg(args, "name")?;
        let resolver = self.engine.resolver(&spec.name, &spec.document);
        let schema = get_schema(&resolver, name)?;

        let escaped = name.replace('~', "~0").replace('/', "~1");
        let node = SchemaNode::Reference(format!("#/components/schemas/{escaped}"));
        let example = self.engine.example_value(&resolver, &node);

        Ok(json!({
            "api": spec.name,
            "name": name,
            "schema": schema.to_value(),
            "example": example,
        }))
    }

    fn generate_code_example(&self, args: &JsonObject) -> Result<Value> {
        let (spec, path, method) = self.api_path_method(args)?;
        let entry = self
            .engine
            .example_for(&spec.name, &spec.document, path, method)?;
        let example = &entry.example;

        Ok(json!({
            "api": spec.name,
            "path": path,
            "method": method.to_ascii_uppercase(),
            "imports": example.imports,
            "setup": example.setup,
            "usage": example.usage,
            "fullExample": example.full_example,
            "createdAt": entry.created_at,
        }))
    }

    async fn reload_specs(&self) -> Result<Value> {
        let apis = self.registry.reload().await?;
        self.engine.invalidate_all();
        Ok(json!({ "reloaded": true, "apis": apis }))
    }

    fn api_path_method<'a>(
        &self,
        args: &'a JsonObject,
    ) -> Result<(Arc<ApiSpec>, &'a str, &'a str)> {
        let spec = self.registry.require(str_arg(args, "api")?)?;
        Ok((spec, str_arg(args, "path")?, str_arg(args, "method")?))
    }
}

fn tool(name: &'static str, description: &'static str, schema: Value, read_only: bool) -> Tool {
    let schema_obj = schema.as_object().cloned().unwrap_or_else(JsonObject::new);
    let mut tool = Tool::new(name, description, Arc::new(schema_obj));
    tool.annotations = Some(ToolAnnotations {
        title: None,
        read_only_hint: Some(read_only),
        destructive_hint: Some(false),
        idempotent_hint: Some(true),
        open_world_hint: Some(false),
    });
    tool
}

fn str_arg<'a>(args: &'a JsonObject, key: &str) -> Result<&'a str> {
    opt_str_arg(args, key)?
        .ok_or_else(|| ServerError::InvalidArguments(format!("missing required argument '{key}'")))
}

fn opt_str_arg<'a>(args: &'a JsonObject, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.as_str())),
        Some(_) => Err(ServerError::InvalidArguments(format!(
            "argument '{key}' must be a non-empty string"
        ))),
    }
}

/// Case-insensitive regex; invalid patterns are matched literally.
fn search_pattern(query: &str) -> Result<Regex> {
    let build = |pattern: &str| {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(1 << 20)
            .build()
    };
    build(query)
        .or_else(|_| build(&regex::escape(query)))
        .map_err(|e| ServerError::InvalidArguments(format!("invalid query: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DirectorySource;
    use apiscope_engine::EngineConfig;

    const PETSTORE: &str = r##"
openapi: 3.0.0
info:
  title: Petstore
  version: "1.0"
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        id: { type: integer, format: int64 }
        name: { type: string }
        parent: { $ref: '#/components/schemas/Pet' }
paths:
  /pets:
    get:
      operationId: listPets
      summary: List all pets
      tags: [pets]
      responses:
        200:
          description: ok
          content:
            application/json:
              schema:
                type: array
                items: { $ref: '#/components/schemas/Pet' }
    post:
      operationId: createPet
      tags: [pets]
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: '#/components/schemas/Pet' }
      responses:
        "201":
          description: created
  /stores/{storeId}:
    get:
      operationId: getStore
      summary: Find a store (by id)
      parameters:
        - { name: storeId, in: path, schema: { type: string } }
      responses:
        "200": { description: ok }
"##;

    async fn handler() -> (tempfile::TempDir, ToolHandler) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("petstore.yaml"), PETSTORE).unwrap();
        let registry = Arc::new(SpecRegistry::new(Box::new(DirectorySource::new(dir.path()))));
        registry.reload().await.unwrap();
        let engine = Arc::new(ExampleEngine::new(EngineConfig::default()).unwrap());
        (dir, ToolHandler::new(registry, engine))
    }

    async fn call(h: &ToolHandler, name: &str, args: Value) -> (bool, String) {
        let args = args.as_object().cloned().unwrap_or_default();
        let result = h.call(name, &args).await.unwrap();
        let v = serde_json::to_value(&result).unwrap();
        let is_error = v["isError"].as_bool().unwrap_or(false);
        let text = v["content"][0]["text"].as_str().unwrap().to_string();
        (is_error, text)
    }

    async fn call_ok(h: &ToolHandler, name: &str, args: Value) -> Value {
        let (is_error, text) = call(h, name, args).await;
        assert!(!is_error, "{name} failed: {text}");
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn lists_tools_and_apis() {
        let (_dir, h) = handler().await;
        let names: Vec<_> = h.tools().iter().map(|t| t.name.to_string()).collect();
        assert_eq!(
            names,
            [
                "list_apis",
                "search_operations",
                "get_endpoint_details",
                "get_schema",
                "generate_code_example",
                "reload_specs"
            ]
        );

        let body = call_ok(&h, "list_apis", json!({})).await;
        assert_eq!(body["apis"][0]["name"], "petstore");
        assert_eq!(body["apis"][0]["title"], "Petstore");
        assert_eq!(body["apis"][0]["operations"], 3);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_with_literal_fallback() {
        let (_dir, h) = handler().await;
        let body = call_ok(&h, "search_operations", json!({"query": "PETS"})).await;
        assert_eq!(body["total"], 2);

        let body = call_ok(&h, "search_operations", json!({"query": "(by id"})).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["results"][0]["operationId"], "getStore");

        let body = call_ok(
            &h,
            "search_operations",
            json!({"query": "^/", "limit": 1, "api": "petstore"}),
        )
        .await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn generate_code_example_returns_all_fragments() {
        let (_dir, h) = handler().await;
        let body = call_ok(
            &h,
            "generate_code_example",
            json!({"api": "petstore", "path": "/pets", "method": "post"}),
        )
        .await;
        assert_eq!(body["method"], "POST");
        let usage = body["usage"].as_str().unwrap();
        assert!(usage.contains("name: \"example-name\","), "{usage}");
        assert!(usage.contains("// id: 1,"));
        assert!(body["fullExample"].as_str().unwrap().contains("async function main()"));
        assert!(body["createdAt"].is_string());
    }

    #[tokio::test]
    async fn endpoint_details_and_schema() {
        let (_dir, h) = handler().await;
        let body = call_ok(
            &h,
            "get_endpoint_details",
            json!({"api": "petstore", "path": "/pets", "method": "GET"}),
        )
        .await;
        assert_eq!(body["operation"]["operationId"], "listPets");
        assert_eq!(body["responseShape"]["kind"], "array");
        assert!(body["example"]["usage"].as_str().unwrap().contains("for (const item of response)"));

        let body = call_ok(&h, "get_schema", json!({"api": "petstore", "name": "Pet"})).await;
        assert_eq!(body["schema"]["type"], "object");
        assert_eq!(body["example"], json!({"id": 1, "name": "example-name"}));
    }

    #[tokio::test]
    async fn failures_are_tool_errors() {
        let (_dir, h) = handler().await;
        let (is_error, text) = call(&h, "get_schema", json!({"api": "nope", "name": "Pet"})).await;
        assert!(is_error);
        assert!(text.contains("Unknown API"));

        let (is_error, text) = call(
            &h,
            "generate_code_example",
            json!({"api": "petstore", "path": "/pets", "method": "delete"}),
        )
        .await;
        assert!(is_error);
        assert!(text.contains("Operation not found"));

        let (is_error, text) = call(&h, "search_operations", json!({})).await;
        assert!(is_error);
        assert!(text.contains("'query'"));

        let (is_error, _) = call(&h, "search_operations", json!({"query": "x", "limit": 0})).await;
        assert!(is_error);

        let args = JsonObject::new();
        assert!(h.call("nope", &args).await.is_err());
    }

    #[tokio::test]
    async fn reload_invalidates_examples() {
        let (dir, h) = handler().await;
        call_ok(
            &h,
            "generate_code_example",
            json!({"api": "petstore", "path": "/pets", "method": "get"}),
        )
        .await;
        assert_eq!(h.engine().cache().len(), 1);

        std::fs::write(dir.path().join("extra.json"), r#"{"paths": {}}"#).unwrap();
        let body = call_ok(&h, "reload_specs", json!({})).await;
        assert_eq!(body["apis"], 2);
        assert!(h.engine().cache().is_empty());
    }
}
