//! Code-example rendering for the `client(path, { method, path?, query?, body? })` convention.

use crate::operation::{OperationDescriptor, ParamLocation};
use crate::response_shape::{ResponseShape, ResponseVariant, ShapeKind};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

const INDENT: &str = "  ";

/// A generated snippet, split so callers can show only the part they need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedExample {
    pub imports: String,
    pub setup: String,
    pub usage: String,
    pub full_example: String,
}

/// One synthesized `key: value` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExampleField {
    pub name: String,
    pub value: Value,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyExample {
    /// Object body, flattened. `union_variants` is set when a `oneOf`/`anyOf` branch was picked.
    Fields {
        fields: Vec<ExampleField>,
        union_variants: Option<usize>,
    },
    /// Non-object body emitted as a whole.
    Whole(Value),
}

/// Everything the renderer needs about the request side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestExample {
    pub path_params: Vec<ExampleField>,
    pub query_params: Vec<ExampleField>,
    /// Header and cookie parameters: listed, not passed.
    pub side_params: Vec<(ParamLocation, String, bool)>,
    pub body: Option<BodyExample>,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub api: &'a str,
    pub client_module: &'a str,
}

#[must_use]
pub fn render(
    ctx: RenderContext<'_>,
    operation: &OperationDescriptor,
    request: &RequestExample,
    shape: Option<&ResponseShape>,
) -> GeneratedExample {
    let imports = format!(
        "import {{ createClient }} from {};",
        js_string(ctx.client_module)
    );
    let setup = format!("const client = createClient({});", js_string(ctx.api));

    let mut usage = String::new();
    render_request(&mut usage, operation, request);
    render_response(&mut usage, shape);

    let mut full_example = format!("{imports}\n\n{setup}\n\nasync function main() {{\n");
    for line in usage.lines() {
        if line.is_empty() {
            full_example.push('\n');
        } else {
            let _ = writeln!(full_example, "{INDENT}{line}");
        }
    }
    full_example.push_str("}\n\nmain().catch(console.error);\n");

    GeneratedExample {
        imports,
        setup,
        usage,
        full_example,
    }
}

fn render_request(out: &mut String, operation: &OperationDescriptor, request: &RequestExample) {
    if operation.deprecated {
        out.push_str("// Deprecated: this operation may be removed in a future API version.\n");
    }
    if let Some(summary) = operation.summary.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "// {}", summary.lines().next().unwrap_or_default());
    }
    if !request.side_params.is_empty() {
        let listed: Vec<String> = request
            .side_params
            .iter()
            .map(|(location, name, required)| {
                let req = if *required { ", required" } else { "" };
                format!("{name} ({}{req})", location.as_str())
            })
            .collect();
        let _ = writeln!(
            out,
            "// Header/cookie parameters (configure on the client): {}",
            listed.join(", ")
        );
    }
    if let Some(BodyExample::Fields {
        union_variants: Some(n),
        ..
    }) = &request.body
        && *n > 1
    {
        let _ = writeln!(
            out,
            "// The request body accepts one of {n} variants; only the first is shown."
        );
    }

    let _ = writeln!(
        out,
        "const response = await client({}, {{",
        js_string(&operation.path)
    );
    let _ = writeln!(out, "{INDENT}method: {},", js_string(&operation.method));
    render_object_entry(out, "path", &request.path_params);
    render_object_entry(out, "query", &request.query_params);
    match &request.body {
        Some(BodyExample::Fields { fields, .. }) => render_object_entry(out, "body", fields),
        Some(BodyExample::Whole(value)) => {
            let _ = writeln!(out, "{INDENT}body: {},", js_value(value));
        }
        None => {}
    }
    out.push_str("});\n");
}

fn render_object_entry(out: &mut String, key: &str, fields: &[ExampleField]) {
    if fields.is_empty() {
        return;
    }
    let _ = writeln!(out, "{INDENT}{key}: {{");
    for field in fields {
        let comment = if field.required { "" } else { "// " };
        let _ = writeln!(
            out,
            "{INDENT}{INDENT}{comment}{}: {},",
            js_key(&field.name),
            js_value(&field.value)
        );
    }
    let _ = writeln!(out, "{INDENT}}},");
}

fn render_response(out: &mut String, shape: Option<&ResponseShape>) {
    out.push('\n');
    let Some(shape) = shape else {
        out.push_str("console.log(response);\n");
        return;
    };

    match shape.kind {
        ShapeKind::Array => render_loop(out, "", "response", &shape.important_fields),
        ShapeKind::Single => match shape.variants.first() {
            Some(variant) => render_variant(out, "", variant),
            None => render_log(out, "", "response", &shape.important_fields),
        },
        ShapeKind::Union => {
            for (i, variant) in shape.variants.iter().enumerate() {
                let keyword = if i == 0 { "if" } else { "} else if" };
                let _ = writeln!(out, "{keyword} ({} in response) {{", js_string(&variant.key));
                render_variant(out, INDENT, variant);
            }
            out.push_str("}\n");
        }
    }

    if shape.has_actions {
        out.push_str("// The response also reports the triggered action; poll it to track progress.\n");
    }
}

fn render_variant(out: &mut String, indent: &str, variant: &ResponseVariant) {
    let access = member_access("response", &variant.key);
    if variant.is_array {
        render_loop(out, indent, &access, &variant.important_fields);
    } else {
        render_log(out, indent, &access, &variant.important_fields);
    }
}

fn render_loop(out: &mut String, indent: &str, iterable: &str, fields: &[String]) {
    let _ = writeln!(out, "{indent}for (const item of {iterable}) {{");
    render_log(out, &format!("{indent}{INDENT}"), "item", fields);
    let _ = writeln!(out, "{indent}}}");
}

fn render_log(out: &mut String, indent: &str, target: &str, fields: &[String]) {
    if fields.is_empty() {
        let _ = writeln!(out, "{indent}console.log({target});");
        return;
    }
    let args: Vec<String> = fields.iter().map(|f| member_access(target, f)).collect();
    let _ = writeln!(out, "{indent}console.log({});", args.join(", "));
}

fn member_access(target: &str, key: &str) -> String {
    if is_identifier(key) {
        format!("{target}.{key}")
    } else {
        format!("{target}[{}]", js_string(key))
    }
}

fn js_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        js_string(key)
    }
}

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn js_value(value: &Value) -> String {
    value.to_string()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn op(path: &str, method: &str) -> OperationDescriptor {
        OperationDescriptor {
            path: path.to_string(),
            method: method.to_string(),
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            deprecated: false,
            parameters: Vec::new(),
            request_body: None,
            responses: IndexMap::new(),
        }
    }

    fn field(name: &str, value: Value, required: bool) -> ExampleField {
        ExampleField {
            name: name.to_string(),
            value,
            required,
        }
    }

    const CTX: RenderContext<'static> = RenderContext {
        api: "petstore",
        client_module: "@apiscope/client",
    };

    #[test]
    fn required_fields_live_optional_commented() {
        let request = RequestExample {
            path_params: vec![field("petId", json!("abc123"), true)],
            query_params: vec![field("limit", json!(10), false)],
            side_params: vec![(ParamLocation::Header, "X-Trace".to_string(), true)],
            body: Some(BodyExample::Fields {
                fields: vec![
                    field("name", json!("example-name"), true),
                    field("tag-line", json!("example-string"), false),
                ],
                union_variants: None,
            }),
        };
        let ex = render(CTX, &op("/pets/{petId}", "PUT"), &request, None);

        assert_eq!(ex.imports, r#"import { createClient } from "@apiscope/client";"#);
        assert_eq!(ex.setup, r#"const client = createClient("petstore");"#);
        assert!(ex.usage.contains(r#"const response = await client("/pets/{petId}", {"#));
        assert!(ex.usage.contains(r#"  method: "PUT","#));
        assert!(ex.usage.contains(r#"    petId: "abc123","#));
        assert!(ex.usage.contains("    // limit: 10,"));
        assert!(ex.usage.contains(r#"    name: "example-name","#));
        assert!(ex.usage.contains(r#"    // "tag-line": "example-string","#));
        assert!(ex.usage.contains("X-Trace (header, required)"));
        assert!(ex.usage.ends_with("console.log(response);\n"));
    }

    #[test]
    fn full_example_wraps_usage_in_main() {
        let ex = render(CTX, &op("/pets", "GET"), &RequestExample::default(), None);
        assert!(ex.full_example.starts_with(&ex.imports));
        assert!(ex.full_example.contains("async function main() {\n  const response"));
        assert!(ex.full_example.ends_with("}\n\nmain().catch(console.error);\n"));
        // No empty path/query/body objects.
        assert!(!ex.usage.contains("query:"));
        assert!(!ex.usage.contains("body:"));
    }

    #[test]
    fn union_response_has_no_trailing_else() {
        let shape = ResponseShape {
            status: "200".to_string(),
            kind: ShapeKind::Union,
            variants: vec![
                ResponseVariant {
                    key: "droplet".to_string(),
                    is_array: false,
                    important_fields: vec!["id".to_string(), "name".to_string()],
                },
                ResponseVariant {
                    key: "droplets".to_string(),
                    is_array: true,
                    important_fields: vec!["id".to_string()],
                },
            ],
            primary_resource: Some("droplet".to_string()),
            wrapper_keys: vec!["droplet".to_string(), "droplets".to_string()],
            has_actions: false,
            important_fields: Vec::new(),
        };
        let ex = render(CTX, &op("/droplets", "POST"), &RequestExample::default(), Some(&shape));
        let expected = "\
if (\"droplet\" in response) {
  console.log(response.droplet.id, response.droplet.name);
} else if (\"droplets\" in response) {
  for (const item of response.droplets) {
    console.log(item.id);
  }
}
";
        assert!(ex.usage.ends_with(expected), "{}", ex.usage);
        assert!(!ex.usage.contains("else {"));
    }

    #[test]
    fn union_body_and_deprecated_notes() {
        let mut operation = op("/things", "POST");
        operation.deprecated = true;
        let request = RequestExample {
            body: Some(BodyExample::Fields {
                fields: vec![field("kind", json!("a"), true)],
                union_variants: Some(3),
            }),
            ..RequestExample::default()
        };
        let ex = render(CTX, &operation, &request, None);
        assert!(ex.usage.starts_with("// Deprecated"));
        assert!(ex.usage.contains("one of 3 variants; only the first is shown"));
    }

    #[test]
    fn whole_body_and_flat_single() {
        let request = RequestExample {
            body: Some(BodyExample::Whole(json!(["example-string"]))),
            ..RequestExample::default()
        };
        let shape = ResponseShape {
            status: "201".to_string(),
            kind: ShapeKind::Single,
            variants: Vec::new(),
            primary_resource: None,
            wrapper_keys: Vec::new(),
            has_actions: true,
            important_fields: vec!["id".to_string()],
        };
        let ex = render(CTX, &op("/tags", "POST"), &request, Some(&shape));
        assert!(ex.usage.contains(r#"  body: ["example-string"],"#));
        assert!(ex.usage.contains("console.log(response.id);"));
        assert!(ex.usage.contains("triggered action"));
    }

    #[test]
    fn identifier_detection() {
        assert!(is_identifier("petId"));
        assert!(is_identifier("_x$"));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier("content-type"));
        assert!(!is_identifier(""));
        assert_eq!(member_access("r", "a.b"), r#"r["a.b"]"#);
    }
}
