use anyhow::Context as _;
use apiscope_test_support::{
    KillOnDrop, McpClient, call_tool, spawn_stdio_client, tool_call_body_json, tool_call_is_error,
    tool_call_params, tool_call_text,
};
use rmcp::model::ErrorCode;
use rmcp::service::ServiceError;
use serde_json::json;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_apiscope-mcp");
const TIMEOUT: Duration = Duration::from_secs(10);

const DROPLETS: &str = r##"
openapi: 3.0.0
info:
  title: Droplets
  version: "2.0"
components:
  schemas:
    Droplet:
      type: object
      properties:
        id: { type: integer }
        name: { type: string }
        created_at: { type: string, format: date-time }
    DropletCreate:
      type: object
      required: [name, size]
      properties:
        name: { type: string }
        size: { type: string, example: s-1vcpu-1gb }
        tags: { type: array, items: { type: string } }
    DropletMultiCreate:
      type: object
      required: [names]
      properties:
        names: { type: array, items: { type: string } }
paths:
  /v2/droplets:
    post:
      operationId: droplets_create
      summary: Create a new droplet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              oneOf:
                - $ref: '#/components/schemas/DropletCreate'
                - $ref: '#/components/schemas/DropletMultiCreate'
      responses:
        202:
          description: accepted
          content:
            application/json:
              schema:
                oneOf:
                  - type: object
                    properties:
                      droplet: { $ref: '#/components/schemas/Droplet' }
                      links: { type: object, properties: {} }
                  - type: object
                    properties:
                      droplets:
                        type: array
                        items: { $ref: '#/components/schemas/Droplet' }
                      links: { type: object, properties: {} }
"##;

fn specs_dir() -> anyhow::Result<tempfile::TempDir> {
    let dir = tempfile::tempdir().context("create spec dir")?;
    std::fs::write(dir.path().join("digitalocean.yaml"), DROPLETS).context("write spec")?;
    Ok(dir)
}

async fn spawn(dir: &Path) -> anyhow::Result<McpClient> {
    let dir = dir.to_str().context("utf-8 temp dir")?;
    spawn_stdio_client(BIN, ["--specs-dir", dir, "--log-level", "warn"], TIMEOUT).await
}

#[tokio::test]
async fn generates_union_aware_example_over_stdio() -> anyhow::Result<()> {
    let dir = specs_dir()?;
    let client = spawn(dir.path()).await?;

    let info = client.peer_info().context("server info")?;
    assert_eq!(info.server_info.name, "apiscope-mcp");

    let tools = client.list_all_tools().await?;
    assert!(tools.iter().any(|t| t.name == "generate_code_example"));

    let args = json!({"api": "digitalocean", "path": "/v2/droplets", "method": "post"});
    let result = call_tool(&client, "generate_code_example", args, TIMEOUT).await?;
    assert!(!tool_call_is_error(&result));
    let body = tool_call_body_json(&result)?;
    let usage = body["usage"].as_str().context("usage")?;

    assert!(usage.contains("only the first is shown"), "{usage}");
    assert!(usage.contains(r#"    name: "example-name","#));
    assert!(usage.contains(r#"    size: "s-1vcpu-1gb","#));
    assert!(usage.contains(r#"    // tags: ["example-string"],"#));
    assert!(usage.contains(r#"if ("droplet" in response) {"#));
    assert!(usage.contains(r#"} else if ("droplets" in response) {"#));
    assert!(!usage.contains("else {"));
    assert!(!usage.contains(r#""links" in response"#));
    assert_eq!(
        body["imports"],
        r#"import { createClient } from "@apiscope/client";"#
    );

    // Same request again is served from the cache.
    let args = json!({"api": "digitalocean", "path": "/v2/droplets", "method": "POST"});
    let again = call_tool(&client, "generate_code_example", args, TIMEOUT).await?;
    assert_eq!(tool_call_body_json(&again)?["createdAt"], body["createdAt"]);

    client.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn tool_failures_and_reload() -> anyhow::Result<()> {
    let dir = specs_dir()?;
    let client = spawn(dir.path()).await?;

    let args = json!({"api": "digitalocean", "name": "Nope"});
    let result = call_tool(&client, "get_schema", args, TIMEOUT).await?;
    assert!(tool_call_is_error(&result));
    assert!(tool_call_text(&result)?.contains("Schema not found: Nope"));

    let err = client
        .call_tool(tool_call_params("no_such_tool", json!({}))?)
        .await
        .err()
        .context("unknown tool must fail")?;
    assert!(
        matches!(&err, ServiceError::McpError(e) if e.code == ErrorCode::INVALID_PARAMS),
        "{err:?}"
    );

    std::fs::write(
        dir.path().join("petstore.json"),
        r#"{"openapi":"3.0.0","info":{"title":"Pets"},"paths":{"/pets":{"get":{"responses":{}}}}}"#,
    )?;
    let result = call_tool(&client, "reload_specs", json!({}), TIMEOUT).await?;
    assert_eq!(tool_call_body_json(&result)?["apis"], 2);

    let result = call_tool(&client, "list_apis", json!(null), TIMEOUT).await?;
    let apis = tool_call_body_json(&result)?;
    assert_eq!(apis["apis"][1]["name"], "petstore");
    assert_eq!(apis["apis"][1]["operations"], 1);

    client.cancel().await?;
    Ok(())
}

#[test]
fn missing_specs_dir_fails_startup() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("missing");
    let child = Command::new(BIN)
        .arg("--specs-dir")
        .arg(&missing)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("spawn server")?;
    let mut child = KillOnDrop(child);

    let status = child.0.wait()?;
    assert!(!status.success());
    Ok(())
}
