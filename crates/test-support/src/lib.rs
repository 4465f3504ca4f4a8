use anyhow::Context as _;
use rmcp::model::{CallToolRequestParam, CallToolResult};
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt as _};
use serde_json::{Value, json};
use std::ffi::OsStr;
use std::process::Child;
use std::time::Duration;

pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// An initialized MCP client session with a spawned stdio server.
pub type McpClient = RunningService<RoleClient, ()>;

/// Spawn `bin` with `args` and complete the MCP handshake within `timeout_dur`.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned or `initialize` fails or times out.
pub async fn spawn_stdio_client<I, S>(
    bin: &str,
    args: I,
    timeout_dur: Duration,
) -> anyhow::Result<McpClient>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = tokio::process::Command::new(bin);
    cmd.args(args);
    let transport = TokioChildProcess::new(cmd).with_context(|| format!("spawn {bin}"))?;
    tokio::time::timeout(timeout_dur, ().serve(transport))
        .await
        .context("timed out waiting for initialize")?
        .context("MCP initialize")
}

/// Call `name` with `args`, failing on protocol errors and timeouts.
///
/// # Errors
///
/// Returns an error if the request fails at the protocol level or does not finish in time.
pub async fn call_tool(
    client: &McpClient,
    name: &str,
    args: Value,
    timeout_dur: Duration,
) -> anyhow::Result<CallToolResult> {
    let params = tool_call_params(name, args)?;
    tokio::time::timeout(timeout_dur, client.call_tool(params))
        .await
        .with_context(|| format!("timed out waiting for {name}"))?
        .with_context(|| format!("tools/call {name}"))
}

/// `tools/call` params from a tool name and a JSON arguments object.
///
/// # Errors
///
/// Returns an error if `args` is neither `null` nor an object.
pub fn tool_call_params(name: &str, args: Value) -> anyhow::Result<CallToolRequestParam> {
    serde_json::from_value(json!({ "name": name, "arguments": args }))
        .context("build tools/call params")
}

/// Parse `content[0].text` of a tool result as JSON.
///
/// # Errors
///
/// Returns an error if the result has no text content or the text is not JSON.
pub fn tool_call_body_json(result: &CallToolResult) -> anyhow::Result<Value> {
    let text = tool_call_text(result)?;
    serde_json::from_str(&text).with_context(|| format!("tool result is not JSON: {text}"))
}

/// `content[0].text` of a tool result.
///
/// # Errors
///
/// Returns an error if the result has no text content.
pub fn tool_call_text(result: &CallToolResult) -> anyhow::Result<String> {
    let v = serde_json::to_value(result).context("serialize tool result")?;
    v.get("content")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .context("tool result missing content[0].text")
}

/// `isError` of a tool result (absent means `false`).
#[must_use]
pub fn tool_call_is_error(result: &CallToolResult) -> bool {
    result.is_error.unwrap_or(false)
}
