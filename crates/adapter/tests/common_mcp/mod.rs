#![allow(dead_code)]

use anyhow::Context as _;
use futures::TryStreamExt as _;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::AsyncBufReadExt as _;
use tokio_util::io::StreamReader;

const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Test-only MCP client speaking streamable HTTP to `<base>/mcp`.
pub struct McpStreamableHttpSession {
    http: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl McpStreamableHttpSession {
    /// Run the `initialize` handshake and keep the session id the server assigns.
    pub async fn connect(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::new();
        let endpoint = format!("{}/mcp", base_url.trim_end_matches('/'));

        let initialize = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "openapi-mcp-integration-tests", "version": "0" }
            }
        });
        let response = send(&http, &endpoint, None, &initialize).await?;
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .context("initialize response has no session id")?;

        let reply = first_sse_message(response).await?;
        anyhow::ensure!(reply["id"] == json!(0), "initialize answered with {reply}");

        let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        let ack = send(&http, &endpoint, Some(&session_id), &initialized).await?;
        anyhow::ensure!(
            ack.status() == reqwest::StatusCode::ACCEPTED,
            "notifications/initialized returned {}",
            ack.status()
        );

        Ok(Self {
            http,
            endpoint,
            session_id,
        })
    }

    /// Send one JSON-RPC request and wait for its reply.
    pub async fn request(
        &self,
        id: u64,
        method: &str,
        params: Value,
        timeout_dur: Duration,
    ) -> anyhow::Result<Value> {
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let response = send(&self.http, &self.endpoint, Some(&self.session_id), &body).await?;
        tokio::time::timeout(timeout_dur, first_sse_message(response))
            .await
            .with_context(|| format!("no reply to {method} within {timeout_dur:?}"))?
    }
}

/// Whether a `tools/call` reply is flagged `isError`.
pub fn tool_call_is_error(msg: &Value) -> bool {
    msg.pointer("/result/isError") == Some(&json!(true))
}

/// First text block of a `tools/call` reply.
pub fn tool_call_text(msg: &Value) -> anyhow::Result<&str> {
    msg.pointer("/result/content/0/text")
        .and_then(Value::as_str)
        .with_context(|| format!("tools/call reply has no text content: {msg}"))
}

/// First text block of a `tools/call` reply, parsed as JSON.
pub fn tool_call_text_json(msg: &Value) -> anyhow::Result<Value> {
    serde_json::from_str(tool_call_text(msg)?).context("tools/call text is not JSON")
}

async fn send(
    http: &reqwest::Client,
    endpoint: &str,
    session_id: Option<&str>,
    body: &Value,
) -> anyhow::Result<reqwest::Response> {
    let mut request = http
        .post(endpoint)
        .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
        .json(body);
    if let Some(id) = session_id {
        request = request.header(SESSION_HEADER, id);
    }

    let response = request.send().await.context("POST /mcp")?;
    response.error_for_status().context("POST /mcp status")
}

/// Read the event stream until the first event whose `data` is a JSON message.
async fn first_sse_message(response: reqwest::Response) -> anyhow::Result<Value> {
    let bytes = response.bytes_stream().map_err(std::io::Error::other);
    let mut lines = tokio::io::BufReader::new(StreamReader::new(bytes)).lines();

    let mut data = String::new();
    while let Some(line) = lines.next_line().await? {
        if let Some(chunk) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(chunk.trim());
            continue;
        }
        // A blank line ends an event; events without data (priming, keep-alive) are skipped.
        if line.trim().is_empty() && !data.is_empty() {
            return serde_json::from_str(&data).context("event data is not JSON");
        }
    }

    anyhow::bail!("event stream ended without a message")
}
