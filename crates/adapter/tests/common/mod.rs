#![allow(dead_code)]

use anyhow::Context as _;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}

pub fn adapter_bin() -> &'static str {
    env!("CARGO_BIN_EXE_openapi-mcp-adapter")
}

/// Spawn the adapter with the HTTP transport on `port`.
pub fn spawn_http_adapter(spec: &std::path::Path, base_url: &str, port: u16) -> anyhow::Result<Child> {
    Command::new(adapter_bin())
        .env_remove("RUST_LOG")
        .env_remove("API_TOKEN")
        .arg("--spec")
        .arg(spec)
        .arg("--base-url")
        .arg(base_url)
        .arg("--token")
        .arg("integration-token")
        .arg("--transport")
        .arg("http")
        .arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--log-level")
        .arg("info")
        .stdin(Stdio::null())
        .spawn()
        .context("spawn adapter")
}

/// Item API the adapter is pointed at.
pub const ITEMS_SPEC: &str = r"
openapi: 3.0.3
info:
  title: Items
  version: 0.1.0
paths:
  /items/{id}:
    get:
      operationId: getItem
      summary: Fetch one item
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: integer
      responses:
        '200':
          description: ok
  /items:
    post:
      operationId: createItem
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name:
                  type: string
                qty:
                  type: integer
      responses:
        '201':
          description: created
  /missing:
    get:
      operationId: getMissing
      responses:
        '404':
          description: not found
  /whoami:
    get:
      operationId: whoami
      responses:
        '200':
          description: ok
";

pub fn write_spec(dir: &std::path::Path, name: &str, content: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// In-process upstream API serving the routes of [`ITEMS_SPEC`].
pub struct Upstream {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for Upstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn spawn_upstream() -> anyhow::Result<Upstream> {
    let app = Router::new()
        .route(
            "/items/{id}",
            get(|Path(id): Path<u64>| async move { Json(json!({ "id": id, "name": "widget" })) }),
        )
        .route(
            "/items",
            post(|Json(body): Json<Value>| async move { (StatusCode::CREATED, Json(body)) }),
        )
        .route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" }))) }),
        )
        .route(
            "/whoami",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Json(json!({ "authorization": auth }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind upstream")?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await;
    });

    Ok(Upstream {
        base_url: format!("http://{addr}"),
        shutdown: Some(tx),
    })
}
