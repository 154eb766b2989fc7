//! Webhook tool execution against a real local HTTP server

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

use voiceline::providers::RowSink;
use voiceline::{ToolInvoker, ToolSpec};

struct NoopRows;

#[async_trait]
impl RowSink for NoopRows {
    async fn append_row(
        &self,
        _spreadsheet_id: &str,
        _sheet_name: &str,
        _row: &Map<String, Value>,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<Value>>>,
    headers: Arc<Mutex<Vec<Option<String>>>>,
    gets: Arc<Mutex<usize>>,
}

async fn spawn_target() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route(
            "/ok",
            post(
                |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    seen.bodies.lock().unwrap().push(body);
                    seen.headers.lock().unwrap().push(
                        headers
                            .get("x-api-token")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from),
                    );
                    StatusCode::OK
                },
            ),
        )
        .route("/broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/fetch",
            get(|State(seen): State<Seen>| async move {
                *seen.gets.lock().unwrap() += 1;
                StatusCode::OK
            }),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn invoker() -> ToolInvoker {
    ToolInvoker::new(reqwest::Client::new(), Arc::new(NoopRows))
}

fn webhook(url: &str, extra: Value) -> ToolSpec {
    let mut spec = json!({
        "name": "notify",
        "type": "webhook",
        "url": url,
    });
    if let (Some(spec_map), Some(extra_map)) = (spec.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_map {
            spec_map.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(spec).unwrap()
}

fn fields(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

#[tokio::test]
async fn test_webhook_posts_fields_and_headers() {
    let (base, seen) = spawn_target().await;
    let tool = webhook(
        &format!("{base}/ok"),
        json!({"headers": {"X-Api-Token": "sekrit"}}),
    );

    let delivered = invoker()
        .execute(&tool, &fields(&[("name", "Alex"), ("email", "a@b.com")]))
        .await;

    assert!(delivered);
    let bodies = seen.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0], json!({"name": "Alex", "email": "a@b.com"}));
    let headers = seen.headers.lock().unwrap();
    assert_eq!(headers[0].as_deref(), Some("sekrit"));
}

#[tokio::test]
async fn test_webhook_server_error_reports_failure() {
    let (base, _seen) = spawn_target().await;
    let tool = webhook(&format!("{base}/broken"), json!({}));

    assert!(!invoker().execute(&tool, &fields(&[("a", "1")])).await);
}

#[tokio::test]
async fn test_webhook_unreachable_host_reports_failure() {
    // Nothing listens here; the request itself fails.
    let tool = webhook("http://127.0.0.1:9/hook", json!({}));
    assert!(!invoker().execute(&tool, &fields(&[("a", "1")])).await);
}

#[tokio::test]
async fn test_get_webhook_sends_no_body() {
    let (base, seen) = spawn_target().await;
    let tool = webhook(&format!("{base}/fetch"), json!({"method": "get"}));

    assert!(invoker().execute(&tool, &fields(&[("a", "1")])).await);
    assert_eq!(*seen.gets.lock().unwrap(), 1);
}
