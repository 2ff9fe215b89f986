//! End-to-end tests for the HTTP API.
//!
//! The search service and model gateway are stood up as real axum servers on
//! ephemeral ports, and the chat server under test is driven with reqwest.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use doc_chat::config::Config;
use doc_chat::server::{router, AppState};

// ─── Fake upstreams ─────────────────────────────────────────────────

/// Serve `app` on 127.0.0.1 with an OS-assigned port, returning its base URL.
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on.
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[derive(Clone, Default)]
struct SearchLog {
    requests: Arc<Mutex<Vec<Value>>>,
    document_queries: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl SearchLog {
    fn search_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn spawn_search(results: Value) -> (String, SearchLog) {
    let log = SearchLog::default();

    let search = {
        let log = log.clone();
        move |Json(body): Json<Value>| {
            let log = log.clone();
            let results = results.clone();
            async move {
                log.requests.lock().unwrap().push(body);
                Json(results)
            }
        }
    };

    let document = {
        let log = log.clone();
        move |Path(id): Path<String>, Query(q): Query<HashMap<String, String>>| {
            let log = log.clone();
            async move {
                log.document_queries
                    .lock()
                    .unwrap()
                    .push((id.clone(), q.get("page").cloned()));
                if id == "handbook" {
                    Json(json!({
                        "document_id": "handbook",
                        "page": q.get("page"),
                        "embedding": [0.1, 0.2, 0.3]
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"detail": "Document not found"})),
                    )
                        .into_response()
                }
            }
        }
    };

    let app = Router::new()
        .route("/search", post(search))
        .route("/document/{id}", get(document));
    (spawn(app).await, log)
}

/// A search service whose `/search` answers only after `delay`.
async fn spawn_slow_search(delay: Duration) -> String {
    let app = Router::new().route(
        "/search",
        post(move || async move {
            tokio::time::sleep(delay).await;
            Json(json!([]))
        }),
    );
    spawn(app).await
}

/// A raw HTTP server that sends response headers and the first byte of a
/// JSON body at once, then stalls for `delay` before finishing the body.
async fn spawn_stalled_body(delay: Duration) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\n\r\n[";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(delay).await;
                let _ = socket.write_all(b"]").await;
            });
        }
    });
    format!("http://{}", addr)
}

#[derive(Clone, Copy)]
enum GatewayMode {
    Answer,
    Slow,
    ServerError,
    Malformed,
}

#[derive(Clone)]
struct GatewayState {
    mode: GatewayMode,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn gateway_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.seen.lock().unwrap().push((auth, body));

    match state.mode {
        GatewayMode::Answer => Json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Refunds are accepted within 30 days.  "}}]
        }))
        .into_response(),
        GatewayMode::Slow => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Json(json!({"choices": [{"message": {"content": "too late"}}]})).into_response()
        }
        GatewayMode::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
        }
        GatewayMode::Malformed => Json(json!({"id": "cmpl-1", "choices": []})).into_response(),
    }
}

async fn spawn_gateway(mode: GatewayMode) -> (String, GatewayState) {
    let state = GatewayState {
        mode,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(gateway_handler))
        .with_state(state.clone());
    (spawn(app).await, state)
}

// ─── Service under test ─────────────────────────────────────────────

fn test_config(search_url: &str, gateway_url: Option<&str>) -> Config {
    let mut config = Config::default();
    config.search.url = search_url.to_string();
    config.search.timeout_secs = 1;
    config.llm.timeout_secs = 2;
    if let Some(url) = gateway_url {
        config.llm.gateway_url = url.to_string();
        config.llm.api_key = Some("sk-test".to_string());
    }
    config.validate().unwrap();
    config
}

async fn spawn_service(config: &Config) -> String {
    let state = AppState::from_config(config).unwrap();
    spawn(router(state)).await
}

async fn post_json(url: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

async fn get_json(url: &str) -> (StatusCode, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

fn two_matches() -> Value {
    json!([
        {"document_id": "terms", "document_page": 4, "similarity_score": 0.81, "tokens": 120, "billable_characters": 540},
        {"document_id": "faq", "document_page": 2, "similarity_score": 0.64}
    ])
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_and_health_in_fallback_mode() {
    let (search_url, _) = spawn_search(json!([])).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, root) = get_json(&format!("{}/", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(root["llm_gateway_configured"], false);
    assert_eq!(root["search_service_url"], search_url);
    assert!(root["note"].as_str().unwrap().contains("even when not configured"));

    let (status, health) = get_json(&format!("{}/health", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["capabilities"]["ai_responses"], false);
    assert_eq!(health["capabilities"]["fallback_responses"], true);
}

#[tokio::test]
async fn test_health_reports_model_when_configured() {
    let (search_url, _) = spawn_search(json!([])).await;
    let (gateway_url, _) = spawn_gateway(GatewayMode::Answer).await;
    let base = spawn_service(&test_config(&search_url, Some(&gateway_url))).await;

    let (_, health) = get_json(&format!("{}/health", base)).await;
    assert_eq!(health["llm_gateway_configured"], true);
    assert_eq!(health["capabilities"]["ai_responses"], true);
}

#[tokio::test]
async fn test_zero_results_without_credential() {
    let (search_url, log) = spawn_search(json!([])).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, body) = post_json(&format!("{}/chat", base), json!({"query": "xyz"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["context"], json!([]));
    let reply = body["reply"].as_str().unwrap();
    assert!(reply.contains("No matching documents"), "{}", reply);
    assert!(reply.contains("not configured"), "{}", reply);

    let requests = log.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0], json!({"query": "xyz", "top_k": 5}));
}

#[tokio::test]
async fn test_model_answer_returned_verbatim() {
    let (search_url, _) = spawn_search(two_matches()).await;
    let (gateway_url, gateway) = spawn_gateway(GatewayMode::Answer).await;
    let base = spawn_service(&test_config(&search_url, Some(&gateway_url))).await;

    let (status, body) = post_json(
        &format!("{}/chat/", base),
        json!({"query": "refund policy", "top_k": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Refunds are accepted within 30 days.");
    let context = body["context"].as_array().unwrap();
    assert_eq!(context.len(), 2);
    assert!(context[0].as_str().unwrap().contains("Document ID: terms"));
    assert!(context[0].as_str().unwrap().contains("Similarity: 0.8100"));

    let seen = gateway.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (auth, request) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(request["model"], "gpt-4o");
    assert_eq!(request["messages"][0]["role"], "system");
    let user = request["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("refund policy"));
    assert!(user.contains("Document ID: faq"));
}

#[tokio::test]
async fn test_model_timeout_falls_back_with_evidence() {
    let (search_url, _) = spawn_search(two_matches()).await;
    let (gateway_url, _) = spawn_gateway(GatewayMode::Slow).await;
    let base = spawn_service(&test_config(&search_url, Some(&gateway_url))).await;

    let (status, body) =
        post_json(&format!("{}/chat", base), json!({"query": "refund policy"})).await;
    assert_eq!(status, StatusCode::OK);

    let reply = body["reply"].as_str().unwrap();
    for line in body["context"].as_array().unwrap() {
        assert!(reply.contains(line.as_str().unwrap()), "{}", reply);
    }
    assert!(reply.contains("taking too long"), "{}", reply);
}

#[tokio::test]
async fn test_model_http_error_falls_back() {
    let (search_url, _) = spawn_search(two_matches()).await;
    let (gateway_url, _) = spawn_gateway(GatewayMode::ServerError).await;
    let base = spawn_service(&test_config(&search_url, Some(&gateway_url))).await;

    let (status, body) = post_json(&format!("{}/chat", base), json!({"query": "refunds"})).await;
    assert_eq!(status, StatusCode::OK);
    let reply = body["reply"].as_str().unwrap();
    assert!(reply.contains("trouble connecting"), "{}", reply);
    assert!(reply.contains("- Total results: 2"), "{}", reply);
}

#[tokio::test]
async fn test_unreachable_gateway_falls_back() {
    let (search_url, _) = spawn_search(two_matches()).await;
    let gateway_url = dead_url().await;
    let base = spawn_service(&test_config(&search_url, Some(&gateway_url))).await;

    let (status, body) = post_json(&format!("{}/chat", base), json!({"query": "refunds"})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("trouble connecting"));
}

#[tokio::test]
async fn test_malformed_model_response_falls_back_without_note() {
    let (search_url, _) = spawn_search(two_matches()).await;
    let (gateway_url, _) = spawn_gateway(GatewayMode::Malformed).await;
    let base = spawn_service(&test_config(&search_url, Some(&gateway_url))).await;

    let (status, body) = post_json(&format!("{}/chat", base), json!({"query": "refunds"})).await;
    assert_eq!(status, StatusCode::OK);
    let reply = body["reply"].as_str().unwrap();
    assert!(reply.contains("Top matches:"), "{}", reply);
    assert!(!reply.contains("Note:"), "{}", reply);
}

#[tokio::test]
async fn test_top_k_out_of_range_rejected_before_search() {
    let (search_url, log) = spawn_search(two_matches()).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    for top_k in [25, 0, -1] {
        let (status, body) = post_json(
            &format!("{}/chat", base),
            json!({"query": "refunds", "top_k": top_k}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"].as_str().unwrap().contains("top_k"));
    }

    let (status, _) = post_json(
        &format!("{}/chat/analyze", base),
        json!({"query": "refunds", "top_k": 25}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(log.search_calls(), 0);
}

#[tokio::test]
async fn test_invalid_bodies_rejected() {
    let (search_url, log) = spawn_search(two_matches()).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, body) = post_json(&format!("{}/chat", base), json!({"query": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "query must not be empty");

    let (status, body) = post_json(&format!("{}/chat", base), json!({"top_k": 3})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    assert_eq!(log.search_calls(), 0);
}

#[tokio::test]
async fn test_analyze_truncates_raw_results() {
    let results: Vec<Value> = (0..12)
        .map(|i| {
            json!({
                "document_id": format!("doc-{}", i % 4),
                "document_page": i,
                "similarity_score": 0.9 - (i as f64) * 0.05
            })
        })
        .collect();
    let (search_url, log) = spawn_search(Value::Array(results)).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, body) = post_json(
        &format!("{}/chat/analyze", base),
        json!({"query": "quarterly report", "top_k": 12}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "quarterly report");
    assert_eq!(body["raw_results"].as_array().unwrap().len(), 10);
    assert_eq!(body["raw_results"][0]["document_id"], "doc-0");

    let analysis = &body["analysis"];
    assert_eq!(analysis["total_results"], 12);
    assert_eq!(analysis["unique_documents"], 4);
    assert_eq!(analysis["pages_covered"], 12);
    assert_eq!(analysis["query"], "quarterly report");
    let min = analysis["min_similarity"].as_f64().unwrap();
    let avg = analysis["average_similarity"].as_f64().unwrap();
    let max = analysis["max_similarity"].as_f64().unwrap();
    assert!(min <= avg && avg <= max);

    assert_eq!(log.requests.lock().unwrap()[0]["top_k"], 12);
}

#[tokio::test]
async fn test_document_passthrough() {
    let (search_url, log) = spawn_search(json!([])).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, body) = get_json(&format!("{}/chat/document/handbook?page=3", base)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["document_id"], "handbook");
    assert_eq!(body["embedding"], json!([0.1, 0.2, 0.3]));

    let (status, _) = get_json(&format!("{}/chat/document/handbook", base)).await;
    assert_eq!(status, StatusCode::OK);

    let queries = log.document_queries.lock().unwrap();
    assert_eq!(queries[0], ("handbook".to_string(), Some("3".to_string())));
    assert_eq!(queries[1], ("handbook".to_string(), None));
}

#[tokio::test]
async fn test_unknown_document_is_service_error() {
    let (search_url, _) = spawn_search(json!([])).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, body) = get_json(&format!("{}/chat/document/missing", base)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "document_fetch_failed");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("404"), "{}", message);
    assert!(message.contains("Document not found"), "{}", message);
}

#[tokio::test]
async fn test_search_unavailable_is_service_error() {
    let search_url = dead_url().await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, body) = post_json(&format!("{}/chat", base), json!({"query": "refunds"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "search_unavailable");
}

#[tokio::test]
async fn test_search_timeout_is_service_error() {
    let search_url = spawn_slow_search(Duration::from_secs(3)).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, body) = post_json(&format!("{}/chat", base), json!({"query": "refunds"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "search_timeout");
}

#[tokio::test]
async fn test_stalled_response_body_is_search_timeout() {
    let search_url = spawn_stalled_body(Duration::from_secs(3)).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let (status, body) =
        post_json(&format!("{}/chat/analyze", base), json!({"query": "refunds"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "search_timeout");

    let (status, body) = get_json(&format!("{}/chat/document/handbook", base)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "search_timeout");
}

#[tokio::test]
async fn test_bad_document_page_is_json_error() {
    let (search_url, log) = spawn_search(json!([])).await;
    let base = spawn_service(&test_config(&search_url, None)).await;

    let resp = reqwest::get(format!("{}/chat/document/handbook?page=abc", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("application/json"), "{}", content_type);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("page"));
    assert!(log.document_queries.lock().unwrap().is_empty());
}
