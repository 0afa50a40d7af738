//! End-to-end tests against an in-process mock of the compression API.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use rand::seq::SliceRandom;
use sd_compressor::{
    credentials, CallOptions, ClientConfig, Compressor, ScaleDownCompressor, SdError, TextInput,
};
use sd_core::API_URL_ENV;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockApi {
    hits: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
    headers: Mutex<Vec<HeaderMap>>,
}

/// Context conventions: `sleep:<ms>:...` delays the reply, `status:<code>`
/// replies with that status, `garbage` replies with a non-JSON body,
/// `negative` replies with a negative token count.
async fn compress_raw(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    api.hits.fetch_add(1, Ordering::SeqCst);
    let now = api.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    api.max_in_flight.fetch_max(now, Ordering::SeqCst);
    api.bodies.lock().unwrap().push(body.clone());
    api.headers.lock().unwrap().push(headers);

    let context = body["context"].as_str().unwrap_or_default().to_string();
    if let Some(ms) = context
        .strip_prefix("sleep:")
        .and_then(|rest| rest.split(':').next())
        .and_then(|ms| ms.parse::<u64>().ok())
    {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    api.in_flight.fetch_sub(1, Ordering::SeqCst);

    if let Some(code) = context.strip_prefix("status:") {
        let code: u16 = code.split(':').next().unwrap().parse().unwrap();
        let status = StatusCode::from_u16(code).unwrap();
        return (status, json!({"detail": format!("rejected {context}")}).to_string());
    }
    if context == "garbage" {
        return (StatusCode::OK, "<html>not json</html>".into());
    }
    if context == "negative" {
        return (
            StatusCode::OK,
            json!({"results": {"compressed_prompt": "x"}, "total_original_tokens": -10}).to_string(),
        );
    }

    let original = context.len() as u64;
    let model = body["model"].clone();
    let reply = json!({
        "results": {
            "compressed_prompt": format!("compressed:{context}"),
            "original_prompt_tokens": original,
            "compressed_prompt_tokens": original / 2,
        },
        "latency_ms": 42,
        "model_used": model,
        "request_metadata": {"timestamp": "2024-03-01T12:00:00Z"},
    });
    (StatusCode::OK, reply.to_string())
}

async fn spawn_api() -> (SocketAddr, Arc<MockApi>) {
    let api = Arc::new(MockApi::default());
    let app = Router::new()
        .route("/compress/raw", post(compress_raw))
        .with_state(Arc::clone(&api));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, api)
}

fn client(addr: SocketAddr) -> ScaleDownCompressor {
    let cfg = ClientConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("test_key");
    ScaleDownCompressor::new(cfg).unwrap()
}

// ========== Single Calls ==========

#[tokio::test]
async fn test_single_call_roundtrip() {
    let (addr, api) = spawn_api().await;
    let c = client(addr);
    let out = c
        .compress("some context".into(), "a prompt".into(), &CallOptions::new())
        .await
        .unwrap()
        .into_single()
        .unwrap();

    assert_eq!(out.content(), "compressed:some context");
    assert_eq!(out.tokens(), (12, 6));
    assert_eq!(out.savings_percent(), 50.0);
    assert_eq!(out.compression_ratio(), 2.0);
    assert_eq!(out.latency(), 42);
    assert_eq!(out.model_used(), Some("gpt-4o"));
    assert!(out.metrics().timestamp().is_some());
    assert_eq!(api.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_request_headers_and_body() {
    let (addr, api) = spawn_api().await;
    let cfg = ClientConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("test_key")
        .with_target_model("gpt-4o-mini")
        .with_preserve_keywords(true)
        .with_preserve_words(["ScaleDown"]);
    let c = ScaleDownCompressor::new(cfg).unwrap();
    let opts = CallOptions::new()
        .with_max_tokens(128)
        .with_option("rate", 0.5)
        .with_option("mode", "aggressive");
    c.compress_single("ctx", "prompt", &opts).await.unwrap();

    let headers = api.headers.lock().unwrap()[0].clone();
    assert_eq!(headers["x-api-key"], "test_key");
    assert_eq!(headers["content-type"], "application/json");

    let body = api.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["context"], "ctx");
    assert_eq!(body["prompt"], "prompt");
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["scaledown"]["rate"], 0.5);
    assert_eq!(body["scaledown"]["mode"], "aggressive");
    assert_eq!(body["scaledown"]["max_tokens"], 128);
    assert_eq!(body["scaledown"]["preserve_keywords"], true);
    assert_eq!(body["scaledown"]["preserve_words"], json!(["ScaleDown"]));
    assert!(body["scaledown"]["temperature"].is_null());
}

#[tokio::test]
async fn test_default_rate_is_auto() {
    let (addr, api) = spawn_api().await;
    client(addr).compress_single("ctx", "p", &CallOptions::new()).await.unwrap();
    assert_eq!(api.bodies.lock().unwrap()[0]["scaledown"]["rate"], "auto");
}

// ========== Errors ==========

#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let (addr, api) = spawn_api().await;
    let cfg = ClientConfig::default().with_base_url(format!("http://{addr}"));
    let c = ScaleDownCompressor::new(cfg).unwrap();
    let err = c
        .compress(TextInput::from(vec!["a", "b"]), "p".into(), &CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SdError::Authentication(_)));
    assert_eq!(api.hits.load(Ordering::SeqCst), 0);
}

// Only test in this binary touching the environment or the credential slot.
#[tokio::test]
async fn test_from_env_without_any_key_makes_no_request() {
    let (addr, api) = spawn_api().await;
    credentials::clear_api_key();
    std::env::remove_var(credentials::API_KEY_ENV);
    std::env::set_var(API_URL_ENV, format!("http://{addr}"));

    let c = ScaleDownCompressor::from_env().unwrap();
    assert_eq!(c.url(), format!("http://{addr}/compress/raw"));
    let err = c
        .compress("ctx".into(), "p".into(), &CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SdError::Authentication(_)));
    assert_eq!(api.hits.load(Ordering::SeqCst), 0);

    std::env::remove_var(API_URL_ENV);
}

#[tokio::test]
async fn test_unequal_batch_makes_no_request() {
    let (addr, api) = spawn_api().await;
    let err = client(addr)
        .compress(
            TextInput::from(vec!["a", "b"]),
            TextInput::from(vec!["p"]),
            &CallOptions::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SdError::InvalidArgument(_)));
    assert_eq!(api.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_2xx_is_api_error() {
    let (addr, _api) = spawn_api().await;
    for code in ["status:401", "status:429", "status:500"] {
        let err = client(addr)
            .compress_single(code, "p", &CallOptions::new())
            .await
            .unwrap_err();
        match err {
            SdError::Api(msg) => assert!(msg.contains(&code[7..]), "{msg}"),
            other => panic!("expected API error, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_connection_refused_is_api_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let cfg = ClientConfig::default()
        .with_base_url(format!("http://127.0.0.1:{port}"))
        .with_api_key("k");
    let err = ScaleDownCompressor::new(cfg)
        .unwrap()
        .compress_single("ctx", "p", &CallOptions::new())
        .await
        .unwrap_err();
    match err {
        SdError::Api(msg) => assert!(msg.starts_with("Connection failed"), "{msg}"),
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_api_error() {
    let (addr, _api) = spawn_api().await;
    let cfg = ClientConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("k")
        .with_timeout(Duration::from_millis(100));
    let err = ScaleDownCompressor::new(cfg)
        .unwrap()
        .compress_single("sleep:2000:slow", "p", &CallOptions::new())
        .await
        .unwrap_err();
    match err {
        SdError::Api(msg) => assert!(msg.contains("timed out"), "{msg}"),
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_is_api_error() {
    let (addr, _api) = spawn_api().await;
    let err = client(addr)
        .compress_single("garbage", "p", &CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SdError::Api(_)));
}

#[tokio::test]
async fn test_negative_tokens_are_api_error() {
    let (addr, _api) = spawn_api().await;
    let err = client(addr)
        .compress_single("negative", "p", &CallOptions::new())
        .await
        .unwrap_err();
    match err {
        SdError::Api(msg) => assert!(msg.contains("non-negative"), "{msg}"),
        other => panic!("expected API error, got {other:?}"),
    }
}

// ========== Batches ==========

#[tokio::test]
async fn test_batch_aligned_pairs() {
    let (addr, api) = spawn_api().await;
    let out = client(addr)
        .compress(
            TextInput::from(vec!["ctx1", "ctx2"]),
            TextInput::from(vec!["p1", "p2"]),
            &CallOptions::new(),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(out.len(), 2);
    assert_eq!(api.hits.load(Ordering::SeqCst), 2);

    let mut pairs: Vec<(String, String)> = api
        .bodies
        .lock()
        .unwrap()
        .iter()
        .map(|b| {
            (
                b["context"].as_str().unwrap().to_string(),
                b["prompt"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![("ctx1".to_string(), "p1".to_string()), ("ctx2".to_string(), "p2".to_string())]
    );
}

#[tokio::test]
async fn test_batch_broadcasts_prompt() {
    let (addr, api) = spawn_api().await;
    let out = client(addr)
        .compress(
            TextInput::from(vec!["a", "b", "c"]),
            "same prompt".into(),
            &CallOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(out.len(), 3);
    let bodies = api.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 3);
    assert!(bodies.iter().all(|b| b["prompt"] == "same prompt"));
}

#[tokio::test]
async fn test_batch_order_with_random_latencies() {
    let (addr, _api) = spawn_api().await;
    let mut delays: Vec<u64> = (0..10).map(|i| i * 15).collect();
    delays.shuffle(&mut rand::thread_rng());
    let contexts: Vec<String> = delays
        .iter()
        .enumerate()
        .map(|(i, ms)| format!("sleep:{ms}:item{i}"))
        .collect();

    let out = client(addr)
        .compress(TextInput::Many(contexts.clone()), "p".into(), &CallOptions::new())
        .await
        .unwrap()
        .into_vec();
    assert_eq!(out.len(), contexts.len());
    for (ctx, result) in contexts.iter().zip(&out) {
        assert_eq!(result.content(), format!("compressed:{ctx}"));
    }
}

#[tokio::test]
async fn test_batch_concurrency_ceiling() {
    let (addr, api) = spawn_api().await;
    let contexts: Vec<String> = (0..12).map(|i| format!("sleep:60:{i}")).collect();
    client(addr)
        .compress(TextInput::Many(contexts), "p".into(), &CallOptions::new())
        .await
        .unwrap();
    assert_eq!(api.hits.load(Ordering::SeqCst), 12);
    let peak = api.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 5, "peak in-flight {peak}");
    assert!(peak > 1, "batch ran sequentially");
}

#[tokio::test]
async fn test_batch_failure_propagates() {
    let (addr, api) = spawn_api().await;
    let err = client(addr)
        .compress(
            TextInput::from(vec!["ok-0", "sleep:80:x", "status:503", "status:400"]),
            "p".into(),
            &CallOptions::new(),
        )
        .await
        .unwrap_err();
    match err {
        SdError::Api(msg) => assert!(msg.contains("503"), "{msg}"),
        other => panic!("expected API error, got {other:?}"),
    }
    assert_eq!(api.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_compress_each_reports_per_item() {
    let (addr, _api) = spawn_api().await;
    let pairs = vec![
        ("first".to_string(), "p".to_string()),
        ("status:502".to_string(), "p".to_string()),
        ("third".to_string(), "p".to_string()),
    ];
    let results = client(addr).compress_each(&pairs, &CallOptions::new()).await;
    assert_eq!(results[0].as_ref().unwrap().content(), "compressed:first");
    assert!(matches!(results[1], Err(SdError::Api(_))));
    assert_eq!(results[2].as_ref().unwrap().content(), "compressed:third");
}

#[tokio::test]
async fn test_shared_client_across_tasks() {
    let (addr, api) = spawn_api().await;
    let c: Arc<dyn Compressor> = Arc::new(client(addr));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let c = Arc::clone(&c);
            tokio::spawn(async move {
                c.compress_single(&format!("task{i}"), "p", &CallOptions::new()).await
            })
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        let out = h.await.unwrap().unwrap();
        assert_eq!(out.content(), format!("compressed:task{i}"));
    }
    assert_eq!(api.hits.load(Ordering::SeqCst), 4);
}
