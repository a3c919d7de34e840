//! HTTP-level tests for the WordGuard API over an in-memory SQLite database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;
use wordguard_server::{create_router, AppState, ServerConfig, SqliteStore};
use wordguard_similarity::HashingEmbedder;

async fn build_test_app() -> Router {
    let config = ServerConfig {
        database_url: "sqlite::memory:".to_string(),
        ..ServerConfig::default()
    };
    let store = Arc::new(SqliteStore::connect(&config.database_url, 1).await.unwrap());
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    let state = AppState::new(
        &config,
        store,
        Arc::new(HashingEmbedder::default()),
        metrics_handle,
    );
    create_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let resp = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes).to_string() }));

    (status, json)
}

#[tokio::test]
async fn test_health_reports_empty_lexicon() {
    let app = build_test_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["database"], "ok");
    assert_eq!(body["data"]["lexicon_loaded"], false);
    assert_eq!(body["data"]["embedding_model"], "hashing-ngram-256");
}

#[tokio::test]
async fn test_metrics_endpoint_responds() {
    let app = build_test_app().await;
    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_scan_without_lexicon_warns() {
    let app = build_test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/forbidden/scan",
        Some(json!({ "message": "안녕하세요" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "warning");
    assert_eq!(body["detected"], false);
    assert_eq!(body["data"]["lexicon_available"], false);
}

#[tokio::test]
async fn test_register_then_scan_blocks() {
    let app = build_test_app().await;

    let (status, body) = send(&app, "POST", "/forbidden", Some(json!({ "word": "바보" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["decomposed_word"], "ㅂㅏㅂㅗ");
    assert_eq!(body["data"]["patterns"]["surface"], "added");

    let (_, body) = send(
        &app,
        "POST",
        "/forbidden/scan",
        Some(json!({ "message": "너 바보야" })),
    )
    .await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["detected"], true);
    assert_eq!(body["data"]["detected_word"], "바보");
    assert_eq!(body["data"]["method"], "surface");

    // Embedded inside a longer word: not a content token of its own.
    let (_, body) = send(
        &app,
        "POST",
        "/forbidden/scan",
        Some(json!({ "message": "바보스럽지않은하루" })),
    )
    .await;
    assert_eq!(body["detected"], false);
}

#[tokio::test]
async fn test_words_ending_in_particle_syllables_and_mixed_case() {
    let app = build_test_app().await;
    send(&app, "POST", "/forbidden", Some(json!({ "word": "멍청이" }))).await;
    let (_, body) = send(&app, "POST", "/forbidden", Some(json!({ "word": "Spam" }))).await;
    assert_eq!(body["data"]["word"], "spam");

    for message in ["멍청이", "이 멍청이야", "SPAM", "cheap Spam here"] {
        let (_, body) = send(
            &app,
            "POST",
            "/forbidden/scan",
            Some(json!({ "message": message })),
        )
        .await;
        assert_eq!(body["detected"], true, "{}", message);
    }

    let (status, _) = send(&app, "DELETE", "/forbidden/SPAM", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/forbidden/check/spam", None).await;
    assert_eq!(body["data"]["is_forbidden"], false);
}

#[tokio::test]
async fn test_duplicate_registration_reports_already_exists() {
    let app = build_test_app().await;
    send(&app, "POST", "/forbidden", Some(json!({ "word": "spam" }))).await;

    let (status, body) = send(&app, "POST", "/forbidden", Some(json!({ "word": "spam" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_exists");

    let (_, body) = send(&app, "GET", "/forbidden", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["word"], "spam");
}

#[tokio::test]
async fn test_empty_word_is_bad_request() {
    let app = build_test_app().await;
    let (status, body) = send(&app, "POST", "/forbidden", Some(json!({ "word": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_bulk_registration() {
    let app = build_test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/forbidden/bulk",
        Some(json!({ "words": ["scam", "fraud", "scam"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["registered"], json!(["scam", "fraud"]));
    assert_eq!(body["data"]["skipped"], json!(["scam"]));

    let (_, body) = send(&app, "GET", "/forbidden/check/fraud", None).await;
    assert_eq!(body["data"]["is_forbidden"], true);
    let (_, body) = send(&app, "GET", "/forbidden/check/fine", None).await;
    assert_eq!(body["data"]["is_forbidden"], false);
}

#[tokio::test]
async fn test_delete_word() {
    let app = build_test_app().await;
    send(&app, "POST", "/forbidden", Some(json!({ "word": "spam" }))).await;

    let (status, _) = send(&app, "DELETE", "/forbidden/spam", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "DELETE", "/forbidden/spam", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not_found");

    let (_, body) = send(
        &app,
        "POST",
        "/forbidden/scan",
        Some(json!({ "message": "buy spam now" })),
    )
    .await;
    assert_eq!(body["status"], "warning");
}

#[tokio::test]
async fn test_delete_by_range() {
    let app = build_test_app().await;
    send(&app, "POST", "/forbidden", Some(json!({ "word": "spam" }))).await;
    send(&app, "POST", "/forbidden", Some(json!({ "word": "scam" }))).await;

    let (status, body) = send(
        &app,
        "DELETE",
        "/forbidden?from=2000-01-01T00:00:00Z&to=2100-01-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (_, body) = send(&app, "GET", "/forbidden", None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_inverted_range_is_bad_request() {
    let app = build_test_app().await;
    let (status, _) = send(
        &app,
        "DELETE",
        "/forbidden?from=2100-01-01T00:00:00Z&to=2000-01-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sensitive_phrase_lifecycle() {
    let app = build_test_app().await;
    let phrase = json!({ "user_id": "alice", "sentence": "my home address" });

    let (status, body) = send(&app, "POST", "/similarity/words", Some(phrase.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["created"], true);

    let (_, body) = send(&app, "POST", "/similarity/words", Some(phrase.clone())).await;
    assert_eq!(body["status"], "already_exists");
    assert_eq!(body["data"]["created"], false);

    let (_, body) = send(&app, "GET", "/similarity/words/alice", None).await;
    assert_eq!(body["data"], json!(["my home address"]));

    let (_, body) = send(
        &app,
        "POST",
        "/similarity/check",
        Some(json!({ "user_id": "alice", "message": "my home address" })),
    )
    .await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["detected"], true);
    assert_eq!(body["data"]["most_similar_phrase"], "my home address");
    assert!(body["data"]["max_similarity"].as_f64().unwrap() > 0.99);
    assert!((body["data"]["threshold"].as_f64().unwrap() - 0.8).abs() < 1e-6);

    let (status, _) = send(&app, "DELETE", "/similarity/words", Some(phrase.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "DELETE", "/similarity/words", Some(phrase)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not_found");
}

#[tokio::test]
async fn test_similarity_check_for_user_without_words() {
    let app = build_test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/similarity/check",
        Some(json!({ "user_id": "bob", "message": "hello", "threshold": 0.5 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "warning");
    assert_eq!(body["detected"], false);
}

#[tokio::test]
async fn test_similarity_threshold_out_of_range() {
    let app = build_test_app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/similarity/check",
        Some(json!({ "user_id": "bob", "message": "hello", "threshold": 2.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remove_phrase_not_linked_to_user() {
    let app = build_test_app().await;
    send(
        &app,
        "POST",
        "/similarity/words",
        Some(json!({ "user_id": "alice", "sentence": "secret" })),
    )
    .await;

    let (status, body) = send(
        &app,
        "DELETE",
        "/similarity/words",
        Some(json!({ "user_id": "bob", "sentence": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not_found");
}

#[tokio::test]
async fn test_remove_all_phrases() {
    let app = build_test_app().await;
    for sentence in ["first phrase", "second phrase"] {
        send(
            &app,
            "POST",
            "/similarity/words",
            Some(json!({ "user_id": "alice", "sentence": sentence })),
        )
        .await;
    }

    let (status, body) = send(&app, "DELETE", "/similarity/words/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(
        body["data"]["deleted_words"],
        json!(["first phrase", "second phrase"])
    );

    let (status, _) = send(&app, "DELETE", "/similarity/words/alice", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = build_test_app().await;
    let (status, body) = send(&app, "GET", "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not_found");
}
