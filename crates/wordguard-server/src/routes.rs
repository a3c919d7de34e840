//! HTTP routes and handlers
//!
//! Every JSON response carries the envelope
//! `{status, message?, detected?, data?}`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};
use wordguard_core::Error;
use wordguard_lexicon::Registration;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route(
            "/forbidden",
            post(register_forbidden)
                .get(list_forbidden)
                .delete(delete_forbidden_range),
        )
        .route("/forbidden/bulk", post(register_forbidden_bulk))
        .route("/forbidden/scan", post(scan_message))
        .route("/forbidden/check/:word", get(check_forbidden_word))
        .route("/forbidden/:word", axum::routing::delete(delete_forbidden))
        .route(
            "/similarity/words",
            post(register_sensitive).delete(remove_sensitive),
        )
        .route(
            "/similarity/words/:user_id",
            get(list_sensitive).delete(remove_all_sensitive),
        )
        .route("/similarity/check", post(check_similarity))
        .fallback(fallback)
        .with_state(state)
}

type ApiResult = Result<Json<Value>, AppError>;

async fn health_check(State(state): State<AppState>) -> ApiResult {
    state.store.ping().await?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "database": "ok",
            "lexicon_loaded": state.lexicon.automaton().is_built(),
            "lexicon_words": state.lexicon.automaton().word_count(),
            "embedding_model": state.similarity.model_id(),
        }
    })))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

#[derive(Debug, Deserialize)]
struct WordRequest {
    word: String,
}

#[derive(Debug, Deserialize)]
struct BulkWordRequest {
    words: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ScanRequest {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SensitiveRequest {
    user_id: String,
    sentence: String,
}

#[derive(Debug, Deserialize)]
struct SimilarityRequest {
    user_id: String,
    message: String,
    #[serde(default)]
    threshold: Option<f32>,
}

async fn register_forbidden(
    State(state): State<AppState>,
    Json(req): Json<WordRequest>,
) -> ApiResult {
    match state.lexicon.register(&req.word).await? {
        Registration::Registered { entry, patterns } => {
            info!("Registered forbidden word '{}'", entry.word);
            Ok(Json(json!({
                "status": "success",
                "message": format!("'{}' registered as a forbidden word", entry.word),
                "data": {
                    "word": entry.word,
                    "decomposed_word": entry.decomposed_word,
                    "created_at": entry.created_at,
                    "patterns": patterns,
                }
            })))
        }
        Registration::AlreadyExists { word } => Ok(Json(json!({
            "status": "already_exists",
            "message": format!("'{}' is already registered", word),
        }))),
    }
}

async fn register_forbidden_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkWordRequest>,
) -> ApiResult {
    let report = state.lexicon.register_bulk(&req.words).await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("{} forbidden words registered", report.registered.len()),
        "data": report,
    })))
}

async fn list_forbidden(State(state): State<AppState>) -> ApiResult {
    let words = state.lexicon.list().await?;

    Ok(Json(json!({
        "status": "success",
        "count": words.len(),
        "data": words,
    })))
}

async fn check_forbidden_word(
    State(state): State<AppState>,
    Path(word): Path<String>,
) -> ApiResult {
    let is_forbidden = state.lexicon.contains(&word).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "word": word, "is_forbidden": is_forbidden },
    })))
}

async fn delete_forbidden(State(state): State<AppState>, Path(word): Path<String>) -> ApiResult {
    if !state.lexicon.delete(&word).await? {
        return Err(Error::NotFound(word).into());
    }

    Ok(Json(json!({
        "status": "success",
        "message": format!("'{}' deleted", word),
    })))
}

async fn delete_forbidden_range(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult {
    let deleted = state
        .lexicon
        .delete_created_between(range.from, range.to)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "count": deleted.len(),
        "data": deleted,
    })))
}

async fn scan_message(State(state): State<AppState>, Json(req): Json<ScanRequest>) -> ApiResult {
    let result = state.lexicon.check(&req.message)?;
    debug!(
        "Scanned message: verdict={:?} latency={}us",
        result.verdict, result.latency_us
    );

    if !result.lexicon_available {
        return Ok(Json(json!({
            "status": "warning",
            "message": "no forbidden words are registered; message was not checked",
            "detected": false,
            "data": result,
        })));
    }

    Ok(Json(json!({
        "status": "success",
        "detected": result.is_blocked(),
        "data": result,
    })))
}

async fn register_sensitive(
    State(state): State<AppState>,
    Json(req): Json<SensitiveRequest>,
) -> ApiResult {
    let registration = state.similarity.register(&req.user_id, &req.sentence).await?;

    let (status, message) = if registration.created {
        ("success", "sensitive phrase registered")
    } else {
        ("already_exists", "sensitive phrase already registered for this user")
    };

    Ok(Json(json!({
        "status": status,
        "message": message,
        "data": registration,
    })))
}

async fn list_sensitive(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult {
    let phrases = state.similarity.list_for_user(&user_id).await?;

    Ok(Json(json!({
        "status": "success",
        "count": phrases.len(),
        "data": phrases,
    })))
}

async fn remove_sensitive(
    State(state): State<AppState>,
    Json(req): Json<SensitiveRequest>,
) -> ApiResult {
    let removal = state.similarity.remove(&req.user_id, &req.sentence).await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("'{}' removed", removal.phrase),
        "data": removal,
    })))
}

async fn remove_all_sensitive(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult {
    let report = state.similarity.remove_all(&user_id).await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("{} sensitive phrases removed", report.count),
        "data": report,
    })))
}

async fn check_similarity(
    State(state): State<AppState>,
    Json(req): Json<SimilarityRequest>,
) -> ApiResult {
    let threshold = req
        .threshold
        .unwrap_or_else(|| state.similarity.default_threshold());
    if !(-1.0..=1.0).contains(&threshold) {
        return Err(AppError::InvalidRequest(format!(
            "threshold must be within [-1, 1], got {}",
            threshold
        )));
    }

    match state
        .similarity
        .check(&req.user_id, &req.message, threshold)
        .await?
    {
        Some(check) => Ok(Json(json!({
            "status": "success",
            "detected": check.is_match,
            "data": check,
        }))),
        None => Ok(Json(json!({
            "status": "warning",
            "message": "user has no registered sensitive phrases",
            "detected": false,
        }))),
    }
}

async fn fallback() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "not_found", "message": "Not found" })),
    )
        .into_response()
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    Core(Error),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError::Core(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, label, message) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "error", msg),
            AppError::Core(err @ Error::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "error", err.to_string())
            }
            AppError::Core(
                err @ (Error::NotFound(_) | Error::NotLinked { .. } | Error::NoWords(_)),
            ) => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
            AppError::Core(err) => {
                error!("Request failed: {}", err);
                metrics::counter!("wordguard_errors_total").increment(1);
                (StatusCode::INTERNAL_SERVER_ERROR, "error", err.to_string())
            }
        };

        (status, Json(json!({ "status": label, "message": message }))).into_response()
    }
}
