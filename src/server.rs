//! HTTP API server.
//!
//! Exposes the ingestion and chat pipeline as a JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method   | Path             | Description |
//! |----------|------------------|-------------|
//! | `POST`   | `/api/index`     | Ingest text, website, and PDF sources (multipart) |
//! | `POST`   | `/api/chat`      | Ask a question over indexed documents |
//! | `GET`    | `/api/user-data` | List documents and chat sessions |
//! | `PUT`    | `/api/user-data` | Attach a document to a chat session |
//! | `DELETE` | `/api/user-data` | Delete a document or chat session |
//! | `GET`    | `/health`        | Health check (returns version) |
//!
//! The caller's identity comes from the `x-user-id` header on every `/api`
//! route; a missing header is a 401. Error responses all share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `unauthorized` (401), `bad_request` (400), `not_found` (404),
//! `internal` (500). Upstream provider error bodies are logged, never
//! returned to the client.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::{LlmClient, NOT_ENOUGH_INFORMATION};
use crate::collection::CollectionManager;
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::ingest::{self, IngestRequest, UploadedFile};
use crate::search::{self, RetrievalScope};
use crate::{db, migrate, store};

/// Uploads are bounded so one request cannot hold the whole body in memory
/// indefinitely. Generous enough for multi-file PDF batches.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
struct AppState {
    pool: sqlx::SqlitePool,
    collections: Arc<CollectionManager>,
    embedder: EmbeddingClient,
    llm: LlmClient,
}

/// Starts the HTTP server.
///
/// Opens the metadata database (running migrations), builds the OpenAI and
/// Qdrant clients, and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db_path).await?;
    migrate::run_migrations(&pool).await?;

    let embedder = EmbeddingClient::new(config)?;
    let collections = Arc::new(CollectionManager::new(config, embedder.clone())?);
    let llm = LlmClient::new(config)?;

    let state = AppState {
        pool,
        collections,
        embedder,
        llm,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/index", post(handle_index))
        .route("/api/chat", post(handle_chat))
        .route(
            "/api/user-data",
            get(handle_get_user_data)
                .put(handle_put_user_data)
                .delete(handle_delete_user_data),
        )
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    tracing::info!(bind = %config.bind, "askdocs listening");

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: "missing x-user-id header".to_string(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map a pipeline error to a response. Validation failures keep their
/// message; anything else (provider errors included) is logged and replaced
/// with a generic message so upstream error bodies never reach the client.
fn classify_pipeline_error(err: anyhow::Error, fallback: &str) -> AppError {
    let msg = err.to_string();
    if msg.contains("no indexable content")
        || msg.contains("limit reached")
        || msg.contains("no text content")
    {
        bad_request(msg)
    } else {
        tracing::error!(error = %err, "{}", fallback);
        internal(fallback.to_string())
    }
}

/// Resolve the calling user from the `x-user-id` header.
fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(unauthorized)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/index ============

/// Handler for `POST /api/index`.
///
/// Accepts a multipart form with any mix of `textContent`, `websiteUrl`,
/// and `file_<n>` parts (PDF only), plus an optional `chatSessionId` to
/// associate the new documents with a session. Returns the created document
/// rows and their generated summaries.
async fn handle_index(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let mut request = IngestRequest::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "textContent" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid textContent field: {}", e)))?;
                request.text_content = Some(text);
            }
            "websiteUrl" => {
                let url = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid websiteUrl field: {}", e)))?;
                request.website_url = Some(url);
            }
            "chatSessionId" => {
                let id = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid chatSessionId field: {}", e)))?;
                if !id.trim().is_empty() {
                    request.chat_session_id = Some(id);
                }
            }
            // Client-side label for which tab submitted the form. Unused.
            "dataSource" => {
                let _ = field.text().await;
            }
            _ if name.starts_with("file_") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| name.clone());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read upload {}: {}", name, e)))?;
                request.files.push(UploadedFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let outcome = ingest::ingest(&state.pool, &state.collections, &state.llm, &user_id, request)
        .await
        .map_err(|e| classify_pipeline_error(e, "failed to index documents"))?;

    let summaries = summary_entries(&outcome.documents);
    let documents: Vec<_> = outcome.documents.iter().map(|d| &d.document).collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!(
            "Indexed {} document(s) ({} chunks)",
            documents.len(),
            outcome.total_chunks
        ),
        "summaries": summaries,
        "documents": documents,
    })))
}

/// Per-document summary entries for the indexing response. Clients key on
/// `resourceName`, so the field name is part of the interface.
fn summary_entries(documents: &[ingest::IngestedDocument]) -> Vec<serde_json::Value> {
    documents
        .iter()
        .map(|d| {
            serde_json::json!({
                "resourceName": d.document.name,
                "summary": d.summary,
                "documentId": d.document.id,
            })
        })
        .collect()
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    #[serde(default)]
    chat_session_id: Option<String>,
    #[serde(default)]
    document_ids: Vec<String>,
}

/// Handler for `POST /api/chat`.
///
/// With a `chatSessionId` this is the session flow: both the question and
/// the answer are persisted to the session's message log. Without one it is
/// the quick flow: a one-shot answer on a smaller candidate set, persisting
/// nothing.
///
/// When retrieval (after any document-id filtering) comes back empty, the
/// reply is a fixed "not enough information" message and the language model
/// is not invoked.
async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    if request.chat_session_id.is_none() {
        return quick_chat(&state, &user_id, message, &request.document_ids).await;
    }

    let session = store::get_or_create_chat_session(
        &state.pool,
        &user_id,
        request.chat_session_id.as_deref(),
        None,
    )
    .await
    .map_err(|e| classify_pipeline_error(e, "failed to resolve chat session"))?;

    let user_message = store::save_message(&state.pool, &session.id, "user", message, None)
        .await
        .map_err(|e| classify_pipeline_error(e, "failed to save message"))?;

    let chunks = search::retrieve_relevant_chunks(
        &state.collections,
        &state.embedder,
        &user_id,
        message,
        &request.document_ids,
        RetrievalScope::Session,
    )
    .await
    .map_err(|e| classify_pipeline_error(e, "failed to search documents"))?;

    let response = if chunks.is_empty() {
        NOT_ENOUGH_INFORMATION.to_string()
    } else {
        state
            .llm
            .generate_answer(message, &chunks)
            .await
            .map_err(|e| classify_pipeline_error(e, "failed to generate answer"))?
    };

    let answer_document_id = search::document_ids_from_chunks(&chunks).into_iter().next();
    let assistant_message = store::save_message(
        &state.pool,
        &session.id,
        "assistant",
        &response,
        answer_document_id.as_deref(),
    )
    .await
    .map_err(|e| classify_pipeline_error(e, "failed to save message"))?;

    Ok(Json(serde_json::json!({
        "response": response,
        "chatSessionId": session.id,
        "messageId": assistant_message.id,
        "userMessageId": user_message.id,
    })))
}

/// One-shot sessionless answer.
async fn quick_chat(
    state: &AppState,
    user_id: &str,
    message: &str,
    document_ids: &[String],
) -> Result<Json<serde_json::Value>, AppError> {
    let chunks = search::retrieve_relevant_chunks(
        &state.collections,
        &state.embedder,
        user_id,
        message,
        document_ids,
        RetrievalScope::Quick,
    )
    .await
    .map_err(|e| classify_pipeline_error(e, "failed to search documents"))?;

    let response = if chunks.is_empty() {
        NOT_ENOUGH_INFORMATION.to_string()
    } else {
        state
            .llm
            .generate_answer(message, &chunks)
            .await
            .map_err(|e| classify_pipeline_error(e, "failed to generate answer"))?
    };

    Ok(Json(serde_json::json!({ "response": response })))
}

// ============ GET /api/user-data ============

#[derive(Deserialize)]
struct UserDataQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Handler for `GET /api/user-data`.
///
/// `?type=documents`, `?type=chat-sessions`, or `?type=all` (the default).
async fn handle_get_user_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserDataQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;
    let kind = query.kind.as_deref().unwrap_or("all");

    match kind {
        "documents" => {
            let documents = store::list_documents(&state.pool, &user_id)
                .await
                .map_err(|e| classify_pipeline_error(e, "failed to list documents"))?;
            Ok(Json(serde_json::json!({ "documents": documents })))
        }
        "chat-sessions" => {
            let sessions = store::list_chat_sessions(&state.pool, &user_id)
                .await
                .map_err(|e| classify_pipeline_error(e, "failed to list chat sessions"))?;
            Ok(Json(serde_json::json!({ "chatSessions": sessions })))
        }
        "all" => {
            let documents = store::list_documents(&state.pool, &user_id)
                .await
                .map_err(|e| classify_pipeline_error(e, "failed to list documents"))?;
            let sessions = store::list_chat_sessions(&state.pool, &user_id)
                .await
                .map_err(|e| classify_pipeline_error(e, "failed to list chat sessions"))?;
            Ok(Json(serde_json::json!({
                "documents": documents,
                "chatSessions": sessions,
            })))
        }
        other => Err(bad_request(format!(
            "unknown type: {} (expected documents, chat-sessions, or all)",
            other
        ))),
    }
}

// ============ PUT /api/user-data ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachRequest {
    document_id: String,
    chat_session_id: String,
}

/// Handler for `PUT /api/user-data`.
///
/// Attaches one of the caller's documents to one of their chat sessions.
async fn handle_put_user_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AttachRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    let session = store::find_chat_session(&state.pool, &user_id, &request.chat_session_id)
        .await
        .map_err(|e| classify_pipeline_error(e, "failed to load chat session"))?;
    if session.is_none() {
        return Err(not_found(format!(
            "chat session not found: {}",
            request.chat_session_id
        )));
    }

    let document = store::attach_document_to_session(
        &state.pool,
        &user_id,
        &request.document_id,
        &request.chat_session_id,
    )
    .await
    .map_err(|e| classify_pipeline_error(e, "failed to update document"))?
    .ok_or_else(|| not_found(format!("document not found: {}", request.document_id)))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "document": document,
    })))
}

// ============ DELETE /api/user-data ============

#[derive(Deserialize)]
struct DeleteQuery {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

/// Handler for `DELETE /api/user-data`.
///
/// `?type=document&id=…` deletes a document: vectors first (best effort),
/// then the metadata row. A vector deletion failure downgrades to a warning
/// in the response; orphaned vectors are preferable to an undeletable
/// document. `?type=chat-session&id=…` deletes a session and its messages,
/// detaching (not deleting) its documents.
async fn handle_delete_user_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = require_user(&headers)?;

    match query.kind.as_str() {
        "document" => {
            let document = store::find_document(&state.pool, &user_id, &query.id)
                .await
                .map_err(|e| classify_pipeline_error(e, "failed to load document"))?
                .ok_or_else(|| not_found(format!("document not found: {}", query.id)))?;

            let warning = match state
                .collections
                .delete_by_document_id(&user_id, &document.id)
                .await
            {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(document_id = %document.id, error = %e, "vector deletion failed");
                    Some("document removed, but its vectors could not be deleted".to_string())
                }
            };

            store::delete_document(&state.pool, &document.id)
                .await
                .map_err(|e| classify_pipeline_error(e, "failed to delete document"))?;

            let mut body = serde_json::json!({ "success": true });
            if let Some(warning) = warning {
                body["warning"] = serde_json::Value::String(warning);
            }
            Ok(Json(body))
        }
        "chat-session" => {
            let deleted = store::delete_chat_session(&state.pool, &user_id, &query.id)
                .await
                .map_err(|e| classify_pipeline_error(e, "failed to delete chat session"))?;
            if !deleted {
                return Err(not_found(format!("chat session not found: {}", query.id)));
            }
            Ok(Json(serde_json::json!({ "success": true })))
        }
        other => Err(bad_request(format!(
            "unknown type: {} (expected document or chat-session)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestedDocument;
    use crate::models::Document;

    fn ingested(name: &str, summary: &str) -> IngestedDocument {
        IngestedDocument {
            document: Document {
                id: "doc-1".to_string(),
                user_id: "alice".to_string(),
                chat_session_id: None,
                name: name.to_string(),
                doc_type: "pdf".to_string(),
                source: name.to_string(),
                summary: Some(summary.to_string()),
                chunk_count: 3,
                created_at: 0,
                updated_at: 0,
            },
            summary: summary.to_string(),
        }
    }

    #[test]
    fn summary_entries_key_on_resource_name() {
        let entries = summary_entries(&[ingested("report.pdf", "A report.")]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["resourceName"], "report.pdf");
        assert_eq!(entries[0]["summary"], "A report.");
        assert_eq!(entries[0]["documentId"], "doc-1");
        assert!(entries[0].get("name").is_none());
    }

    #[test]
    fn validation_failures_keep_their_message() {
        let err = classify_pipeline_error(
            anyhow::anyhow!("no indexable content in request"),
            "failed to index documents",
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("no indexable content"));

        let err = classify_pipeline_error(
            anyhow::anyhow!("source document limit reached (5 of 5)"),
            "failed to index documents",
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("limit reached"));
    }

    #[test]
    fn provider_errors_are_masked() {
        let err = classify_pipeline_error(
            anyhow::anyhow!("OpenAI embeddings error 500: upstream detail"),
            "failed to index documents",
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "failed to index documents");
    }

    #[test]
    fn missing_user_header_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(require_user(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "  ".parse().unwrap());
        assert!(require_user(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "alice".parse().unwrap());
        assert_eq!(require_user(&headers).unwrap(), "alice");
    }
}
