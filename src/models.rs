//! Core data models used throughout askdocs.
//!
//! These types represent the documents, chunks, and chat entities that flow
//! through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Kind of source a document was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Text,
    Website,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Text => "text",
            SourceKind::Website => "website",
        }
    }
}

/// Metadata attached to every chunk of a document.
///
/// Rebuilt (not mutated) at each tagging stage of the pipeline: the owner
/// and type are known at load time, the document id only after the
/// relational row exists. Each chunk owns its own copy so re-tagging one
/// resource can never alias into another's chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub user_id: String,
    pub document_type: SourceKind,
    pub source: String,
    pub document_id: Option<String>,
}

impl ChunkMetadata {
    /// Copy-with-update: returns a new metadata record carrying the
    /// now-known document id.
    pub fn with_document_id(&self, document_id: &str) -> Self {
        Self {
            document_id: Some(document_id.to_string()),
            ..self.clone()
        }
    }
}

/// A bounded slice of a document's text plus its metadata — the unit of
/// storage and retrieval. The embedding vector lives only in the vector
/// store; chunks have no identity outside their collection.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned from the vector store for a query, with its payload
/// fields decoded.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub document_id: Option<String>,
    pub source: Option<String>,
    pub score: f32,
}

/// Document metadata row stored in SQLite.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub chat_session_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub source: String,
    pub summary: Option<String>,
    pub chunk_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A chat session grouping a subset of a user's documents and an ordered
/// message log.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A single user or assistant message within a session.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_session_id: String,
    pub document_id: Option<String>,
    pub role: String,
    pub content: String,
    pub created_at: i64,
}

/// One logical resource loaded for ingestion, before chunking.
#[derive(Debug, Clone)]
pub struct LoadedResource {
    pub name: String,
    pub kind: SourceKind,
    pub source: String,
    pub text: String,
}
