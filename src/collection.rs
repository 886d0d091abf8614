//! Per-user vector collection lifecycle.
//!
//! Each user owns exactly one Qdrant collection, named deterministically
//! from their id. All of the user's documents share that collection;
//! isolation between documents is enforced at query time by payload
//! filtering, not by storage partitioning.
//!
//! [`CollectionManager`] is the sole writer of vectors. Its
//! [`get_or_init`](CollectionManager::get_or_init) call converges every
//! starting state — collection absent, present-but-empty, or populated —
//! to a valid queryable collection, inserting the caller's chunks along
//! the way when there are any.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use qdrant_client::qdrant::{
    value::Kind, Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};

use crate::config::{Config, EMBEDDING_DIMS};
use crate::embedding::EmbeddingClient;
use crate::models::{Chunk, RetrievedChunk};

/// What `get_or_init` decided to do after reading collection state.
///
/// Kept as a pure function of (read outcome, presence of new chunks) so the
/// branch logic is testable without a running Qdrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitAction {
    /// Read failed or collection absent, chunks supplied: create + insert.
    CreateAndInsert,
    /// Read failed or collection absent, no chunks: create an empty
    /// collection so future appends have a target.
    CreateEmpty,
    /// Collection exists with zero points and chunks were supplied.
    InsertIntoEmpty,
    /// Collection has points and chunks were supplied: append, never
    /// replace.
    AppendToExisting,
    /// Collection exists, nothing to insert. Callers querying an empty
    /// collection must tolerate zero results, not raise.
    UseExisting,
}

/// Deterministic per-user collection name. Never shared across users.
pub fn user_collection_name(prefix: &str, user_id: &str) -> String {
    format!("{}-user-{}", prefix, user_id)
}

/// Decide the `get_or_init` branch. `points_count` is `None` when the
/// collection could not be read (absent or store error).
pub fn plan_init(points_count: Option<u64>, has_new_chunks: bool) -> InitAction {
    match (points_count, has_new_chunks) {
        (None, true) => InitAction::CreateAndInsert,
        (None, false) => InitAction::CreateEmpty,
        (Some(0), true) => InitAction::InsertIntoEmpty,
        (Some(0), false) => InitAction::UseExisting,
        (Some(_), true) => InitAction::AppendToExisting,
        (Some(_), false) => InitAction::UseExisting,
    }
}

/// Owns the Qdrant client and the per-user collection lifecycle.
pub struct CollectionManager {
    client: Qdrant,
    embedder: EmbeddingClient,
    prefix: String,
    /// Per-user locks serializing the read-then-write sequence of
    /// `get_or_init` within this process. Without them two concurrent
    /// uploads from the same user can both take the "create" branch.
    /// Multi-process deployments would need an external advisory lock.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CollectionManager {
    pub fn new(config: &Config, embedder: EmbeddingClient) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.qdrant_url);
        if let Some(key) = &config.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .context("Failed to initialize Qdrant client")?;

        Ok(Self {
            client,
            embedder,
            prefix: config.collection_prefix.clone(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn collection_name(&self, user_id: &str) -> String {
        user_collection_name(&self.prefix, user_id)
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().await;
        map.entry(user_id.to_string()).or_default().clone()
    }

    /// Ensure the user's collection exists and insert `new_chunks` into it.
    ///
    /// Reproduces the additive branch algorithm: chunks are always appended,
    /// never replacing existing points, and every call path leaves behind a
    /// queryable collection. Safe to call with an empty slice to just
    /// materialize the collection.
    pub async fn get_or_init(&self, user_id: &str, new_chunks: &[Chunk]) -> Result<()> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let name = self.collection_name(user_id);

        let points_count = match self.client.collection_info(&name).await {
            Ok(info) => {
                let count = info.result.and_then(|r| r.points_count);
                tracing::debug!(collection = %name, points = ?count, "collection info read");
                // A readable collection with an unreported count is treated
                // as empty rather than absent.
                Some(count.unwrap_or(0))
            }
            Err(e) => {
                tracing::debug!(collection = %name, error = %e, "collection not readable");
                None
            }
        };

        match plan_init(points_count, !new_chunks.is_empty()) {
            InitAction::CreateAndInsert => {
                tracing::info!(collection = %name, chunks = new_chunks.len(), "creating collection with chunks");
                self.create_collection(&name).await?;
                self.insert_chunks(&name, new_chunks).await?;
            }
            InitAction::CreateEmpty => {
                tracing::info!(collection = %name, "creating empty collection");
                self.create_collection(&name).await?;
            }
            InitAction::InsertIntoEmpty => {
                tracing::info!(collection = %name, chunks = new_chunks.len(), "inserting into empty collection");
                self.insert_chunks(&name, new_chunks).await?;
            }
            InitAction::AppendToExisting => {
                tracing::info!(collection = %name, chunks = new_chunks.len(), "appending to existing collection");
                self.insert_chunks(&name, new_chunks).await?;
            }
            InitAction::UseExisting => {
                tracing::debug!(collection = %name, "collection ready, nothing to insert");
            }
        }

        Ok(())
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(EMBEDDING_DIMS, Distance::Cosine)),
            )
            .await
            .with_context(|| format!("Failed to create collection {}", name))?;
        Ok(())
    }

    async fn insert_chunks(&self, name: &str, chunks: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;

        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let payload: Payload = Payload::try_from(serde_json::json!({
                "text": chunk.text,
                "userId": chunk.metadata.user_id,
                "documentId": chunk.metadata.document_id,
                "documentType": chunk.metadata.document_type.as_str(),
                "source": chunk.metadata.source,
            }))
            .context("Failed to build point payload")?;

            points.push(PointStruct::new(
                Uuid::new_v4().to_string(),
                vector,
                payload,
            ));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .with_context(|| format!("Failed to insert chunks into {}", name))?;

        Ok(())
    }

    /// Similarity search over the user's collection.
    ///
    /// Materializes the collection first (empty if need be) so a user with
    /// zero documents gets an empty result set instead of a store error.
    pub async fn search(
        &self,
        user_id: &str,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RetrievedChunk>> {
        self.get_or_init(user_id, &[]).await?;

        let name = self.collection_name(user_id);
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&name, query_vector, limit).with_payload(true),
            )
            .await
            .with_context(|| format!("Search failed in {}", name))?;

        let chunks = response
            .result
            .into_iter()
            .map(|point| RetrievedChunk {
                text: payload_str(&point.payload, "text").unwrap_or_default(),
                document_id: payload_str(&point.payload, "documentId"),
                source: payload_str(&point.payload, "source"),
                score: point.score,
            })
            .collect();

        Ok(chunks)
    }

    /// Delete all of a document's vectors from its owner's collection.
    ///
    /// Best-effort: the caller reports failures but proceeds with relational
    /// deletion, accepting orphaned vectors over blocked deletes.
    pub async fn delete_by_document_id(&self, user_id: &str, document_id: &str) -> Result<()> {
        let name = self.collection_name(user_id);

        self.client
            .delete_points(
                DeletePointsBuilder::new(&name)
                    .points(Filter::must([Condition::matches(
                        "documentId",
                        document_id.to_string(),
                    )]))
                    .wait(true),
            )
            .await
            .with_context(|| format!("Failed to delete vectors for document {}", document_id))?;

        tracing::info!(collection = %name, document_id, "deleted document vectors");
        Ok(())
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}
