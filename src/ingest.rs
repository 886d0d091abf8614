//! Document ingestion pipeline.
//!
//! Turns raw inputs (pasted text, website URLs, PDF uploads) into indexed
//! documents: load and normalize the text, chunk it, record a metadata row,
//! tag every chunk with its document id, and write the whole batch into the
//! user's vector collection in one pass. Summaries are generated after
//! indexing so a slow or failing summary never blocks queries.

use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::answer::LlmClient;
use crate::chunk;
use crate::collection::CollectionManager;
use crate::config::MAX_SOURCE_DOCUMENTS;
use crate::loader::{self, LoaderError};
use crate::models::{Chunk, ChunkMetadata, Document, LoadedResource};
use crate::store;

/// A file received over multipart upload.
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Everything one indexing call may carry. Any combination of the three
/// input kinds is allowed as long as at least one yields text.
#[derive(Default)]
pub struct IngestRequest {
    pub text_content: Option<String>,
    pub website_url: Option<String>,
    pub files: Vec<UploadedFile>,
    pub chat_session_id: Option<String>,
}

/// One per-document result of an ingestion run.
#[derive(Debug)]
pub struct IngestedDocument {
    pub document: Document,
    pub summary: String,
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub documents: Vec<IngestedDocument>,
    pub total_chunks: usize,
}

/// Run the full pipeline for one request.
///
/// All loaded resources are chunked up front and indexed in a single
/// collection write, so a request with several inputs either indexes all of
/// them or (on a store error) none. Unsupported uploads are skipped with a
/// warning rather than failing the inputs that did load.
pub async fn ingest(
    pool: &SqlitePool,
    collections: &CollectionManager,
    llm: &LlmClient,
    user_id: &str,
    request: IngestRequest,
) -> Result<IngestOutcome> {
    let resources = load_resources(&request).await?;
    if resources.is_empty() {
        bail!("no indexable content in request");
    }

    let existing = store::count_documents(pool, user_id).await?;
    if existing + resources.len() as i64 > MAX_SOURCE_DOCUMENTS {
        bail!(
            "source document limit reached ({} of {})",
            existing,
            MAX_SOURCE_DOCUMENTS
        );
    }

    let session_id = request.chat_session_id.as_deref();
    let mut documents = Vec::with_capacity(resources.len());
    let mut all_chunks: Vec<Chunk> = Vec::new();
    let mut per_document_chunks: Vec<Vec<String>> = Vec::new();

    for resource in &resources {
        let metadata = ChunkMetadata {
            user_id: user_id.to_string(),
            document_type: resource.kind,
            source: resource.source.clone(),
            document_id: None,
        };
        let chunks = chunk::split(&resource.text, &metadata);
        if chunks.is_empty() {
            tracing::warn!(name = %resource.name, "resource produced no chunks, skipping");
            continue;
        }

        let document = store::create_document(
            pool,
            user_id,
            session_id,
            &resource.name,
            resource.kind.as_str(),
            &resource.source,
            chunks.len() as i64,
        )
        .await?;
        tracing::info!(
            document_id = %document.id,
            chunks = chunks.len(),
            kind = %document.doc_type,
            "created document"
        );

        let tagged: Vec<Chunk> = chunks
            .into_iter()
            .map(|c| Chunk {
                metadata: c.metadata.with_document_id(&document.id),
                text: c.text,
            })
            .collect();

        per_document_chunks.push(tagged.iter().map(|c| c.text.clone()).collect());
        all_chunks.extend(tagged);
        documents.push(document);
    }

    if all_chunks.is_empty() {
        bail!("no indexable content in request");
    }

    let total_chunks = all_chunks.len();
    collections.get_or_init(user_id, &all_chunks).await?;
    tracing::info!(user_id, total_chunks, "indexed chunks into user collection");

    // Summaries run after indexing and one at a time. A failure inside
    // generate_summary is absorbed there and surfaces as fallback text.
    let mut ingested = Vec::with_capacity(documents.len());
    for (document, texts) in documents.into_iter().zip(per_document_chunks) {
        let summary = llm.generate_summary(&texts).await;
        store::update_document_summary(pool, &document.id, &summary).await?;
        ingested.push(IngestedDocument { document, summary });
    }

    Ok(IngestOutcome {
        documents: ingested,
        total_chunks,
    })
}

/// Load every input in the request into normalized text.
///
/// Unsupported file types are skipped (logged), other loader failures
/// propagate.
async fn load_resources(request: &IngestRequest) -> Result<Vec<LoadedResource>> {
    let mut resources = Vec::new();

    if let Some(text) = request
        .text_content
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        resources.push(loader::load_text(text));
    }

    if let Some(url) = request
        .website_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
    {
        resources.push(loader::load_website(url).await?);
    }

    for file in &request.files {
        match loader::load_upload(&file.name, &file.bytes) {
            Ok(resource) => resources.push(resource),
            Err(LoaderError::UnsupportedFileType(name)) => {
                tracing::warn!(file = %name, "unsupported file type, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(resources)
}
