//! Retrieval and document-scoped filtering.
//!
//! Retrieval embeds the user's message, pulls a candidate set from the
//! user's collection, and optionally narrows it to a caller-supplied set of
//! document ids. Filtering happens after the similarity search, so the
//! candidate set is deliberately over-fetched when a document scope is in
//! play — post-filtering can discard most candidates.
//!
//! An empty result after filtering is a valid outcome, not an error: the
//! caller renders a "not enough information" reply instead of invoking the
//! language model.

use anyhow::Result;

use crate::collection::CollectionManager;
use crate::embedding::EmbeddingClient;
use crate::models::RetrievedChunk;

/// Candidate count when results will be post-filtered by document id.
const K_FILTERED: u64 = 10;
/// Candidate count for session queries with no document scope.
const K_SESSION: u64 = 3;
/// Candidate count for the quick sessionless flow, which runs on a tighter
/// prompt budget.
const K_QUICK: u64 = 2;

/// Which chat flow is asking. Determines the unfiltered candidate count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalScope {
    /// A chat session with history and (possibly) selected documents.
    Session,
    /// The top-level one-shot chat without a session.
    Quick,
}

/// How many candidates to request from the vector store.
pub fn candidate_k(document_ids: &[String], scope: RetrievalScope) -> u64 {
    if !document_ids.is_empty() {
        K_FILTERED
    } else {
        match scope {
            RetrievalScope::Session => K_SESSION,
            RetrievalScope::Quick => K_QUICK,
        }
    }
}

/// Retrieve the chunks most relevant to `message` from the user's
/// collection, scoped to `document_ids` when non-empty.
pub async fn retrieve_relevant_chunks(
    collections: &CollectionManager,
    embedder: &EmbeddingClient,
    user_id: &str,
    message: &str,
    document_ids: &[String],
    scope: RetrievalScope,
) -> Result<Vec<RetrievedChunk>> {
    let k = candidate_k(document_ids, scope);
    tracing::debug!(user_id, k, scoped = !document_ids.is_empty(), "searching for relevant chunks");

    let query_vector = embedder.embed_query(message).await?;
    let candidates = collections.search(user_id, query_vector, k).await?;
    tracing::debug!(found = candidates.len(), "similarity search complete");

    if document_ids.is_empty() {
        return Ok(candidates);
    }

    let filtered = filter_chunks_by_document_ids(candidates, document_ids);
    Ok(filtered)
}

/// Keep exactly the chunks whose `document_id` is in the scope set.
///
/// An empty scope means no filtering: all chunks are in scope. A chunk with
/// no document id (a point written before ids were tagged) never matches a
/// non-empty scope.
pub fn filter_chunks_by_document_ids(
    chunks: Vec<RetrievedChunk>,
    document_ids: &[String],
) -> Vec<RetrievedChunk> {
    if document_ids.is_empty() {
        return chunks;
    }

    let before = chunks.len();
    let filtered: Vec<RetrievedChunk> = chunks
        .into_iter()
        .filter(|chunk| {
            chunk
                .document_id
                .as_ref()
                .map(|id| document_ids.contains(id))
                .unwrap_or(false)
        })
        .collect();

    tracing::debug!(
        before,
        after = filtered.len(),
        scope = ?document_ids,
        kept = ?document_ids_from_chunks(&filtered),
        "filtered chunks by document id"
    );

    filtered
}

/// Distinct document ids present in a chunk set, in first-seen order.
pub fn document_ids_from_chunks(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut ids = Vec::new();
    for chunk in chunks {
        if let Some(id) = &chunk.document_id {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, document_id: Option<&str>) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            document_id: document_id.map(str::to_string),
            source: None,
            score: 0.5,
        }
    }

    #[test]
    fn empty_scope_returns_chunks_unchanged() {
        let chunks = vec![chunk("a", Some("d1")), chunk("b", None)];
        let out = filter_chunks_by_document_ids(chunks, &[]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn keeps_exactly_the_scoped_subset() {
        let chunks = vec![
            chunk("a", Some("d1")),
            chunk("b", Some("d2")),
            chunk("c", Some("d1")),
            chunk("d", Some("d3")),
        ];
        let scope = vec!["d1".to_string(), "d3".to_string()];
        let out = filter_chunks_by_document_ids(chunks, &scope);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| {
            let id = c.document_id.as_deref().unwrap();
            id == "d1" || id == "d3"
        }));
    }

    #[test]
    fn untagged_chunks_never_match_a_scope() {
        let chunks = vec![chunk("a", None), chunk("b", Some("d1"))];
        let scope = vec!["d1".to_string()];
        let out = filter_chunks_by_document_ids(chunks, &scope);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "b");
    }

    #[test]
    fn filtering_to_nothing_is_valid() {
        let chunks = vec![chunk("a", Some("d1"))];
        let scope = vec!["other".to_string()];
        let out = filter_chunks_by_document_ids(chunks, &scope);
        assert!(out.is_empty());
    }

    #[test]
    fn candidate_k_policy() {
        let scoped = vec!["d1".to_string()];
        assert_eq!(candidate_k(&scoped, RetrievalScope::Session), 10);
        assert_eq!(candidate_k(&scoped, RetrievalScope::Quick), 10);
        assert_eq!(candidate_k(&[], RetrievalScope::Session), 3);
        assert_eq!(candidate_k(&[], RetrievalScope::Quick), 2);
    }

    #[test]
    fn distinct_document_ids_in_order() {
        let chunks = vec![
            chunk("a", Some("d2")),
            chunk("b", Some("d1")),
            chunk("c", Some("d2")),
            chunk("d", None),
        ];
        assert_eq!(document_ids_from_chunks(&chunks), vec!["d2", "d1"]);
    }
}
