//! Overlapping fixed-size text chunker.
//!
//! Splits document body text into [`Chunk`]s of at most `CHUNK_SIZE`
//! characters with `CHUNK_OVERLAP` characters shared between consecutive
//! chunks, so that content falling on a boundary still appears whole in at
//! least one chunk. The cost is roughly 20% redundant storage.
//!
//! Splitting is a pure function of its input: same text, same chunks.
//! Every produced chunk carries its own clone of the caller's metadata so
//! that later re-tagging cannot alias across chunks.

use crate::models::{Chunk, ChunkMetadata};

/// Target chunk size in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 200;

/// Split text into overlapping chunks, cloning `metadata` into each.
///
/// Input shorter than [`CHUNK_SIZE`] yields exactly one chunk equal to the
/// input. Consecutive chunks share exactly [`CHUNK_OVERLAP`] characters;
/// only the final chunk may be shorter than the target size.
pub fn split(text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
    split_with(text, metadata, CHUNK_SIZE, CHUNK_OVERLAP)
}

fn split_with(
    text: &str,
    metadata: &ChunkMetadata,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    assert!(overlap < chunk_size, "overlap must be smaller than chunk size");

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total <= chunk_size {
        return vec![Chunk {
            text: text.to_string(),
            metadata: metadata.clone(),
        }];
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(total);
        chunks.push(Chunk {
            text: chars[start..end].iter().collect(),
            metadata: metadata.clone(),
        });
        if end == total {
            break;
        }
        start += step;
    }

    chunks
}
