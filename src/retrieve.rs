//! Query-time retrieval: embed the question, rank stored chunks.

use tracing::debug;

use crate::embedding::{self, EmbeddingGateway};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::models::SourceMatch;

/// Retrieve the `top_k` most relevant chunks for a query, best first.
///
/// Empty/whitespace queries are rejected before any I/O. An empty result
/// (empty index, or nothing clears `min_score`) is a valid outcome, not an
/// error.
pub async fn retrieve(
    gateway: &dyn EmbeddingGateway,
    index: &VectorIndex,
    query: &str,
    top_k: usize,
    min_score: f32,
) -> Result<Vec<SourceMatch>> {
    if query.trim().is_empty() {
        return Err(RagError::Validation("query must not be empty".to_string()));
    }

    let query_vec = embedding::embed_query(gateway, query).await?;
    let hits = index.query(&query_vec, top_k).await?;

    let matches: Vec<SourceMatch> = hits
        .into_iter()
        .filter(|(_, score)| *score >= min_score)
        .map(|(record, score)| SourceMatch {
            content: record.content,
            document_id: record.document_id,
            document_name: record.document_name,
            chunk_index: record.chunk_index,
            relevance_score: score,
        })
        .collect();

    debug!(query_len = query.len(), matches = matches.len(), "retrieval complete");
    Ok(matches)
}
