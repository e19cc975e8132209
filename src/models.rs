//! Core data models used throughout docchat.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and question-answering pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document registered in the catalog. Immutable after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub file_type: String,
    pub size_bytes: u64,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
    /// Where the original upload was stored. Opaque to the pipeline.
    pub file_path: String,
}

/// A contiguous slice of a document's text, the unit of embedding and
/// retrieval. `start_char`/`end_char` are character offsets into the
/// trimmed document text; consecutive chunks overlap intentionally.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
}

/// A retrieval hit: chunk content paired with its provenance and a
/// relevance score in [0, 1]. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMatch {
    pub content: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: i64,
    pub relevance_score: f32,
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

/// One prior turn of the conversation, supplied by the caller per request.
/// The core never stores these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceMatch>>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            sources: None,
        }
    }
}

/// The outcome of an `ask`: the generated answer, the matches it was
/// grounded on, the model that produced it, and wall-clock time spent.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub answer: String,
    pub sources: Vec<SourceMatch>,
    pub model_used: String,
    pub elapsed_ms: u64,
}

/// Aggregate counts over the catalog and index.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub chunk_count: u64,
}

/// Health snapshot: generation backend reachability plus what is indexed.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub generator_available: bool,
    pub available_models: Vec<String>,
    pub document_count: usize,
}
