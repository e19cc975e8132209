//! Error taxonomy for the retrieval-augmented chat core.
//!
//! Input-shape problems (`Validation`, `UnsupportedType`) are rejected
//! before any I/O. Ingestion failures (`ExtractionFailed`, `EmptyDocument`)
//! abort with no partial state committed. Backend-unreachable conditions
//! surface as `EmbeddingUnavailable`/`GenerationUnavailable` so callers can
//! treat them as retryable; nothing in this crate retries automatically.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    /// Malformed input rejected before any work is done (e.g. empty query).
    #[error("invalid input: {0}")]
    Validation(String),

    /// File extension outside the configured allow-list.
    #[error("file type '.{0}' not supported")]
    UnsupportedType(String),

    /// A supported file could not be parsed into text.
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    /// Extraction succeeded but yielded no usable text.
    #[error("could not extract any text from the document")]
    EmptyDocument,

    /// Vector dimensionality does not match the index. Indicates an
    /// embedding model / index mismatch and is fatal to the request.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding backend unreachable or returned an unusable response.
    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Generation backend unreachable or returned an unusable response.
    #[error("generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    /// Catalog and index disagree about a document. The operation that
    /// detected it reports failure rather than papering over the divergence.
    #[error("catalog/index inconsistency: {0}")]
    Inconsistent(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;
