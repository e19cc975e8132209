//! End-to-end orchestration: ingest, ask, remove.
//!
//! [`RagService`] composes the chunker, vector index, document catalog, and
//! the embedding/generation gateways into the full pipeline. Gateways are
//! injected at construction ([`RagService::with_gateways`]); [`RagService::open`]
//! wires up the backends named in the configuration.
//!
//! Consistency rules enforced here:
//! - A document becomes visible in the catalog only after all of its chunk
//!   vectors are committed to the index (single transaction), so a
//!   concurrent question can never cite a half-ingested document.
//! - Removal deletes index state first (one transaction), then the catalog
//!   entry; a divergence between the two is logged and reported as an error.
//! - Operations on the same document id are serialized through a
//!   per-document async mutex; different documents proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::catalog::DocumentCatalog;
use crate::chunk;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingGateway};
use crate::error::{RagError, Result};
use crate::extract;
use crate::generation::{self, GenerationGateway, TextStream};
use crate::index::VectorIndex;
use crate::migrate;
use crate::models::{ChatOutcome, ConversationTurn, Document, Health, IndexStats, SourceMatch};
use crate::prompt;
use crate::retrieve;

/// Fixed answer when no documents have been ingested yet. Returned without
/// touching the embedding or generation backends.
pub const NO_DOCUMENTS_ANSWER: &str = "I don't have any documents to search through yet. \
    Please upload some documents first, and then I'll be happy to answer your questions about them!";

/// Fixed answer when retrieval finds nothing relevant.
pub const NO_MATCHES_ANSWER: &str = "I couldn't find any relevant information in the uploaded \
    documents for your question. Try rephrasing your question or uploading more relevant documents.";

/// The result of a streaming ask: sources resolved up front, answer
/// fragments arriving incrementally.
pub struct ChatStream {
    pub sources: Vec<SourceMatch>,
    pub model_used: String,
    pub stream: TextStream,
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("sources", &self.sources)
            .field("model_used", &self.model_used)
            .finish_non_exhaustive()
    }
}

pub struct RagService {
    config: Config,
    index: VectorIndex,
    catalog: DocumentCatalog,
    embedder: Box<dyn EmbeddingGateway>,
    generator: Box<dyn GenerationGateway>,
    doc_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RagService {
    /// Open the service with the gateways named in the configuration.
    pub async fn open(config: Config) -> Result<Self> {
        let embedder = embedding::create_gateway(&config.embedding)?;
        let generator = generation::create_gateway(&config.generation)?;
        Self::with_gateways(config, embedder, generator).await
    }

    /// Open the service with explicitly provided gateways.
    pub async fn with_gateways(
        config: Config,
        embedder: Box<dyn EmbeddingGateway>,
        generator: Box<dyn GenerationGateway>,
    ) -> Result<Self> {
        let pool = db::connect(&config.storage.db_path).await?;
        migrate::run_migrations(&pool).await?;
        std::fs::create_dir_all(&config.storage.upload_dir)?;

        let index = VectorIndex::new(pool, embedder.dims());
        let documents = index.documents().await?;
        debug!(documents = documents.len(), "catalog restored from storage");
        let catalog = DocumentCatalog::from_documents(documents);

        Ok(Self {
            config,
            index,
            catalog,
            embedder,
            generator,
            doc_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generator(&self) -> &dyn GenerationGateway {
        self.generator.as_ref()
    }

    /// Ingest a document: validate, extract text, chunk, embed, store the
    /// upload, commit all vectors and the document row in one transaction,
    /// then register in the catalog.
    ///
    /// Identical bytes under the same filename hash to the same id;
    /// re-ingesting replaces the prior chunks instead of duplicating them.
    pub async fn ingest(&self, filename: &str, content: &[u8]) -> Result<Document> {
        let file_type =
            extract::validate_upload(filename, content.len() as u64, &self.config.upload)?;

        let doc_id = document_id(filename, content);
        let lock = self.lock_for(&doc_id);
        let _held = lock.lock().await;

        // PDF parsing is CPU-bound; keep it off the async workers.
        let text = if file_type == "pdf" {
            let bytes = content.to_vec();
            tokio::task::spawn_blocking(move || extract::extract_text(&bytes, "pdf"))
                .await
                .map_err(|e| RagError::ExtractionFailed(e.to_string()))??
        } else {
            extract::extract_text(content, &file_type)?
        };

        if text.trim().is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let chunks = chunk::chunk_text(
            &doc_id,
            &text,
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        );
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "embedding backend returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let stored_name = format!("{}_{}", doc_id, filename);
        let file_path = self.config.storage.upload_dir.join(stored_name);
        tokio::fs::write(&file_path, content).await?;

        let doc = Document {
            id: doc_id.clone(),
            name: filename.to_string(),
            file_type,
            size_bytes: content.len() as u64,
            chunk_count: chunks.len(),
            created_at: Utc::now(),
            file_path: file_path.display().to_string(),
        };

        self.index.replace_document(&doc, &chunks, &vectors).await?;
        let replaced = self.catalog.register(doc.clone());

        info!(
            document = %doc.id,
            name = %doc.name,
            chunks = doc.chunk_count,
            replaced,
            "document ingested"
        );
        Ok(doc)
    }

    /// Remove a document and all of its chunks. Returns false for ids the
    /// catalog does not know.
    pub async fn remove(&self, document_id: &str) -> Result<bool> {
        let lock = self.lock_for(document_id);
        let _held = lock.lock().await;

        let Some(doc) = self.catalog.get(document_id) else {
            return Ok(false);
        };

        let (doc_found, vectors_removed) = self.index.delete_document(document_id).await?;
        if !doc_found {
            warn!(
                document = %document_id,
                "catalog lists a document the index does not have"
            );
            return Err(RagError::Inconsistent(format!(
                "document {} registered but absent from index",
                document_id
            )));
        }

        self.catalog.unregister(document_id);

        if !doc.file_path.is_empty() {
            // Stored upload is best-effort cleanup
            let _ = tokio::fs::remove_file(&doc.file_path).await;
        }

        info!(document = %document_id, vectors_removed, "document removed");
        Ok(true)
    }

    /// Answer a question from the ingested documents.
    pub async fn ask(&self, query: &str, history: &[ConversationTurn]) -> Result<ChatOutcome> {
        let start = Instant::now();

        if query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }

        if self.catalog.is_empty() {
            return Ok(self.fixed_outcome(NO_DOCUMENTS_ANSWER, start));
        }

        let sources = self.retrieve_sources(query).await?;
        if sources.is_empty() {
            return Ok(self.fixed_outcome(NO_MATCHES_ANSWER, start));
        }

        let (system_prompt, user_prompt) = prompt::build(query, &sources, history);
        let answer = self.generator.generate(&system_prompt, &user_prompt).await?;

        Ok(ChatOutcome {
            answer,
            sources,
            model_used: self.generator.model_name().to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Streaming variant of [`ask`](Self::ask): sources are resolved before
    /// the stream starts; the fixed fallback answers arrive as a single
    /// fragment.
    pub async fn ask_stream(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<ChatStream> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }

        if self.catalog.is_empty() {
            return Ok(self.fixed_stream(NO_DOCUMENTS_ANSWER));
        }

        let sources = self.retrieve_sources(query).await?;
        if sources.is_empty() {
            return Ok(self.fixed_stream(NO_MATCHES_ANSWER));
        }

        let (system_prompt, user_prompt) = prompt::build(query, &sources, history);
        let stream = self
            .generator
            .generate_stream(&system_prompt, &user_prompt)
            .await?;

        Ok(ChatStream {
            sources,
            model_used: self.generator.model_name().to_string(),
            stream,
        })
    }

    /// Retrieve relevant chunks for a query without generating an answer.
    pub async fn retrieve_sources(&self, query: &str) -> Result<Vec<SourceMatch>> {
        let mut sources = retrieve::retrieve(
            self.embedder.as_ref(),
            &self.index,
            query,
            self.config.retrieval.top_k,
            self.config.retrieval.min_score,
        )
        .await?;

        // Only cite documents the catalog currently lists; a document whose
        // ingest or removal is still settling stays invisible.
        sources.retain(|m| self.catalog.get(&m.document_id).is_some());
        Ok(sources)
    }

    /// All registered documents in registration order.
    pub fn documents(&self) -> Vec<Document> {
        self.catalog.list()
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            document_count: self.catalog.count(),
            chunk_count: self.index.count().await?,
        })
    }

    /// Backend reachability plus catalog size. Backend failures degrade to
    /// false/empty instead of erroring.
    pub async fn health(&self) -> Health {
        let generator_available = self.generator.is_available().await;
        let available_models = if generator_available {
            self.generator.list_models().await
        } else {
            Vec::new()
        };

        Health {
            generator_available,
            available_models,
            document_count: self.catalog.count(),
        }
    }

    fn fixed_outcome(&self, answer: &str, start: Instant) -> ChatOutcome {
        ChatOutcome {
            answer: answer.to_string(),
            sources: Vec::new(),
            model_used: self.generator.model_name().to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn fixed_stream(&self, answer: &str) -> ChatStream {
        ChatStream {
            sources: Vec::new(),
            model_used: self.generator.model_name().to_string(),
            stream: Box::pin(futures::stream::iter([Ok(answer.to_string())])),
        }
    }

    fn lock_for(&self, document_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.doc_locks.lock().unwrap();
        locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Deterministic document identity: same filename + same bytes always hash
/// to the same id, so re-uploads land on the existing document.
pub fn document_id(filename: &str, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update((content.len() as u64).to_le_bytes());
    hasher.update(content);
    let hash = format!("{:x}", hasher.finalize());
    format!("doc_{}", &hash[..12])
}
