//! Durable vector index over SQLite.
//!
//! Chunk embeddings live in the `chunk_vectors` table as little-endian f32
//! BLOBs, alongside the payload needed to resolve a hit (owning document,
//! chunk ordinal, content). Document rows are written in the same
//! transaction as their vectors, so a reader never observes a document
//! whose chunks are only partially committed. Deletions are durable before
//! the call returns (WAL commit).
//!
//! Queries score by cosine similarity computed in Rust over all stored
//! vectors: `score = 1 - cosine_distance`, clamped to [0, 1] and rounded to
//! 3 decimal places. Results are ordered by descending score; ties fall
//! back to insertion order (rowid) for determinism.

use sqlx::{Row, SqlitePool};

use crate::error::{RagError, Result};
use crate::models::{Chunk, Document};

/// Payload stored with each vector, resolved back out on query.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: i64,
    pub content: String,
}

pub struct VectorIndex {
    pool: SqlitePool,
    dims: usize,
}

impl VectorIndex {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    fn check_dims(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Insert or replace a single chunk vector.
    pub async fn upsert(&self, chunk: &Chunk, document_name: &str, vector: &[f32]) -> Result<()> {
        self.check_dims(vector)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO chunk_vectors
                (chunk_id, document_id, document_name, chunk_index, content, start_char, end_char, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(document_name)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(chunk.start_char as i64)
        .bind(chunk.end_char as i64)
        .bind(vec_to_blob(vector))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Commit a document and all its chunk vectors as one unit. Any prior
    /// vectors for the same document id are replaced, which makes
    /// re-ingestion of identical content an overwrite rather than a
    /// duplicate.
    pub async fn replace_document(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(RagError::Validation(format!(
                "chunk/vector count mismatch: {} vs {}",
                chunks.len(),
                vectors.len()
            )));
        }
        for vector in vectors {
            self.check_dims(vector)?;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents
                (id, name, file_type, size_bytes, chunk_count, created_at, file_path)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.name)
        .bind(&doc.file_type)
        .bind(doc.size_bytes as i64)
        .bind(doc.chunk_count as i64)
        .bind(doc.created_at.timestamp())
        .bind(&doc.file_path)
        .execute(&mut *tx)
        .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors
                    (chunk_id, document_id, document_name, chunk_index, content, start_char, end_char, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&doc.name)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.start_char as i64)
            .bind(chunk.end_char as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove a document row and all its vectors in one transaction.
    /// Unknown ids are a no-op. Returns whether the document row existed
    /// and how many vectors were removed.
    pub async fn delete_document(&self, document_id: &str) -> Result<(bool, u64)> {
        let mut tx = self.pool.begin().await?;

        let vectors_removed = sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let doc_found = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;
        Ok((doc_found, vectors_removed))
    }

    /// Nearest-neighbor query: the `k` stored vectors most similar to
    /// `vector`, best first.
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(ChunkRecord, f32)>> {
        self.check_dims(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT rowid, chunk_id, document_id, document_name, chunk_index, content, embedding
            FROM chunk_vectors
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(i64, ChunkRecord, f32)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let score = cosine_similarity(vector, &stored).clamp(0.0, 1.0);
                let record = ChunkRecord {
                    chunk_id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    document_name: row.get("document_name"),
                    chunk_index: row.get("chunk_index"),
                    content: row.get("content"),
                };
                (row.get::<i64, _>("rowid"), record, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(_, record, score)| (record, round_score(score)))
            .collect())
    }

    /// Total stored vectors.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// All document rows in registration (insertion) order. Used to rebuild
    /// the in-memory catalog on startup.
    pub async fn documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, file_type, size_bytes, chunk_count, created_at, file_path
            FROM documents
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Document {
                id: row.get("id"),
                name: row.get("name"),
                file_type: row.get("file_type"),
                size_bytes: row.get::<i64, _>("size_bytes") as u64,
                chunk_count: row.get::<i64, _>("chunk_count") as usize,
                created_at: chrono::DateTime::from_timestamp(row.get("created_at"), 0)
                    .unwrap_or_default(),
                file_path: row.get("file_path"),
            })
            .collect())
    }
}

/// Round a score to 3 decimal places for presentation.
fn round_score(score: f32) -> f32 {
    (score * 1000.0).round() / 1000.0
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn chunk(doc_id: &str, index: i64, text: &str) -> Chunk {
        Chunk {
            id: format!("{}_{}", doc_id, index),
            document_id: doc_id.to_string(),
            chunk_index: index,
            text: text.to_string(),
            start_char: 0,
            end_char: text.chars().count(),
        }
    }

    fn document(id: &str, name: &str, chunk_count: usize) -> Document {
        Document {
            id: id.to_string(),
            name: name.to_string(),
            file_type: "txt".to_string(),
            size_bytes: 42,
            chunk_count,
            created_at: Utc::now(),
            file_path: format!("/tmp/{}", name),
        }
    }

    async fn open_index(dir: &TempDir, dims: usize) -> VectorIndex {
        let db_path = dir.path().join("index.sqlite");
        let pool = crate::db::connect(&db_path).await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        VectorIndex::new(pool, dims)
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn test_upsert_and_count() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir, 3).await;

        index
            .upsert(&chunk("doc_a", 0, "alpha"), "a.txt", &[1.0, 0.0, 0.0])
            .await
            .unwrap();
        index
            .upsert(&chunk("doc_a", 1, "beta"), "a.txt", &[0.0, 1.0, 0.0])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        // Same chunk id replaces, not duplicates
        index
            .upsert(&chunk("doc_a", 0, "alpha v2"), "a.txt", &[1.0, 0.0, 0.0])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_orders_by_descending_score() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir, 3).await;

        index
            .upsert(&chunk("doc_a", 0, "exact"), "a.txt", &[1.0, 0.0, 0.0])
            .await
            .unwrap();
        index
            .upsert(&chunk("doc_a", 1, "orthogonal"), "a.txt", &[0.0, 1.0, 0.0])
            .await
            .unwrap();
        index
            .upsert(&chunk("doc_a", 2, "close"), "a.txt", &[0.9, 0.1, 0.0])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0.content, "exact");
        assert_eq!(hits[1].0.content, "close");
        assert_eq!(hits[2].0.content, "orthogonal");
        for window in hits.windows(2) {
            assert!(window[0].1 >= window[1].1);
        }
        for (_, score) in &hits {
            assert!((0.0..=1.0).contains(score));
        }
    }

    #[tokio::test]
    async fn test_ties_break_by_insertion_order() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir, 3).await;

        index
            .upsert(&chunk("doc_a", 0, "first"), "a.txt", &[1.0, 0.0, 0.0])
            .await
            .unwrap();
        index
            .upsert(&chunk("doc_b", 0, "second"), "b.txt", &[1.0, 0.0, 0.0])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].0.content, "first");
        assert_eq!(hits[1].0.content, "second");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_an_error() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir, 3).await;

        let err = index
            .upsert(&chunk("doc_a", 0, "x"), "a.txt", &[1.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));

        let err = index.query(&[1.0], 4).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_delete_unknown_document_is_noop() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir, 3).await;

        let (found, removed) = index.delete_document("doc_missing").await.unwrap();
        assert!(!found);
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_replace_then_delete_restores_counts() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir, 3).await;

        let doc = document("doc_a", "a.txt", 2);
        let chunks = vec![chunk("doc_a", 0, "one"), chunk("doc_a", 1, "two")];
        let vectors = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];

        index.replace_document(&doc, &chunks, &vectors).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
        assert_eq!(index.documents().await.unwrap().len(), 1);

        // Replacing the same document does not grow the index
        index.replace_document(&doc, &chunks, &vectors).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        let (found, removed) = index.delete_document("doc_a").await.unwrap();
        assert!(found);
        assert_eq!(removed, 2);
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_similarity_clamps_to_zero() {
        let dir = TempDir::new().unwrap();
        let index = open_index(&dir, 2).await;

        index
            .upsert(&chunk("doc_a", 0, "opposite"), "a.txt", &[-1.0, 0.0])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].1, 0.0);
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("index.sqlite");

        {
            let pool = crate::db::connect(&db_path).await.unwrap();
            crate::migrate::run_migrations(&pool).await.unwrap();
            let index = VectorIndex::new(pool.clone(), 3);
            let doc = document("doc_a", "a.txt", 1);
            index
                .replace_document(&doc, &[chunk("doc_a", 0, "persisted")], &[vec![1.0, 0.0, 0.0]])
                .await
                .unwrap();
            pool.close().await;
        }

        let pool = crate::db::connect(&db_path).await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        let index = VectorIndex::new(pool, 3);
        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.query(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].0.content, "persisted");
        assert_eq!(hits[0].1, 1.0);
    }
}
