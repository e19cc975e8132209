//! In-memory document catalog.
//!
//! A registration-ordered registry of [`Document`] metadata behind a
//! `std::sync::RwLock`. The catalog is a cache of the `documents` table:
//! it is rebuilt from the index's storage at service open and only updated
//! after the corresponding index transaction has committed, so it never
//! lists a document whose chunks are not fully durable.

use std::sync::RwLock;

use crate::models::Document;

#[derive(Default)]
pub struct DocumentCatalog {
    docs: RwLock<Vec<Document>>,
}

impl DocumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog from persisted rows, preserving their order.
    pub fn from_documents(docs: Vec<Document>) -> Self {
        Self {
            docs: RwLock::new(docs),
        }
    }

    /// Register a document. A document with the same id is replaced in
    /// place, keeping its original position in registration order.
    /// Returns true if an existing entry was replaced.
    pub fn register(&self, doc: Document) -> bool {
        let mut docs = self.docs.write().unwrap();
        if let Some(existing) = docs.iter_mut().find(|d| d.id == doc.id) {
            *existing = doc;
            true
        } else {
            docs.push(doc);
            false
        }
    }

    /// Remove a document by id. Returns whether it was present.
    pub fn unregister(&self, document_id: &str) -> bool {
        let mut docs = self.docs.write().unwrap();
        let before = docs.len();
        docs.retain(|d| d.id != document_id);
        docs.len() < before
    }

    pub fn get(&self, document_id: &str) -> Option<Document> {
        let docs = self.docs.read().unwrap();
        docs.iter().find(|d| d.id == document_id).cloned()
    }

    /// All documents in registration order.
    pub fn list(&self) -> Vec<Document> {
        self.docs.read().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str, name: &str) -> Document {
        Document {
            id: id.to_string(),
            name: name.to_string(),
            file_type: "txt".to_string(),
            size_bytes: 1,
            chunk_count: 1,
            created_at: Utc::now(),
            file_path: String::new(),
        }
    }

    #[test]
    fn register_preserves_order() {
        let catalog = DocumentCatalog::new();
        catalog.register(doc("doc_b", "b.txt"));
        catalog.register(doc("doc_a", "a.txt"));
        catalog.register(doc("doc_c", "c.txt"));

        let ids: Vec<String> = catalog.list().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["doc_b", "doc_a", "doc_c"]);
        assert_eq!(catalog.count(), 3);
    }

    #[test]
    fn duplicate_id_replaces_in_place() {
        let catalog = DocumentCatalog::new();
        catalog.register(doc("doc_a", "a.txt"));
        catalog.register(doc("doc_b", "b.txt"));

        let replaced = catalog.register(doc("doc_a", "a-updated.txt"));
        assert!(replaced);
        assert_eq!(catalog.count(), 2);

        let listed = catalog.list();
        assert_eq!(listed[0].id, "doc_a");
        assert_eq!(listed[0].name, "a-updated.txt");
    }

    #[test]
    fn unregister_reports_presence() {
        let catalog = DocumentCatalog::new();
        catalog.register(doc("doc_a", "a.txt"));

        assert!(catalog.unregister("doc_a"));
        assert!(!catalog.unregister("doc_a"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn get_finds_by_id() {
        let catalog = DocumentCatalog::new();
        catalog.register(doc("doc_a", "a.txt"));

        assert_eq!(catalog.get("doc_a").unwrap().name, "a.txt");
        assert!(catalog.get("doc_x").is_none());
    }
}
