use crate::collection::{Document, DocumentId};
use crossbeam_skiplist::SkipMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

/// Ordered, concurrent map from document ID to document body.
///
/// # Purpose
/// `DocumentMap` is the primary storage of a collection. It is backed by a
/// concurrent skip list, so readers never take a lock and always see either
/// the previous or the next version of a document, never a partial write.
///
/// # Characteristics
/// - **Thread-Safe**: cloning shares the same backing map
/// - **Ordered**: iteration walks IDs in ascending order
/// - **Lock-free reads**: `get` and iteration never block writers
#[derive(Clone)]
pub struct DocumentMap {
    inner: Arc<DocumentMapInner>,
}

impl DocumentMap {
    pub fn new() -> Self {
        DocumentMap {
            inner: Arc::new(DocumentMapInner {
                backing_map: SkipMap::new(),
            }),
        }
    }

    /// Returns a copy of the document stored under `id`.
    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.inner
            .backing_map
            .get(id)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.inner.backing_map.contains_key(id)
    }

    /// Stores `document` under `id`, replacing any previous version.
    pub fn put(&self, id: DocumentId, document: Document) {
        self.inner.backing_map.insert(id, document);
    }

    /// Removes the document stored under `id` and returns it.
    pub fn remove(&self, id: &DocumentId) -> Option<Document> {
        self.inner
            .backing_map
            .remove(id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> u64 {
        self.inner.backing_map.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.inner.backing_map.is_empty()
    }

    pub fn clear(&self) {
        self.inner.backing_map.clear();
    }

    /// Gets the smallest ID strictly greater than `after`, or the first ID
    /// when `after` is `None`.
    ///
    /// The full-scan cursor advances with this method, so it keeps working
    /// while documents are inserted or removed concurrently.
    pub fn next_after(&self, after: Option<DocumentId>) -> Option<(DocumentId, Document)> {
        let entry = match after {
            Some(id) => self
                .inner
                .backing_map
                .range((Excluded(id), Unbounded))
                .next(),
            None => self.inner.backing_map.front(),
        };
        entry.map(|e| (*e.key(), e.value().clone()))
    }

    /// Gets all IDs in ascending order.
    pub fn ids(&self) -> Vec<DocumentId> {
        self.inner.backing_map.iter().map(|e| *e.key()).collect()
    }

    /// Copies every entry in ascending ID order.
    pub fn snapshot(&self) -> Vec<(DocumentId, Document)> {
        self.inner
            .backing_map
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }
}

impl Default for DocumentMap {
    fn default() -> Self {
        DocumentMap::new()
    }
}

struct DocumentMapInner {
    backing_map: SkipMap<DocumentId, Document>,
}
