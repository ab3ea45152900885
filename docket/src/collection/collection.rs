use crate::collection::patch::apply_patch;
use crate::collection::{Document, DocumentId, DocumentMap, PatchOperation};
use crate::common::{MAX_COLLECTION_NAME_LEN, MAX_DOCUMENT_ID, RESERVED_NAME_CHARS};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::index::{IndexManager, IndexMode};
use crate::store::{CollectionImage, DocumentEntry, IndexImage};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A named container of documents, their indexes and the next-ID counter.
///
/// Reads are lock-free. Every write runs under the collection's own write
/// lock, so writes to different collections never serialize, and goes
/// through the index manager before the new document becomes visible.
#[derive(Clone)]
pub(crate) struct Collection {
    inner: Arc<CollectionInner>,
}

impl Collection {
    /// Creates an empty collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `name` is not a valid collection name.
    pub fn new(name: &str) -> DocketResult<Self> {
        validate_collection_name(name)?;
        Ok(Collection {
            inner: Arc::new(CollectionInner::new(name)),
        })
    }

    /// Rebuilds a collection from a store image, including its indexes.
    pub fn from_image(image: CollectionImage) -> DocketResult<Self> {
        let collection = Collection::new(&image.name)?;
        let inner = &collection.inner;
        let mut max_id = 0;
        for entry in image.documents {
            max_id = max_id.max(entry.id.value());
            inner.documents.put(entry.id, entry.document);
        }
        for index in image.indexes {
            let mode = IndexMode::from_bits(index.mode)?;
            inner
                .index_manager
                .ensure_index(&index.ptr, mode, &inner.documents)?;
        }
        inner
            .next_id
            .store(image.next_id.max(max_id + 1), Ordering::SeqCst);
        Ok(collection)
    }

    pub fn name(&self) -> String {
        self.inner.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.inner.name.write() = name.to_string();
    }

    pub fn documents(&self) -> &DocumentMap {
        &self.inner.documents
    }

    pub fn index_manager(&self) -> &IndexManager {
        &self.inner.index_manager
    }

    pub fn next_id(&self) -> u64 {
        self.inner.next_id.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> u64 {
        self.inner.documents.len()
    }

    /// Whether the collection has been removed from the catalog. A handle
    /// obtained before the removal rejects further writes.
    pub fn is_dropped(&self) -> bool {
        self.inner.dropped.load(Ordering::SeqCst)
    }

    /// Acquires the write lock. Held by the backup coordinator to take a
    /// consistent snapshot.
    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.inner.write_lock.lock()
    }

    /// Marks the collection as dropped and clears its storage.
    pub(crate) fn drop_collection(&self) {
        let _guard = self.inner.write_lock.lock();
        self.inner.dropped.store(true, Ordering::SeqCst);
        self.inner.documents.clear();
        log::debug!("Dropped collection {}", self.name());
    }

    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.inner.documents.get(id)
    }

    /// Stores `document` under the next free ID.
    pub fn put_new(&self, document: Document) -> DocketResult<DocumentId> {
        let _guard = self.inner.write_lock.lock();
        self.inner.check_writable()?;

        let next = self.inner.next_id.load(Ordering::SeqCst);
        if next > MAX_DOCUMENT_ID {
            log::error!("Collection {} has exhausted its document ids", self.name());
            return Err(DocketError::new(
                &format!("Collection '{}' has no document ids left", self.name()),
                ErrorKind::ResourceExhausted,
            ));
        }
        let id = DocumentId::new_unchecked(next);
        self.inner.replace_locked(id, None, document)?;
        Ok(id)
    }

    /// Stores `document` under `id`, replacing any previous version.
    pub fn put(&self, id: DocumentId, document: Document) -> DocketResult<()> {
        let _guard = self.inner.write_lock.lock();
        self.inner.check_writable()?;
        let old = self.inner.documents.get(&id);
        self.inner.replace_locked(id, old, document)
    }

    /// Merges `patch` into the document at `id`, or stores the patch itself
    /// when no such document exists.
    pub fn merge_or_put(&self, id: DocumentId, patch: &Value) -> DocketResult<()> {
        let _guard = self.inner.write_lock.lock();
        self.inner.check_writable()?;
        let old = self.inner.documents.get(&id);
        let merged = match &old {
            Some(existing) => {
                let mut merged = existing.clone();
                merged.merge(patch);
                merged
            }
            None => Document::from_value(patch.clone()),
        };
        self.inner.replace_locked(id, old, merged)
    }

    /// Applies patch operations to the document at `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no document at `id`; `InvalidArgument` if an
    /// operation fails, in which case nothing changes.
    pub fn patch(&self, id: DocumentId, ops: &[PatchOperation]) -> DocketResult<()> {
        let _guard = self.inner.write_lock.lock();
        self.inner.check_writable()?;
        let Some(old) = self.inner.documents.get(&id) else {
            log::error!("Cannot patch missing document {} in {}", id, self.name());
            return Err(DocketError::new(
                &format!("Document {} not found in collection '{}'", id, self.name()),
                ErrorKind::NotFound,
            ));
        };
        let patched = apply_patch(&old, ops)?;
        self.inner.replace_locked(id, Some(old), patched)
    }

    /// Replaces the document at `id` with the result of `update`.
    ///
    /// Returns the new document, or `None` if the document no longer exists.
    pub fn update_with<F>(&self, id: DocumentId, update: F) -> DocketResult<Option<Document>>
    where
        F: FnOnce(&Document) -> DocketResult<Document>,
    {
        let _guard = self.inner.write_lock.lock();
        self.inner.check_writable()?;
        let Some(old) = self.inner.documents.get(&id) else {
            return Ok(None);
        };
        let updated = update(&old)?;
        self.inner.replace_locked(id, Some(old), updated.clone())?;
        Ok(Some(updated))
    }

    /// Removes the document at `id`. Returns whether a document was removed.
    pub fn del(&self, id: DocumentId) -> DocketResult<bool> {
        let _guard = self.inner.write_lock.lock();
        self.inner.check_writable()?;
        let Some(old) = self.inner.documents.get(&id) else {
            return Ok(false);
        };
        self.inner.index_manager.write_entries(id, Some(&old), None)?;
        self.inner.documents.remove(&id);
        Ok(true)
    }

    pub fn ensure_index(&self, path: &str, mode: IndexMode) -> DocketResult<()> {
        let _guard = self.inner.write_lock.lock();
        self.inner.check_writable()?;
        self.inner
            .index_manager
            .ensure_index(path, mode, &self.inner.documents)
    }

    pub fn remove_index(&self, path: &str, mode: IndexMode) -> DocketResult<()> {
        let _guard = self.inner.write_lock.lock();
        self.inner.check_writable()?;
        self.inner.index_manager.remove_index(path, mode)
    }

    /// Copies the collection into an image. The caller must hold the guard
    /// returned by [`Collection::lock_writes`].
    pub(crate) fn to_image(&self) -> CollectionImage {
        CollectionImage {
            name: self.name(),
            next_id: self.next_id(),
            indexes: self
                .inner
                .index_manager
                .indexes()
                .iter()
                .map(|index| IndexImage {
                    ptr: index.descriptor().path().to_string(),
                    mode: index.descriptor().mode().bits(),
                })
                .collect(),
            documents: self
                .inner
                .documents
                .snapshot()
                .into_iter()
                .map(|(id, document)| DocumentEntry { id, document })
                .collect(),
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name())
            .field("size", &self.size())
            .field("next_id", &self.next_id())
            .finish()
    }
}

struct CollectionInner {
    name: RwLock<String>,
    next_id: AtomicU64,
    documents: DocumentMap,
    index_manager: IndexManager,
    write_lock: Mutex<()>,
    dropped: AtomicBool,
}

impl CollectionInner {
    fn new(name: &str) -> Self {
        CollectionInner {
            name: RwLock::new(name.to_string()),
            next_id: AtomicU64::new(crate::common::FIRST_DOCUMENT_ID),
            documents: DocumentMap::new(),
            index_manager: IndexManager::new(),
            write_lock: Mutex::new(()),
            dropped: AtomicBool::new(false),
        }
    }

    fn check_writable(&self) -> DocketResult<()> {
        if self.dropped.load(Ordering::SeqCst) {
            let name = self.name.read().clone();
            log::error!("Collection {} has been dropped", name);
            return Err(DocketError::new(
                &format!("Collection '{}' has been dropped", name),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    // must be called with write_lock held
    fn replace_locked(&self, id: DocumentId, old: Option<Document>, document: Document) -> DocketResult<()> {
        self.index_manager
            .write_entries(id, old.as_ref(), Some(&document))?;
        self.documents.put(id, document);
        // ids at or past the counter move it forward so put_new never collides
        self.next_id.fetch_max(id.value() + 1, Ordering::SeqCst);
        Ok(())
    }
}

/// Checks that `name` can be used as a collection name.
///
/// A valid name is non-empty, at most 255 bytes long and contains neither
/// `/` nor `|`.
pub(crate) fn validate_collection_name(name: &str) -> DocketResult<()> {
    let problem = if name.is_empty() {
        Some("must not be empty".to_string())
    } else if name.len() > MAX_COLLECTION_NAME_LEN {
        Some(format!("must be at most {} bytes", MAX_COLLECTION_NAME_LEN))
    } else if name.contains(RESERVED_NAME_CHARS) {
        Some(format!("must not contain any of {:?}", RESERVED_NAME_CHARS))
    } else {
        None
    };

    match problem {
        Some(problem) => {
            log::error!("Invalid collection name {:?}: {}", name, problem);
            Err(DocketError::new(
                &format!("Invalid collection name '{}': {}", name, problem),
                ErrorKind::InvalidArgument,
            ))
        }
        None => Ok(()),
    }
}
