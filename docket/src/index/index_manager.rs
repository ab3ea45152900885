use super::{FieldIndex, IndexDescriptor, IndexMode, IndexValueType};
use crate::collection::{Document, DocumentId, DocumentMap};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use dashmap::DashMap;
use std::sync::Arc;

type IndexSlot = (String, IndexValueType);

/// Owns the secondary indexes of one collection.
///
/// Indexes are registered by (field path, value type). Index writes are
/// all-or-nothing across every index of the collection: a unique collision
/// on any index rolls back the mutations already applied for that write.
///
/// Callers serialize writes through the owning collection's write lock; the
/// manager itself only guards each index's entries.
#[derive(Clone)]
pub(crate) struct IndexManager {
    inner: Arc<IndexManagerInner>,
}

impl IndexManager {
    pub fn new() -> Self {
        IndexManager {
            inner: Arc::new(IndexManagerInner {
                index_registry: DashMap::new(),
            }),
        }
    }

    /// Creates the index and builds it from `documents`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the path is not a JSON pointer starting with `/`;
    /// - `AlreadyExists` if the path is indexed for the same value type with
    ///   a different uniqueness flag;
    /// - `ConstraintViolation` if a unique index cannot be built because two
    ///   documents share a value. No index is left behind in that case.
    pub fn ensure_index(&self, path: &str, mode: IndexMode, documents: &DocumentMap) -> DocketResult<()> {
        let descriptor = IndexDescriptor::new(path, mode)?;
        let slot = slot_of(&descriptor);

        if let Some(existing) = self.inner.index_registry.get(&slot) {
            let existing_mode = existing.descriptor().mode();
            if existing_mode == mode {
                return Ok(());
            }
            log::error!(
                "Index on {} already exists as {}, cannot ensure {}",
                path,
                existing_mode,
                mode
            );
            return Err(DocketError::new(
                &format!(
                    "Index on '{}' already exists with mode {}",
                    path, existing_mode
                ),
                ErrorKind::AlreadyExists,
            ));
        }

        let index = FieldIndex::new(descriptor.clone());
        for (id, document) in documents.snapshot() {
            let keys = index.keys_of(Some(&document));
            if let Err(err) = index.insert(id, &keys) {
                log::error!("Failed to build index {}: {}", descriptor, err);
                return Err(DocketError::new_with_cause(
                    &format!("Cannot build index {} over existing documents", descriptor),
                    ErrorKind::ConstraintViolation,
                    err,
                ));
            }
        }

        log::debug!("Built index {} over {} documents", descriptor, documents.len());
        self.inner.index_registry.insert(slot, index);
        Ok(())
    }

    /// Drops the index on `path` for the value type of `mode`. Absent
    /// indexes are ignored.
    pub fn remove_index(&self, path: &str, mode: IndexMode) -> DocketResult<()> {
        let descriptor = IndexDescriptor::new(path, mode)?;
        if self.inner.index_registry.remove(&slot_of(&descriptor)).is_some() {
            log::debug!("Removed index {}", descriptor);
        }
        Ok(())
    }

    /// Every index, ordered by path then value type.
    pub fn indexes(&self) -> Vec<FieldIndex> {
        let mut indexes: Vec<FieldIndex> = self
            .inner
            .index_registry
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        indexes.sort_by(|a, b| a.descriptor().cmp(b.descriptor()));
        indexes
    }

    pub fn find_index(&self, path: &str, value_type: IndexValueType) -> Option<FieldIndex> {
        self.inner
            .index_registry
            .get(&(path.to_string(), value_type))
            .map(|entry| entry.value().clone())
    }

    pub fn has_indexes(&self) -> bool {
        !self.inner.index_registry.is_empty()
    }

    /// Reconciles every index for a document going from `old` to `new`.
    ///
    /// Either document may be `None` (insert or delete). On a unique
    /// collision all index changes made by this call are undone before the
    /// error is returned.
    pub fn write_entries(
        &self,
        id: DocumentId,
        old: Option<&Document>,
        new: Option<&Document>,
    ) -> DocketResult<()> {
        let mut applied = Vec::new();
        for index in self.indexes() {
            let old_keys = index.keys_of(old);
            let new_keys = index.keys_of(new);
            index.remove(id, &old_keys);
            if let Err(err) = index.insert(id, &new_keys) {
                index.restore(id, &old_keys);
                rollback(id, applied);
                return Err(err);
            }
            applied.push((index, old_keys, new_keys));
        }
        Ok(())
    }
}

fn rollback(id: DocumentId, applied: Vec<(FieldIndex, Vec<super::IndexKey>, Vec<super::IndexKey>)>) {
    for (index, old_keys, new_keys) in applied.into_iter().rev() {
        index.remove(id, &new_keys);
        index.restore(id, &old_keys);
    }
}

fn slot_of(descriptor: &IndexDescriptor) -> IndexSlot {
    (descriptor.path().to_string(), descriptor.value_type())
}

impl Default for IndexManager {
    fn default() -> Self {
        IndexManager::new()
    }
}

struct IndexManagerInner {
    index_registry: DashMap<IndexSlot, FieldIndex>,
}
