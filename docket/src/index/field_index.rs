use super::{IndexDescriptor, IndexKey};
use crate::collection::{Document, DocumentId};
use crate::common::json::value_at;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

/// Which keys an index lookup visits.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IndexLookup {
    /// Exact match against any of the keys (`=` and `in`).
    Keys(Vec<IndexKey>),
    /// Every key inside the bounds (`>`, `>=`, `<`, `<=`).
    Range(Bound<IndexKey>, Bound<IndexKey>),
}

/// An ordered map from index key to the ascending set of document IDs
/// holding that key.
#[derive(Clone)]
pub(crate) struct FieldIndex {
    inner: Arc<FieldIndexInner>,
}

struct FieldIndexInner {
    descriptor: IndexDescriptor,
    entries: RwLock<BTreeMap<IndexKey, BTreeSet<DocumentId>>>,
}

impl FieldIndex {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        FieldIndex {
            inner: Arc::new(FieldIndexInner {
                descriptor,
                entries: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.inner.descriptor
    }

    /// Computes the distinct keys `document` contributes to this index.
    pub fn keys_of(&self, document: Option<&Document>) -> Vec<IndexKey> {
        let Some(document) = document else {
            return Vec::new();
        };
        let descriptor = &self.inner.descriptor;
        let Some(value) = value_at(document.as_value(), descriptor.tokens()) else {
            return Vec::new();
        };
        let mut keys = IndexKey::from_document_value(value, descriptor.value_type());
        keys.sort();
        keys.dedup();
        keys
    }

    /// Associates every key with `id`.
    ///
    /// On a unique index the insert is compare-and-insert: if any key already
    /// maps to a different document the index is left unchanged and
    /// `ConstraintViolation` is returned.
    pub fn insert(&self, id: DocumentId, keys: &[IndexKey]) -> DocketResult<()> {
        let mut entries = self.inner.entries.write();
        if self.inner.descriptor.is_unique() {
            for key in keys {
                let taken = entries
                    .get(key)
                    .is_some_and(|ids| ids.iter().any(|other| *other != id));
                if taken {
                    log::error!(
                        "Unique index {} already holds key {} for another document",
                        self.inner.descriptor,
                        key
                    );
                    return Err(DocketError::new(
                        &format!(
                            "Unique constraint violated on index {}: key {} already exists",
                            self.inner.descriptor, key
                        ),
                        ErrorKind::ConstraintViolation,
                    ));
                }
            }
        }
        for key in keys {
            entries.entry(key.clone()).or_default().insert(id);
        }
        Ok(())
    }

    /// Restores associations without the unique check. Only used to undo a
    /// failed write, so the keys are known to have been present before.
    pub fn restore(&self, id: DocumentId, keys: &[IndexKey]) {
        let mut entries = self.inner.entries.write();
        for key in keys {
            entries.entry(key.clone()).or_default().insert(id);
        }
    }

    pub fn remove(&self, id: DocumentId, keys: &[IndexKey]) {
        let mut entries = self.inner.entries.write();
        for key in keys {
            if let Some(ids) = entries.get_mut(key) {
                ids.remove(&id);
                if ids.is_empty() {
                    entries.remove(key);
                }
            }
        }
    }

    /// Collects the IDs matched by `lookup`, ascending and without duplicates.
    ///
    /// The shared lock is held only while collecting.
    pub fn find(&self, lookup: &IndexLookup) -> Vec<DocumentId> {
        let entries = self.inner.entries.read();
        let mut found = BTreeSet::new();
        match lookup {
            IndexLookup::Keys(keys) => {
                for key in keys {
                    if let Some(ids) = entries.get(key) {
                        found.extend(ids.iter().copied());
                    }
                }
            }
            IndexLookup::Range(lower, upper) => {
                if is_empty_range(lower, upper) {
                    return Vec::new();
                }
                for (_, ids) in entries.range((lower.clone(), upper.clone())) {
                    found.extend(ids.iter().copied());
                }
            }
        }
        found.into_iter().collect()
    }

    /// Number of (key, document) associations.
    pub fn entry_count(&self) -> u64 {
        self.inner
            .entries
            .read()
            .values()
            .map(|ids| ids.len() as u64)
            .sum()
    }
}

// BTreeMap::range panics on inverted or doubly-excluded equal bounds
fn is_empty_range(lower: &Bound<IndexKey>, upper: &Bound<IndexKey>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        _ => false,
    }
}
