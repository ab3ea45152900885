use super::CollectionImage;
use crate::collection::{validate_collection_name, Collection};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of every collection in a store, keyed by name.
///
/// The catalog lock is held only for lookups and catalog mutations, never
/// while documents are read or written.
#[derive(Clone)]
pub(crate) struct Catalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    collections: RwLock<HashMap<String, Collection>>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            inner: Arc::new(CatalogInner {
                collections: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<Collection> {
        self.inner.collections.read().get(name).cloned()
    }

    /// Returns the named collection, creating it if absent.
    pub fn ensure(&self, name: &str) -> DocketResult<Collection> {
        validate_collection_name(name)?;
        if let Some(collection) = self.get(name) {
            return Ok(collection);
        }
        let mut collections = self.inner.collections.write();
        if let Some(collection) = collections.get(name) {
            return Ok(collection.clone());
        }
        let collection = Collection::new(name)?;
        collections.insert(name.to_string(), collection.clone());
        log::debug!("Created collection {}", name);
        Ok(collection)
    }

    /// Removes the named collection with its documents and indexes.
    /// Returns `false` if there was no such collection.
    pub fn remove(&self, name: &str) -> bool {
        let mut collections = self.inner.collections.write();
        match collections.remove(name) {
            Some(collection) => {
                collection.drop_collection();
                true
            }
            None => false,
        }
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> DocketResult<()> {
        validate_collection_name(new_name)?;
        let mut collections = self.inner.collections.write();
        if !collections.contains_key(old_name) {
            log::error!("Cannot rename missing collection {}", old_name);
            return Err(DocketError::new(
                &format!("Collection '{}' not found", old_name),
                ErrorKind::NotFound,
            ));
        }
        if collections.contains_key(new_name) {
            log::error!("Cannot rename {} to existing collection {}", old_name, new_name);
            return Err(DocketError::new(
                &format!("Collection '{}' already exists", new_name),
                ErrorKind::AlreadyExists,
            ));
        }
        if let Some(collection) = collections.remove(old_name) {
            collection.set_name(new_name);
            collections.insert(new_name.to_string(), collection);
        }
        log::debug!("Renamed collection {} to {}", old_name, new_name);
        Ok(())
    }

    /// Collection names in ascending order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Collections ordered by name.
    pub fn collections(&self) -> Vec<Collection> {
        let collections = self.inner.collections.read();
        let mut entries: Vec<(&String, &Collection)> = collections.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, c)| c.clone()).collect()
    }

    /// Copies every collection at a single point in time.
    ///
    /// All collection write locks are held together while cloning, so the
    /// images reflect one consistent state. `stamp` runs inside that window
    /// and its result is returned alongside the images.
    pub fn snapshot<T>(&self, stamp: impl FnOnce() -> T) -> (T, Vec<CollectionImage>) {
        let collections = self.inner.collections.read();
        let mut ordered: Vec<&Collection> = collections.values().collect();
        ordered.sort_by_key(|c| c.name());

        let guards: Vec<_> = ordered.iter().map(|c| c.lock_writes()).collect();
        let stamped = stamp();
        let images = ordered.iter().map(|c| c.to_image()).collect();
        drop(guards);
        (stamped, images)
    }

    /// Replaces the whole catalog with collections rebuilt from images.
    pub fn restore(&self, images: Vec<CollectionImage>) -> DocketResult<()> {
        let mut restored = HashMap::with_capacity(images.len());
        for image in images {
            let collection = Collection::from_image(image)?;
            restored.insert(collection.name(), collection);
        }
        let mut collections = self.inner.collections.write();
        for (_, old) in collections.drain() {
            old.drop_collection();
        }
        *collections = restored;
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new()
    }
}
