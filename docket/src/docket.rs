use crate::collection::{validate_collection_name, Collection, Document, DocumentId, PatchOperation};
use crate::common::json;
use crate::docket_builder::DocketBuilder;
use crate::docket_config::DocketConfig;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::index::IndexMode;
use crate::query::{
    execute_query, explain_query, ExecutionMode, ExecutionSummary, Query, QueryParams, QueryPlan, Visit,
};
use crate::store::{current_time_millis, BackupCoordinator, Catalog, StoreImage, StoreMeta};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static STORE_CLOSED_ERROR: Lazy<DocketError> =
    Lazy::new(|| DocketError::new("Docket store is already closed", ErrorKind::StoreAlreadyClosed));

/// An embedded JSON document store.
///
/// `Docket` is the entry point for every operation: collections, documents,
/// indexes, queries, metadata and backup. It uses the PIMPL pattern; clones
/// are cheap and share one store, so a `Docket` can be handed to as many
/// threads as needed.
///
/// The store is committed to its database path (if any) when the last clone
/// is dropped, or explicitly with [`commit`](Docket::commit) and
/// [`close`](Docket::close).
///
/// # Examples
///
/// ```rust
/// use docket::{doc, Docket};
/// use docket::index::IndexMode;
/// use docket::query::QueryParams;
///
/// let db = Docket::builder().open_or_create().unwrap();
/// db.ensure_index("users", "/name", IndexMode::string().unique()).unwrap();
/// db.put_new("users", doc!({"name": "A", "age": 30})).unwrap();
/// db.put_new("users", doc!({"name": "B", "age": 25})).unwrap();
///
/// let params = QueryParams::new().with("age", 29);
/// assert_eq!(db.count_matching("users", "/[age > :age]", &params).unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct Docket {
    inner: Arc<DocketInner>,
}

impl Docket {
    /// Creates a new [`DocketBuilder`].
    pub fn builder() -> DocketBuilder {
        DocketBuilder::new()
    }

    /// Opens a store for an initialized configuration, restoring the image
    /// at its database path when there is one.
    pub(crate) fn open(config: DocketConfig) -> DocketResult<Docket> {
        let catalog = Catalog::new();
        if let Some(path) = config.image_path() {
            if path.exists() && !config.truncate() {
                let image = StoreImage::read_from(&path)?;
                log::debug!(
                    "Restoring {} collections from {}",
                    image.collections.len(),
                    path.display()
                );
                catalog.restore(image.collections)?;
            }
        }
        Ok(Docket {
            inner: Arc::new(DocketInner {
                config,
                catalog,
                backup: BackupCoordinator::new(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Creates the collection if it does not exist.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an invalid collection name.
    pub fn ensure_collection(&self, name: &str) -> DocketResult<()> {
        self.inner.check_opened()?;
        self.inner.catalog.ensure(name).map(|_| ())
    }

    /// Removes a collection with all of its documents and indexes. Removing a
    /// missing collection is a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an invalid collection name.
    pub fn remove_collection(&self, name: &str) -> DocketResult<()> {
        self.inner.check_opened()?;
        validate_collection_name(name)?;
        if self.inner.catalog.remove(name) {
            log::debug!("Removed collection {}", name);
        }
        Ok(())
    }

    /// Renames a collection, keeping its documents, IDs and indexes.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `old_name` does not exist;
    /// - `AlreadyExists` if `new_name` is taken;
    /// - `InvalidArgument` if `new_name` is not a valid collection name.
    pub fn rename_collection(&self, old_name: &str, new_name: &str) -> DocketResult<()> {
        self.inner.check_opened()?;
        self.inner.catalog.rename(old_name, new_name)
    }

    /// Names of all collections, sorted.
    pub fn get_collections(&self) -> DocketResult<Vec<String>> {
        self.inner.check_opened()?;
        Ok(self.inner.catalog.names())
    }

    /// Stores `document` under the next ID of the collection, creating the
    /// collection if needed.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if a unique index rejects the document; nothing
    /// is written in that case.
    pub fn put_new(&self, collection: &str, document: Document) -> DocketResult<DocumentId> {
        self.inner
            .write(collection, |c| c.put_new(document.clone()))
    }

    /// Stores `document` at `id`, replacing any existing document.
    pub fn put(&self, collection: &str, document: Document, id: DocumentId) -> DocketResult<()> {
        self.inner
            .write(collection, |c| c.put(id, document.clone()))
    }

    /// Applies a JSON merge patch to the document at `id`, or stores the
    /// patch as the document if there is none.
    pub fn merge_or_put(&self, collection: &str, patch: &Value, id: DocumentId) -> DocketResult<()> {
        self.inner.write(collection, |c| c.merge_or_put(id, patch))
    }

    /// Applies patch operations to the document at `id`. The patch is
    /// applied entirely or not at all.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no document at `id`, `InvalidArgument` if an
    /// operation fails.
    pub fn patch(&self, collection: &str, ops: &[PatchOperation], id: DocumentId) -> DocketResult<()> {
        self.inner.write(collection, |c| c.patch(id, ops))
    }

    /// Deletes the document at `id`. Returns `false` if there was none.
    pub fn del(&self, collection: &str, id: DocumentId) -> DocketResult<bool> {
        self.inner.check_opened()?;
        validate_collection_name(collection)?;
        match self.inner.catalog.get(collection) {
            Some(c) => c.del(id),
            None => Ok(false),
        }
    }

    pub fn get(&self, collection: &str, id: DocumentId) -> DocketResult<Option<Document>> {
        self.inner.check_opened()?;
        validate_collection_name(collection)?;
        Ok(self
            .inner
            .catalog
            .get(collection)
            .and_then(|c| c.get(&id)))
    }

    pub fn put_new_json(&self, collection: &str, text: &str) -> DocketResult<DocumentId> {
        self.put_new(collection, json::parse(text)?)
    }

    pub fn put_json(&self, collection: &str, text: &str, id: DocumentId) -> DocketResult<()> {
        self.put(collection, json::parse(text)?, id)
    }

    pub fn merge_or_put_json(&self, collection: &str, text: &str, id: DocumentId) -> DocketResult<()> {
        self.merge_or_put(collection, &json::parse_value(text)?, id)
    }

    pub fn patch_json(&self, collection: &str, text: &str, id: DocumentId) -> DocketResult<()> {
        self.patch(collection, &PatchOperation::parse_all(text)?, id)
    }

    /// The document at `id` serialized as JSON text.
    pub fn get_json(&self, collection: &str, id: DocumentId, pretty: bool) -> DocketResult<Option<String>> {
        self.get(collection, id)?
            .map(|document| json::serialize(&document, pretty))
            .transpose()
    }

    /// Snapshot of collections and indexes.
    pub fn get_meta(&self) -> DocketResult<StoreMeta> {
        self.inner.check_opened()?;
        Ok(StoreMeta::from_catalog(&self.inner.catalog))
    }

    pub fn get_meta_json(&self, pretty: bool) -> DocketResult<String> {
        self.get_meta()?.to_json(pretty)
    }

    /// Creates an index over `path`, indexing the existing documents. An
    /// identical index is a no-op.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an invalid path;
    /// - `AlreadyExists` if the path already has an index of this value type
    ///   with a different uniqueness;
    /// - `ConstraintViolation` if a unique index finds duplicate values.
    pub fn ensure_index(&self, collection: &str, path: &str, mode: IndexMode) -> DocketResult<()> {
        self.inner.write(collection, |c| c.ensure_index(path, mode))
    }

    /// Removes the index of `mode`'s value type over `path`. Removing a
    /// missing index is a no-op.
    pub fn remove_index(&self, collection: &str, path: &str, mode: IndexMode) -> DocketResult<()> {
        self.inner.check_opened()?;
        validate_collection_name(collection)?;
        match self.inner.catalog.get(collection) {
            Some(c) => c.remove_index(path, mode),
            None => Ok(()),
        }
    }

    /// Compiles a query against `collection`. The collection does not need
    /// to exist.
    pub fn compile(&self, collection: &str, text: &str) -> DocketResult<Query> {
        self.inner.check_opened()?;
        Query::new(collection, text)
    }

    /// Executes a bound query, handing every match to `visitor`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a placeholder is unbound, `InvalidOperation` if
    /// the query was already executed, or any error of a modification clause.
    pub fn execute<F>(&self, query: &mut Query, mut visitor: F) -> DocketResult<ExecutionSummary>
    where
        F: FnMut(DocumentId, &Document) -> Visit,
    {
        self.inner.check_opened()?;
        execute_query(&self.inner.catalog, query, ExecutionMode::Stream, &mut visitor)
    }

    /// Number of documents [`execute`](Docket::execute) would visit.
    pub fn count(&self, query: &mut Query) -> DocketResult<u64> {
        self.inner.check_opened()?;
        execute_query(&self.inner.catalog, query, ExecutionMode::Count, &mut |_, _| Visit::Continue)
            .map(|summary| summary.visited())
    }

    /// Executes a query carrying `apply` or `del` and returns the number of
    /// modified documents.
    ///
    /// Each matched document is written atomically on its own. The first
    /// failing write stops the query, which ends `Failed`; documents modified
    /// before it keep their new contents.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the query has no modification clause, and
    /// the error of the first failing document write otherwise.
    pub fn update(&self, query: &mut Query) -> DocketResult<u64> {
        self.inner.check_opened()?;
        execute_query(&self.inner.catalog, query, ExecutionMode::Update, &mut |_, _| Visit::Continue)
            .map(|summary| summary.visited())
    }

    /// Compiles, binds and executes a query in one call.
    pub fn find<F>(
        &self,
        collection: &str,
        text: &str,
        params: &QueryParams,
        visitor: F,
    ) -> DocketResult<ExecutionSummary>
    where
        F: FnMut(DocumentId, &Document) -> Visit,
    {
        let mut query = self.compile(collection, text)?;
        query.bind_all(params)?;
        self.execute(&mut query, visitor)
    }

    /// Compiles, binds and counts a query in one call.
    pub fn count_matching(&self, collection: &str, text: &str, params: &QueryParams) -> DocketResult<u64> {
        let mut query = self.compile(collection, text)?;
        query.bind_all(params)?;
        self.count(&mut query)
    }

    /// The plan a bound query would run with right now.
    pub fn explain(&self, query: &Query) -> DocketResult<QueryPlan> {
        self.inner.check_opened()?;
        explain_query(&self.inner.catalog, query)
    }

    /// Writes a consistent image of the whole store to `target` and returns
    /// the snapshot time in milliseconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if another backup is running, `IOError` if the
    /// target cannot be written.
    pub fn online_backup(&self, target: impl AsRef<Path>) -> DocketResult<u64> {
        self.inner.check_opened()?;
        self.inner
            .backup
            .online_backup(&self.inner.catalog, target.as_ref())
    }

    /// Writes the store image to the database path. A store without a
    /// database path has nothing to commit.
    pub fn commit(&self) -> DocketResult<()> {
        self.inner.check_opened()?;
        self.inner.commit()
    }

    /// Commits and closes the store. Every later operation fails with
    /// `StoreAlreadyClosed`.
    pub fn close(&self) -> DocketResult<()> {
        self.inner.check_opened()?;
        self.inner.commit()?;
        self.inner.closed.store(true, Ordering::Release);
        log::debug!("Docket store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn config(&self) -> DocketConfig {
        self.inner.config.clone()
    }
}

struct DocketInner {
    config: DocketConfig,
    catalog: Catalog,
    backup: BackupCoordinator,
    closed: AtomicBool,
}

impl DocketInner {
    fn check_opened(&self) -> DocketResult<()> {
        if self.closed.load(Ordering::Acquire) {
            log::error!("Docket store is already closed");
            return Err(STORE_CLOSED_ERROR.clone());
        }
        Ok(())
    }

    // Runs a write against the collection, creating it if needed. A write
    // that lost a race with remove_collection is retried once on the new
    // collection.
    fn write<T>(&self, name: &str, op: impl Fn(&Collection) -> DocketResult<T>) -> DocketResult<T> {
        self.check_opened()?;
        let collection = self.catalog.ensure(name)?;
        match op(&collection) {
            Err(_) if collection.is_dropped() => {
                log::debug!("Collection {} was removed during a write, retrying", name);
                op(&self.catalog.ensure(name)?)
            }
            result => result,
        }
    }

    fn commit(&self) -> DocketResult<()> {
        let Some(path) = self.config.image_path() else {
            return Ok(());
        };
        let (timestamp, collections) = self.catalog.snapshot(current_time_millis);
        StoreImage::new(timestamp, collections).write_to(&path)?;
        log::debug!("Committed store image to {}", path.display());
        Ok(())
    }
}

// Commits when the last handle goes away; an explicitly closed store has
// already been committed.
impl Drop for DocketInner {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Err(err) = self.commit() {
            log::error!("Failed to commit store on drop: {}", err);
        }
    }
}
