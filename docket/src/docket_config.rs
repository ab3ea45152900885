//! Configuration management for a Docket store.

use crate::errors::{DocketError, DocketResult, ErrorKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Store configuration, fixed once the store is opened.
///
/// Without a database path the store lives only in memory. With one, the
/// store image found at that path is restored on open (unless `truncate` is
/// set) and written back on [`commit`](crate::docket::Docket::commit).
#[derive(Clone)]
pub struct DocketConfig {
    inner: Arc<DocketConfigInner>,
}

impl Default for DocketConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DocketConfig {
    pub fn new() -> Self {
        DocketConfig {
            inner: Arc::new(DocketConfigInner {
                configured: AtomicBool::new(false),
                db_path: OnceLock::new(),
                truncate: AtomicBool::new(false),
            }),
        }
    }

    /// Sets the path of the store image (can only be set once).
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty path, `InvalidOperation` if the path
    /// was already set or the store is open.
    pub fn set_db_path(&self, db_path: &str) -> DocketResult<()> {
        self.inner.check_not_configured("Database path")?;
        if db_path.trim().is_empty() {
            log::error!("Database path cannot be empty");
            return Err(DocketError::new(
                "Database path cannot be empty",
                ErrorKind::InvalidArgument,
            ));
        }
        self.inner.db_path.set(db_path.to_string()).map_err(|_| {
            log::error!("Database path is already set");
            DocketError::new("Database path can only be set once", ErrorKind::InvalidOperation)
        })
    }

    pub fn db_path(&self) -> Option<String> {
        self.inner.db_path.get().cloned()
    }

    pub(crate) fn image_path(&self) -> Option<PathBuf> {
        self.inner.db_path.get().map(PathBuf::from)
    }

    /// Discards any existing image at the database path when the store opens.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the store is already open.
    pub fn set_truncate(&self, truncate: bool) -> DocketResult<()> {
        self.inner.check_not_configured("Truncate flag")?;
        self.inner.truncate.store(truncate, Ordering::Relaxed);
        Ok(())
    }

    pub fn truncate(&self) -> bool {
        self.inner.truncate.load(Ordering::Relaxed)
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Freezes the configuration. Called when the store opens.
    pub(crate) fn initialize(&self) {
        self.inner.configured.store(true, Ordering::Relaxed);
    }
}

struct DocketConfigInner {
    configured: AtomicBool,
    db_path: OnceLock<String>,
    truncate: AtomicBool,
}

impl DocketConfigInner {
    fn check_not_configured(&self, what: &str) -> DocketResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after the store is opened", what);
            return Err(DocketError::new(
                &format!("{} cannot be changed after the store is opened", what),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
