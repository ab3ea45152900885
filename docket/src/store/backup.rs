use super::{Catalog, StoreImage};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Serializes online backups: at most one runs at a time.
#[derive(Clone)]
pub(crate) struct BackupCoordinator {
    inner: Arc<BackupCoordinatorInner>,
}

struct BackupCoordinatorInner {
    in_progress: AtomicBool,
}

/// Clears the in-progress flag when dropped, whatever the exit path.
pub(crate) struct BackupGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BackupGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl BackupCoordinator {
    pub fn new() -> Self {
        BackupCoordinator {
            inner: Arc::new(BackupCoordinatorInner {
                in_progress: AtomicBool::new(false),
            }),
        }
    }

    /// Claims the backup slot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if another backup holds the slot.
    pub fn begin(&self) -> DocketResult<BackupGuard<'_>> {
        if self
            .inner
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::error!("A backup is already in progress");
            return Err(DocketError::new(
                "A backup is already in progress",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(BackupGuard {
            flag: &self.inner.in_progress,
        })
    }

    /// Writes a consistent image of `catalog` to `target` and returns the
    /// snapshot time in milliseconds since the Unix epoch.
    ///
    /// Writers are blocked only while the collections are cloned; the image
    /// is serialized and written afterwards, without any lock. The source
    /// store is never modified.
    pub fn online_backup(&self, catalog: &Catalog, target: &Path) -> DocketResult<u64> {
        let _guard = self.begin()?;
        let (timestamp, collections) = catalog.snapshot(current_time_millis);
        let image = StoreImage::new(timestamp, collections);
        image.write_to(target)?;
        log::debug!(
            "Backup of {} collections written to {} at {}",
            image.collections.len(),
            target.display(),
            timestamp
        );
        Ok(timestamp)
    }
}

impl Default for BackupCoordinator {
    fn default() -> Self {
        BackupCoordinator::new()
    }
}

pub(crate) fn current_time_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
