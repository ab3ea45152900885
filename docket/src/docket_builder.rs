use crate::docket::Docket;
use crate::docket_config::DocketConfig;
use crate::errors::{DocketError, DocketResult};

/// Builder for opening a [`Docket`] store.
///
/// Configuration errors are captured as they happen and reported by
/// [`open_or_create`](DocketBuilder::open_or_create); the first error wins.
///
/// # Examples
///
/// ```rust
/// use docket::Docket;
///
/// // in-memory store
/// let db = Docket::builder().open_or_create().unwrap();
/// assert!(!db.is_closed());
/// ```
#[derive(Default)]
pub struct DocketBuilder {
    error: Option<DocketError>,
    docket_config: DocketConfig,
}

impl DocketBuilder {
    pub fn new() -> Self {
        DocketBuilder {
            error: None,
            docket_config: DocketConfig::new(),
        }
    }

    /// Persists the store image at `db_path`. An existing image there is
    /// restored on open.
    pub fn db_path(mut self, db_path: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.docket_config.set_db_path(db_path) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Ignores any existing image at the database path.
    pub fn truncate(mut self, truncate: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.docket_config.set_truncate(truncate) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Opens the store.
    ///
    /// # Errors
    ///
    /// The first configuration error, or `IOError`/`EncodingError` if an
    /// existing image cannot be read.
    pub fn open_or_create(self) -> DocketResult<Docket> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.docket_config.initialize();
        Docket::open(self.docket_config)
    }
}
