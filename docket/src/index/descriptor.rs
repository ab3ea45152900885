use super::{IndexMode, IndexValueType};
use crate::common::json::split_pointer;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use std::fmt::Display;
use std::sync::Arc;

/// Describes one secondary index of a collection.
///
/// A descriptor is the pair (field path, mode). The path is a JSON pointer
/// such as `/name` or `/address/city`; the mode carries the value type and the
/// uniqueness flag. Within a collection an index is identified by its path and
/// value type, so a path can be indexed once per value type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexDescriptor {
    inner: Arc<IndexDescriptorInner>,
}

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct IndexDescriptorInner {
    path: String,
    mode: IndexMode,
    tokens: Vec<String>,
}

impl IndexDescriptor {
    /// Creates a descriptor after validating the field path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `path` does not start with `/` or is not a
    /// well-formed JSON pointer.
    pub fn new(path: &str, mode: IndexMode) -> DocketResult<Self> {
        let tokens = validate_index_path(path)?;
        Ok(IndexDescriptor {
            inner: Arc::new(IndexDescriptorInner {
                path: path.to_string(),
                mode,
                tokens,
            }),
        })
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn mode(&self) -> IndexMode {
        self.inner.mode
    }

    pub fn value_type(&self) -> IndexValueType {
        self.inner.mode.value_type()
    }

    pub fn is_unique(&self) -> bool {
        self.inner.mode.is_unique()
    }

    /// Unescaped pointer tokens of the field path.
    pub(crate) fn tokens(&self) -> &[String] {
        &self.inner.tokens
    }
}

impl Display for IndexDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.inner.path, self.inner.mode)
    }
}

pub(crate) fn validate_index_path(path: &str) -> DocketResult<Vec<String>> {
    if !path.starts_with('/') {
        log::error!("Invalid index path {:?}", path);
        return Err(DocketError::new(
            &format!("Invalid index path '{}': must start with '/'", path),
            ErrorKind::InvalidArgument,
        ));
    }
    split_pointer(path)
}
