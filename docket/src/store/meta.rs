use super::Catalog;
use crate::common::DOCKET_VERSION;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use crate::index::IndexMode;
use serde::{Deserialize, Serialize};

/// Read-only description of a store: its collections and their indexes.
///
/// Rebuilt from the live catalog on every request; changing the returned
/// value has no effect on the store.
///
/// Serialized form:
///
/// ```json
/// {"version": "0.1.0", "collections": [
///   {"name": "users", "rnum": 2, "indexes": [{"ptr": "/name", "mode": 5, "rnum": 2}]}
/// ]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub version: String,
    pub collections: Vec<CollectionMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    /// Number of documents.
    pub rnum: u64,
    pub indexes: Vec<IndexMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Indexed field path.
    pub ptr: String,
    /// Mode bits, see [`IndexMode::bits`].
    pub mode: u8,
    /// Number of (key, document) entries.
    pub rnum: u64,
}

impl StoreMeta {
    pub(crate) fn from_catalog(catalog: &Catalog) -> Self {
        let collections = catalog
            .collections()
            .iter()
            .map(|collection| CollectionMeta {
                name: collection.name(),
                rnum: collection.size(),
                indexes: collection
                    .index_manager()
                    .indexes()
                    .iter()
                    .map(|index| IndexMeta {
                        ptr: index.descriptor().path().to_string(),
                        mode: index.descriptor().mode().bits(),
                        rnum: index.entry_count(),
                    })
                    .collect(),
            })
            .collect();

        StoreMeta {
            version: DOCKET_VERSION.to_string(),
            collections,
        }
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionMeta> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.iter().map(|c| c.name.clone()).collect()
    }

    pub fn to_json(&self, pretty: bool) -> DocketResult<String> {
        let result = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        result.map_err(|err| {
            log::error!("Failed to serialize store metadata: {}", err);
            DocketError::new(
                &format!("Failed to serialize store metadata: {}", err),
                ErrorKind::EncodingError,
            )
        })
    }
}

impl CollectionMeta {
    pub fn index(&self, ptr: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.ptr == ptr)
    }
}

impl IndexMeta {
    pub fn index_mode(&self) -> DocketResult<IndexMode> {
        IndexMode::from_bits(self.mode)
    }
}
