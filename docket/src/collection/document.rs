use crate::common::json;
use crate::common::{FIRST_DOCUMENT_ID, MAX_DOCUMENT_ID};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Debug, Display};

/// Creates a [`Document`] from a JSON literal.
///
/// # Examples
///
/// ```rust
/// use docket::doc;
///
/// let document = doc!({"name": "John", "age": 30});
/// assert_eq!(document.get("/age").and_then(|v| v.as_i64()), Some(30));
/// ```
#[macro_export]
macro_rules! doc {
    ($($json:tt)+) => {
        $crate::collection::Document::from_value($crate::__serde_json::json!($($json)+))
    };
}

/// Identity of a document inside its collection.
///
/// IDs are positive 64-bit integers, assigned from `1` upwards by
/// [`crate::Docket::put_new`] and never reused. The upper bound is `i64::MAX`
/// so every ID fits a signed 64-bit integer.
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId {
    id_value: u64,
}

impl DocumentId {
    /// Creates a `DocumentId` from a raw value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `id_value` is `0` or larger than `i64::MAX`.
    pub fn new(id_value: u64) -> DocketResult<DocumentId> {
        if !(FIRST_DOCUMENT_ID..=MAX_DOCUMENT_ID).contains(&id_value) {
            log::error!("Document id {} is out of range", id_value);
            return Err(DocketError::new(
                &format!(
                    "Document id {} is out of range [{}, {}]",
                    id_value, FIRST_DOCUMENT_ID, MAX_DOCUMENT_ID
                ),
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(DocumentId { id_value })
    }

    pub(crate) fn new_unchecked(id_value: u64) -> DocumentId {
        DocumentId { id_value }
    }

    /// Gets the numeric value of this ID.
    pub fn value(&self) -> u64 {
        self.id_value
    }
}

impl Debug for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.id_value)
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_value)
    }
}

impl TryFrom<u64> for DocumentId {
    type Error = DocketError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        DocumentId::new(value)
    }
}

impl TryFrom<i64> for DocumentId {
    type Error = DocketError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            log::error!("Document id {} is negative", value);
            return Err(DocketError::new(
                &format!("Document id {} must be positive", value),
                ErrorKind::InvalidArgument,
            ));
        }
        DocumentId::new(value as u64)
    }
}

/// A schemaless JSON document.
///
/// A `Document` wraps a `serde_json::Value`. Stored documents are never
/// mutated in place; every write replaces the stored value as a whole, so a
/// reader that obtained a document keeps a stable copy.
///
/// Fields are addressed with JSON pointers (`/address/city`).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    value: Value,
}

impl Document {
    /// Creates an empty JSON object document.
    pub fn new() -> Self {
        Document {
            value: Value::Object(Map::new()),
        }
    }

    pub fn from_value(value: Value) -> Self {
        Document { value }
    }

    /// Parses a document from JSON text.
    pub fn parse(text: &str) -> DocketResult<Self> {
        json::parse(text)
    }

    /// Serializes the document to JSON text.
    pub fn to_json(&self, pretty: bool) -> DocketResult<String> {
        json::serialize(self, pretty)
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn as_value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Looks up the value at a JSON pointer.
    ///
    /// Returns `None` if the pointer is malformed or addresses nothing.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        json::split_pointer(pointer)
            .ok()
            .and_then(|tokens| json::value_at(&self.value, &tokens))
    }

    /// Applies an RFC 7396 JSON merge patch to this document.
    ///
    /// Object members of the patch are merged recursively, `null` members
    /// remove the target member, and any non-object patch replaces the whole
    /// document.
    pub fn merge(&mut self, patch: &Value) {
        merge_value(&mut self.value, patch);
    }
}

fn merge_value(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, patch_value) in patch_map {
            if patch_value.is_null() {
                target_map.shift_remove(key);
            } else {
                let entry = target_map.entry(key.clone()).or_insert(Value::Null);
                merge_value(entry, patch_value);
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Document::from_value(value)
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
