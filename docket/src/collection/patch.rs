use crate::collection::Document;
use crate::common::json::{self, parse_index, split_pointer, value_at, value_at_mut};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single structural patch operation (RFC 6902).
///
/// # Examples
///
/// ```rust
/// use docket::collection::PatchOperation;
///
/// let ops = PatchOperation::parse_all(r#"[{"op": "replace", "path": "/age", "value": 31}]"#).unwrap();
/// assert_eq!(ops.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOperation {
    /// Parses a JSON array of patch operations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed JSON or unknown operations.
    pub fn parse_all(text: &str) -> DocketResult<Vec<PatchOperation>> {
        let value = json::parse_value(text)?;
        PatchOperation::from_value(value)
    }

    /// Converts a JSON array value into patch operations.
    pub fn from_value(value: Value) -> DocketResult<Vec<PatchOperation>> {
        serde_json::from_value(value).map_err(|err| {
            log::error!("Invalid patch operations: {}", err);
            DocketError::new(
                &format!("Invalid patch operations: {}", err),
                ErrorKind::InvalidArgument,
            )
        })
    }
}

/// Applies patch operations to a copy of `document`.
///
/// The patch is atomic: if any operation fails the input is left untouched
/// and the error is returned.
pub(crate) fn apply_patch(document: &Document, ops: &[PatchOperation]) -> DocketResult<Document> {
    let mut patched = document.clone();
    for op in ops {
        apply_operation(patched.as_value_mut(), op)?;
    }
    Ok(patched)
}

fn apply_operation(target: &mut Value, op: &PatchOperation) -> DocketResult<()> {
    match op {
        PatchOperation::Add { path, value } => add(target, path, value.clone()),
        PatchOperation::Remove { path } => remove(target, path).map(|_| ()),
        PatchOperation::Replace { path, value } => {
            let slot = locate_mut(target, path)?;
            *slot = value.clone();
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            if path.starts_with(&format!("{}/", from)) {
                return Err(patch_error(&format!(
                    "Cannot move '{}' into its own child '{}'",
                    from, path
                )));
            }
            let value = remove(target, from)?;
            add(target, path, value)
        }
        PatchOperation::Copy { from, path } => {
            let value = locate(target, from)?.clone();
            add(target, path, value)
        }
        PatchOperation::Test { path, value } => {
            let actual = locate(target, path)?;
            if actual != value {
                return Err(patch_error(&format!("Test failed at '{}'", path)));
            }
            Ok(())
        }
    }
}

fn add(target: &mut Value, path: &str, value: Value) -> DocketResult<()> {
    let mut tokens = split_pointer(path)?;
    let Some(last) = tokens.pop() else {
        *target = value;
        return Ok(());
    };
    let parent = value_at_mut(target, &tokens)
        .ok_or_else(|| patch_error(&format!("Parent of '{}' does not exist", path)))?;
    match parent {
        Value::Object(map) => {
            map.insert(last, value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            match parse_index(&last) {
                Some(index) if index <= items.len() => {
                    items.insert(index, value);
                    Ok(())
                }
                _ => Err(patch_error(&format!("Invalid array index in '{}'", path))),
            }
        }
        _ => Err(patch_error(&format!("Parent of '{}' is not a container", path))),
    }
}

fn remove(target: &mut Value, path: &str) -> DocketResult<Value> {
    let mut tokens = split_pointer(path)?;
    let Some(last) = tokens.pop() else {
        return Err(patch_error("Cannot remove the document root"));
    };
    let parent = value_at_mut(target, &tokens)
        .ok_or_else(|| patch_error(&format!("Parent of '{}' does not exist", path)))?;
    let removed = match parent {
        Value::Object(map) => map.shift_remove(&last),
        Value::Array(items) => match parse_index(&last) {
            Some(index) if index < items.len() => Some(items.remove(index)),
            _ => None,
        },
        _ => None,
    };
    removed.ok_or_else(|| patch_error(&format!("Nothing to remove at '{}'", path)))
}

fn locate<'a>(target: &'a Value, path: &str) -> DocketResult<&'a Value> {
    let tokens = split_pointer(path)?;
    value_at(target, &tokens).ok_or_else(|| patch_error(&format!("Path '{}' does not exist", path)))
}

fn locate_mut<'a>(target: &'a mut Value, path: &str) -> DocketResult<&'a mut Value> {
    let tokens = split_pointer(path)?;
    value_at_mut(target, &tokens)
        .ok_or_else(|| patch_error(&format!("Path '{}' does not exist", path)))
}

fn patch_error(message: &str) -> DocketError {
    log::error!("Patch failed: {}", message);
    DocketError::new(message, ErrorKind::InvalidArgument)
}
