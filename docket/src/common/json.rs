//! JSON codec and JSON pointer helpers.
//!
//! Parsing and printing are delegated to `serde_json`; this module only fixes
//! the contract the rest of the crate relies on and maps codec failures onto
//! [`ErrorKind::InvalidArgument`].

use crate::collection::Document;
use crate::errors::{DocketError, DocketResult, ErrorKind};
use serde_json::Value;

/// Parses JSON text into a document.
///
/// # Errors
///
/// Returns `InvalidArgument` if `text` is not valid JSON.
pub fn parse(text: &str) -> DocketResult<Document> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(Document::from_value(value)),
        Err(err) => {
            log::error!("Failed to parse document JSON: {}", err);
            Err(DocketError::new(
                &format!("Malformed JSON at line {} column {}: {}", err.line(), err.column(), err),
                ErrorKind::InvalidArgument,
            ))
        }
    }
}

/// Parses JSON text into a raw value (used for patches and clause payloads).
pub fn parse_value(text: &str) -> DocketResult<Value> {
    parse(text).map(Document::into_value)
}

/// Serializes a document back to canonical JSON text, pretty or compact.
pub fn serialize(document: &Document, pretty: bool) -> DocketResult<String> {
    let result = if pretty {
        serde_json::to_string_pretty(document.as_value())
    } else {
        serde_json::to_string(document.as_value())
    };
    result.map_err(|err| {
        log::error!("Failed to serialize document: {}", err);
        DocketError::new(
            &format!("Failed to serialize document: {}", err),
            ErrorKind::EncodingError,
        )
    })
}

/// Splits a JSON pointer (RFC 6901) into its unescaped reference tokens.
///
/// The empty pointer `""` addresses the whole document and yields no tokens.
///
/// # Errors
///
/// Returns `InvalidArgument` if the pointer is non-empty and does not start
/// with `/`, or contains an invalid `~` escape.
pub fn split_pointer(pointer: &str) -> DocketResult<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer.strip_prefix('/').ok_or_else(|| {
        log::error!("Invalid JSON pointer {:?}", pointer);
        DocketError::new(
            &format!("Invalid JSON pointer '{}': must start with '/'", pointer),
            ErrorKind::InvalidArgument,
        )
    })?;

    rest.split('/').map(|token| unescape_token(token, pointer)).collect()
}

/// Joins reference tokens back into a JSON pointer, escaping `~` and `/`.
pub fn join_pointer<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut pointer = String::new();
    for token in tokens {
        pointer.push('/');
        pointer.push_str(&token.as_ref().replace('~', "~0").replace('/', "~1"));
    }
    pointer
}

fn unescape_token(token: &str, pointer: &str) -> DocketResult<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                log::error!("Invalid escape in JSON pointer {:?}", pointer);
                return Err(DocketError::new(
                    &format!("Invalid JSON pointer '{}': bad '~' escape", pointer),
                    ErrorKind::InvalidArgument,
                ));
            }
        }
    }
    Ok(out)
}

/// Resolves reference tokens against a value; array tokens must be indices.
pub fn value_at<'a, S: AsRef<str>>(value: &'a Value, tokens: &[S]) -> Option<&'a Value> {
    let mut current = value;
    for token in tokens {
        let token = token.as_ref();
        current = match current {
            Value::Object(map) => map.get(token)?,
            Value::Array(items) => items.get(parse_index(token)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable variant of [`value_at`].
pub fn value_at_mut<'a, S: AsRef<str>>(value: &'a mut Value, tokens: &[S]) -> Option<&'a mut Value> {
    let mut current = value;
    for token in tokens {
        let token = token.as_ref();
        current = match current {
            Value::Object(map) => map.get_mut(token)?,
            Value::Array(items) => items.get_mut(parse_index(token)?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn parse_index(token: &str) -> Option<usize> {
    // leading zeros are not valid array indices
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
