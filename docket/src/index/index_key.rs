use super::IndexValueType;
use crate::common::ExactNumber;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt::Display;

/// A document value coerced to an index's value type.
///
/// Numeric keys compare exactly across variants: `Integer(3)` and
/// `Float(3.0)` are the same key, and integers wider than an `f64` mantissa
/// keep their exact order.
#[derive(Debug, Clone)]
pub enum IndexKey {
    String(String),
    Integer(i128),
    Float(f64),
}

impl IndexKey {
    /// Coerces a document value to zero or more keys.
    ///
    /// Arrays contribute one key per coercible element. Values that cannot be
    /// coerced yield no key; indexing is best-effort per document.
    pub(crate) fn from_document_value(value: &Value, value_type: IndexValueType) -> Vec<IndexKey> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| IndexKey::coerce(item, value_type))
                .collect(),
            other => IndexKey::coerce(other, value_type).into_iter().collect(),
        }
    }

    /// Coerces a single scalar value.
    ///
    /// - string indexes accept strings;
    /// - integer indexes accept integers and floats without a fractional part;
    /// - float indexes accept every number; integers keep their exact value.
    pub(crate) fn coerce(value: &Value, value_type: IndexValueType) -> Option<IndexKey> {
        match (value_type, value) {
            (IndexValueType::String, Value::String(s)) => Some(IndexKey::String(s.clone())),
            (IndexValueType::Integer, Value::Number(n)) => integral(n).map(IndexKey::Integer),
            (IndexValueType::Float, Value::Number(n)) => match ExactNumber::from_number(n)? {
                ExactNumber::Integer(i) => Some(IndexKey::Integer(i)),
                ExactNumber::Float(f) => Some(IndexKey::float(f)),
            },
            _ => None,
        }
    }

    fn float(value: f64) -> IndexKey {
        // fold -0.0 onto 0.0 so both land on the same key
        IndexKey::Float(if value == 0.0 { 0.0 } else { value })
    }

    fn number(&self) -> Option<ExactNumber> {
        match self {
            IndexKey::String(_) => None,
            IndexKey::Integer(i) => Some(ExactNumber::Integer(*i)),
            IndexKey::Float(f) => Some(ExactNumber::Float(*f)),
        }
    }
}

fn integral(n: &Number) -> Option<i128> {
    match ExactNumber::from_number(n)? {
        ExactNumber::Integer(i) => Some(i),
        ExactNumber::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Some(f as i128)
        }
        ExactNumber::Float(_) => None,
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // strings sort before numbers
        match (self.number(), other.number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => match (self, other) {
                (IndexKey::String(a), IndexKey::String(b)) => a.cmp(b),
                _ => Ordering::Equal,
            },
        }
    }
}

impl Display for IndexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKey::String(s) => write!(f, "{:?}", s),
            IndexKey::Integer(i) => write!(f, "{}", i),
            IndexKey::Float(x) => write!(f, "{}", x),
        }
    }
}
