use crate::errors::{DocketError, DocketResult, ErrorKind};
use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::fmt::Display;

/// A value bound to a query placeholder.
///
/// Only scalars can be bound; converting `null`, arrays or objects fails with
/// `InvalidArgument`.
///
/// # Examples
///
/// ```rust
/// use docket::query::Param;
/// use serde_json::json;
///
/// assert_eq!(Param::from(29), Param::Integer(29));
/// assert_eq!(Param::try_from(json!("Paris")).unwrap(), Param::Text("Paris".into()));
/// assert!(Param::try_from(json!(null)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

impl Param {
    pub fn type_name(&self) -> &'static str {
        match self {
            Param::Integer(_) => "integer",
            Param::Float(_) => "float",
            Param::Text(_) => "text",
            Param::Boolean(_) => "boolean",
        }
    }

    /// Whether both params carry the same variant.
    pub fn same_type(&self, other: &Param) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Param::Integer(i) => Value::from(*i),
            Param::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Param::Text(s) => Value::String(s.clone()),
            Param::Boolean(b) => Value::Bool(*b),
        }
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::Integer(i) => write!(f, "{}", i),
            Param::Float(x) => write!(f, "{}", x),
            Param::Text(s) => write!(f, "{:?}", s),
            Param::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Integer(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Integer(value as i64)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Param::Integer(value as i64)
    }
}

impl From<i16> for Param {
    fn from(value: i16) -> Self {
        Param::Integer(value as i64)
    }
}

impl From<u16> for Param {
    fn from(value: u16) -> Self {
        Param::Integer(value as i64)
    }
}

impl From<i8> for Param {
    fn from(value: i8) -> Self {
        Param::Integer(value as i64)
    }
}

impl From<u8> for Param {
    fn from(value: u8) -> Self {
        Param::Integer(value as i64)
    }
}

/// Integer parameters are 64-bit signed; larger values are rejected rather
/// than rounded.
impl TryFrom<u64> for Param {
    type Error = DocketError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value).map(Param::Integer).map_err(|_| out_of_range(value))
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<f32> for Param {
    fn from(value: f32) -> Self {
        Param::Float(value as f64)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Boolean(value)
    }
}

impl TryFrom<&Value> for Param {
    type Error = DocketError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(Param::Boolean(*b)),
            Value::String(s) => Ok(Param::Text(s.clone())),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Ok(Param::Integer(i)),
                (None, Some(u)) => Err(out_of_range(u)),
                (None, None) => n.as_f64().map(Param::Float).ok_or_else(|| {
                    log::error!("Number {} cannot be bound as a parameter", n);
                    DocketError::new(
                        &format!("Number {} cannot be bound as a parameter", n),
                        ErrorKind::InvalidArgument,
                    )
                }),
            },
            other => {
                log::error!("Cannot bind JSON value {} as a query parameter", other);
                Err(DocketError::new(
                    &format!(
                        "Only scalar values can be bound as query parameters, found {}",
                        other
                    ),
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }
}

impl TryFrom<Value> for Param {
    type Error = DocketError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Param::try_from(&value)
    }
}

fn out_of_range(value: u64) -> DocketError {
    log::error!("Integer {} exceeds the range of a query parameter", value);
    DocketError::new(
        &format!("Integer {} exceeds the range of a query parameter", value),
        ErrorKind::InvalidArgument,
    )
}

/// Named parameter bindings, kept in binding order.
///
/// Positional placeholders (`:?`) are addressed by their index as a name:
/// `"0"`, `"1"`, ...
///
/// # Examples
///
/// ```rust
/// use docket::query::QueryParams;
///
/// let params = QueryParams::new().with("age", 29).with("city", "Paris");
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    values: IndexMap<String, Param>,
}

impl QueryParams {
    pub fn new() -> Self {
        QueryParams::default()
    }

    /// Builder-style binding. A later value for the same name replaces the
    /// earlier one.
    pub fn with(mut self, name: &str, value: impl Into<Param>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Builder-style positional binding.
    pub fn with_positional(self, index: usize, value: impl Into<Param>) -> Self {
        self.with(&index.to_string(), value)
    }

    /// Binds `name`, rejecting a rebinding with a value of another type.
    pub fn bind(&mut self, name: &str, value: Param) -> DocketResult<()> {
        if let Some(existing) = self.values.get(name) {
            if !existing.same_type(&value) {
                log::error!(
                    "Placeholder :{} is bound to {} and cannot be rebound to {}",
                    name,
                    existing.type_name(),
                    value.type_name()
                );
                return Err(DocketError::new(
                    &format!(
                        "Placeholder ':{}' is already bound to a {} value, cannot rebind to {}",
                        name,
                        existing.type_name(),
                        value.type_name()
                    ),
                    ErrorKind::InvalidArgument,
                ));
            }
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Param)> {
        self.values.iter()
    }
}

impl TryFrom<&Value> for QueryParams {
    type Error = DocketError;

    /// Builds bindings from a JSON object of scalars.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            log::error!("Query parameters must be a JSON object, found {}", value);
            return Err(DocketError::new(
                "Query parameters must be a JSON object",
                ErrorKind::InvalidArgument,
            ));
        };
        let mut params = QueryParams::new();
        for (name, value) in map {
            params.bind(name, Param::try_from(value)?)?;
        }
        Ok(params)
    }
}
