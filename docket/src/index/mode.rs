use crate::common::{
    INDEX_MODE_FLOAT, INDEX_MODE_INTEGER, INDEX_MODE_STRING, INDEX_MODE_TYPE_MASK, INDEX_MODE_UNIQUE,
};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The value type an index coerces document values to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexValueType {
    String,
    Integer,
    Float,
}

impl IndexValueType {
    fn bits(&self) -> u8 {
        match self {
            IndexValueType::String => INDEX_MODE_STRING,
            IndexValueType::Integer => INDEX_MODE_INTEGER,
            IndexValueType::Float => INDEX_MODE_FLOAT,
        }
    }
}

impl Display for IndexValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValueType::String => write!(f, "string"),
            IndexValueType::Integer => write!(f, "integer"),
            IndexValueType::Float => write!(f, "float"),
        }
    }
}

/// Value type plus uniqueness flag of an index.
///
/// The bit encoding is `UNIQUE = 0x01`, `STRING = 0x04`, `INTEGER = 0x08`,
/// `FLOAT = 0x10`; a valid mode carries exactly one value-type bit.
///
/// # Examples
///
/// ```rust
/// use docket::index::{IndexMode, IndexValueType};
///
/// let mode = IndexMode::string().unique();
/// assert_eq!(mode.bits(), 0x05);
/// assert_eq!(IndexMode::from_bits(0x05).unwrap(), mode);
/// assert_eq!(mode.value_type(), IndexValueType::String);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexMode {
    value_type: IndexValueType,
    unique: bool,
}

impl IndexMode {
    pub fn new(value_type: IndexValueType, unique: bool) -> Self {
        IndexMode { value_type, unique }
    }

    pub fn string() -> Self {
        IndexMode::new(IndexValueType::String, false)
    }

    pub fn integer() -> Self {
        IndexMode::new(IndexValueType::Integer, false)
    }

    pub fn float() -> Self {
        IndexMode::new(IndexValueType::Float, false)
    }

    /// Returns the same mode with the uniqueness flag set.
    pub fn unique(self) -> Self {
        IndexMode {
            unique: true,
            ..self
        }
    }

    /// Decodes a mode from its bit representation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless exactly one value-type bit is set and
    /// no unknown bits are present.
    pub fn from_bits(bits: u8) -> DocketResult<Self> {
        let unknown = bits & !(INDEX_MODE_TYPE_MASK | INDEX_MODE_UNIQUE);
        let value_type = match bits & INDEX_MODE_TYPE_MASK {
            INDEX_MODE_STRING => Some(IndexValueType::String),
            INDEX_MODE_INTEGER => Some(IndexValueType::Integer),
            INDEX_MODE_FLOAT => Some(IndexValueType::Float),
            _ => None,
        };
        match value_type {
            Some(value_type) if unknown == 0 => Ok(IndexMode {
                value_type,
                unique: bits & INDEX_MODE_UNIQUE != 0,
            }),
            _ => {
                log::error!("Invalid index mode bits {:#04x}", bits);
                Err(DocketError::new(
                    &format!("Invalid index mode {:#04x}: exactly one value type is required", bits),
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }

    pub fn bits(&self) -> u8 {
        let unique = if self.unique { INDEX_MODE_UNIQUE } else { 0 };
        self.value_type.bits() | unique
    }

    pub fn value_type(&self) -> IndexValueType {
        self.value_type
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

impl Display for IndexMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.unique {
            write!(f, "unique {}", self.value_type)
        } else {
            write!(f, "{}", self.value_type)
        }
    }
}
