// store constants
pub const IMAGE_FORMAT_VERSION: u32 = 1;
pub const IMAGE_TEMP_SUFFIX: &str = ".tmp";
pub const DOCKET_VERSION: &str = env!("CARGO_PKG_VERSION");

// collection constants
pub const MAX_COLLECTION_NAME_LEN: usize = 255;
pub const PATH_SEPARATOR: char = '/';
pub const INTERNAL_NAME_SEPARATOR: char = '|';
pub const RESERVED_NAME_CHARS: [char; 2] = [PATH_SEPARATOR, INTERNAL_NAME_SEPARATOR];

// document constants
pub const FIRST_DOCUMENT_ID: u64 = 1;
pub const MAX_DOCUMENT_ID: u64 = i64::MAX as u64;

// index mode bits
pub const INDEX_MODE_UNIQUE: u8 = 0x01;
pub const INDEX_MODE_STRING: u8 = 0x04;
pub const INDEX_MODE_INTEGER: u8 = 0x08;
pub const INDEX_MODE_FLOAT: u8 = 0x10;
pub const INDEX_MODE_TYPE_MASK: u8 = INDEX_MODE_STRING | INDEX_MODE_INTEGER | INDEX_MODE_FLOAT;
