use crate::collection::{Document, DocumentId};
use crate::common::{DOCKET_VERSION, IMAGE_FORMAT_VERSION, IMAGE_TEMP_SUFFIX};
use crate::errors::{DocketError, DocketResult, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Serialized point-in-time copy of a whole store.
///
/// The same format is produced by online backup and by commit, and is read
/// back when a store is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoreImage {
    pub format_version: u32,
    pub docket_version: String,
    pub timestamp: u64,
    pub collections: Vec<CollectionImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CollectionImage {
    pub name: String,
    pub next_id: u64,
    pub indexes: Vec<IndexImage>,
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexImage {
    pub ptr: String,
    pub mode: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DocumentEntry {
    pub id: DocumentId,
    pub document: Document,
}

impl StoreImage {
    pub fn new(timestamp: u64, collections: Vec<CollectionImage>) -> Self {
        StoreImage {
            format_version: IMAGE_FORMAT_VERSION,
            docket_version: DOCKET_VERSION.to_string(),
            timestamp,
            collections,
        }
    }

    /// Writes the image to `target` through a temporary sibling file that is
    /// renamed into place once fully written.
    ///
    /// A failure never leaves a partial file at `target`.
    pub fn write_to(&self, target: &Path) -> DocketResult<()> {
        let temp = temp_path(target);
        let result = self.write_file(&temp).and_then(|_| {
            fs::rename(&temp, target).map_err(|err| io_error("rename image into", target, err))
        });
        if result.is_err() {
            // keep the write error, not the cleanup one
            let _ = fs::remove_file(&temp);
        }
        result
    }

    fn write_file(&self, path: &Path) -> DocketResult<()> {
        let file = File::create(path).map_err(|err| io_error("create", path, err))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|err| {
            log::error!("Failed to encode store image: {}", err);
            DocketError::new(
                &format!("Failed to encode store image: {}", err),
                ErrorKind::EncodingError,
            )
        })?;
        writer.flush().map_err(|err| io_error("write", path, err))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|err| io_error("sync", path, err))
    }

    /// Reads and validates an image file.
    ///
    /// # Errors
    ///
    /// `IOError` if the file cannot be read, `EncodingError` if it is not a
    /// store image or was written by an incompatible format version.
    pub fn read_from(source: &Path) -> DocketResult<StoreImage> {
        let file = File::open(source).map_err(|err| io_error("open", source, err))?;
        let image: StoreImage = serde_json::from_reader(BufReader::new(file)).map_err(|err| {
            log::error!("Failed to decode store image {}: {}", source.display(), err);
            DocketError::new(
                &format!("'{}' is not a valid store image: {}", source.display(), err),
                ErrorKind::EncodingError,
            )
        })?;
        if image.format_version != IMAGE_FORMAT_VERSION {
            log::error!(
                "Unsupported store image version {} in {}",
                image.format_version,
                source.display()
            );
            return Err(DocketError::new(
                &format!(
                    "Unsupported store image version {} (expected {})",
                    image.format_version, IMAGE_FORMAT_VERSION
                ),
                ErrorKind::EncodingError,
            ));
        }
        Ok(image)
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(IMAGE_TEMP_SUFFIX);
    target.with_file_name(name)
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> DocketError {
    log::error!("Failed to {} {}: {}", action, path.display(), err);
    DocketError::new_with_cause(
        &format!("Failed to {} '{}'", action, path.display()),
        ErrorKind::IOError,
        DocketError::from(err),
    )
}
