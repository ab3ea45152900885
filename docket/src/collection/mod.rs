//! Documents, document IDs and collections.

#[allow(clippy::module_inception)]
mod collection;
mod document;
mod document_map;
mod patch;

pub(crate) use collection::*;
pub use document::*;
pub use document_map::*;
pub use patch::PatchOperation;
pub(crate) use patch::apply_patch;
