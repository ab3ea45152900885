//! Collection catalog, store metadata, store images and online backup.

mod backup;
mod catalog;
mod image;
mod meta;

pub(crate) use backup::*;
pub(crate) use catalog::*;
pub(crate) use image::*;
pub use meta::*;
