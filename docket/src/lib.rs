//! # Docket - Embedded JSON Document Store
//!
//! Docket keeps named collections of JSON documents in memory, maintains
//! secondary indexes over document fields, and answers queries written in a
//! small path-based query language.
//!
//! ## Key Features
//!
//! - **Embedded**: a library, no server process
//! - **Collections**: documents addressed by monotonically assigned 64-bit IDs
//! - **Indexes**: string, integer and float indexes, optionally unique
//! - **Queries**: parameterized node-path filters with skip, limit, ordering,
//!   projection and in-place modification
//! - **Backup**: consistent online backup and image-based persistence
//! - **Clean API**: PIMPL handles that are cheap to clone and share across threads
//!
//! ## Quick Start
//!
//! ```rust
//! use docket::{doc, Docket};
//! use docket::index::IndexMode;
//! use docket::query::Visit;
//!
//! # fn main() -> Result<(), docket::errors::DocketError> {
//! let db = Docket::builder().open_or_create()?;
//!
//! db.ensure_index("users", "/name", IndexMode::string().unique())?;
//! db.put_new("users", doc!({"name": "Alice", "age": 30}))?;
//! db.put_new("users", doc!({"name": "Bob", "age": 25}))?;
//!
//! let mut query = db.compile("users", "/[age > :age] | /name")?;
//! query.bind("age", 26)?;
//! db.execute(&mut query, |id, document| {
//!     println!("{} => {}", id, document);
//!     Visit::Continue
//! })?;
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents, document IDs and patches
//! - [`common`] - Constants and the JSON codec
//! - [`errors`] - Error types and result definitions
//! - [`index`] - Index modes, keys and descriptors
//! - [`query`] - Query compilation, parameters, plans and execution
//! - [`store`] - Store metadata
//! - [`docket`] - The store facade
//! - [`docket_builder`] - Builder for opening a store
//! - [`docket_config`] - Store configuration

pub mod collection;
pub mod common;
pub mod docket;
pub mod docket_builder;
pub mod docket_config;
pub mod errors;
pub mod index;
pub mod query;
pub mod store;

pub use crate::docket::Docket;
pub use crate::docket_builder::DocketBuilder;
pub use crate::docket_config::DocketConfig;

#[doc(hidden)]
pub use serde_json as __serde_json;
