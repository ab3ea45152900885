//! Secondary indexes over document fields.
//!
//! An index maps values found at a JSON pointer, coerced to the index's value
//! type, to the IDs of the documents holding them. Indexes are maintained on
//! every write and consulted by the query planner.

mod descriptor;
mod field_index;
mod index_key;
mod index_manager;
mod mode;

pub use descriptor::*;
pub(crate) use field_index::*;
pub use index_key::*;
pub(crate) use index_manager::*;
pub use mode::*;
