//! Shared constants and the JSON codec.

mod constants;
pub mod json;
mod number;

pub use constants::*;
pub(crate) use number::ExactNumber;
