//! Shared fixtures for the Docket integration tests.

pub mod test_util;
