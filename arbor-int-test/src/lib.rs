//! Shared helpers for the integration test suites.

pub mod test_util;
