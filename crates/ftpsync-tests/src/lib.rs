//! ftpsync integration testing support
//!
//! This crate holds the cross-crate scenarios in `tests/` and the fixtures
//! they share: a temporary local tree paired with an in-memory remote.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Fixtures and helpers shared by every integration test so each scenario
/// only states what it checks.
pub mod test_utils;
