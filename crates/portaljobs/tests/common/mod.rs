//! Shared test utilities for portaljobs integration tests.
//!
//! `TestHarness` builds an isolated project root whose automation scripts
//! are shell scripts run through `sh` in place of the Python interpreter.

pub mod harness;

pub use harness::TestHarness;
