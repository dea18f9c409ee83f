//! Builders for constructing configuration objects in tests.
//!
//! Only compiled when the `testing` feature is enabled.

pub mod config;

pub use config::ConfigBuilder;
