//! Common types for the storefront order backend.
//!
//! This crate defines the core data types shared by the storefront
//! services. Keeping them in one place ensures every component agrees on
//! the wire and storage representation of orders, users and events.

/// API error types shared by the HTTP surface.
pub mod api;
/// Coupon definitions and redemption records.
pub mod coupon;
/// Event types for inter-service communication.
pub mod events;
/// Order entity, status axes, transition actions and records.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for gateway credentials.
pub mod secret_string;
/// Namespaces for persistent store keys.
pub mod store;
/// Template catalog types.
pub mod template;
/// User accounts and roles.
pub mod user;
/// Utility functions for common conversions.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use coupon::*;
pub use events::*;
pub use order::*;
pub use registry::*;
pub use secret_string::*;
pub use store::*;
pub use template::*;
pub use user::*;
pub use utils::{current_timestamp, to_minor_units, truncate_id};
pub use validation::*;
