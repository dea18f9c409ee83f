//! Utility functions for common conversions and formatting.

pub mod conversion;
pub mod formatting;
pub mod helpers;

pub use conversion::to_minor_units;
pub use formatting::truncate_id;
pub use helpers::current_timestamp;
