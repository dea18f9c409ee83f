//! Template catalog types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A website template offered in the catalog.
///
/// The catalog is configuration-driven; orders reference entries by id and
/// copy the display name and price at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
	/// Stable identifier referenced by orders.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Catalog category, e.g. "E-commerce".
	pub category: String,
	/// Short description shown in listings.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Base price in major units of the configured currency.
	pub price: Decimal,
}
