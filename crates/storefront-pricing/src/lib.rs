//! Pricing module for the storefront backend.
//!
//! This module provides interfaces and implementations for pricing orders.
//! A pricing implementation supplies the flat customization fee and the
//! coupon definitions; the service layered on top turns a base price and an
//! optional coupon into the final price breakdown. It follows the same
//! trait-based pattern as the other storefront components.

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::Arc;
use storefront_types::{ConfigSchema, CouponDef, ImplementationRegistry, PriceBreakdown};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod standard;
}

/// Errors that can occur during pricing operations.
#[derive(Debug, Error)]
pub enum PricingError {
	/// Internal error that occurs during pricing operations.
	#[error("Internal error: {0}")]
	Internal(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for pricing implementations.
///
/// This trait must be implemented by any pricing source that wants to
/// integrate with the storefront system. It provides the customization fee
/// and the coupon definitions used to build price breakdowns.
#[async_trait]
pub trait PricingInterface: Send + Sync {
	/// Returns the configuration schema for this pricing implementation.
	///
	/// This allows each implementation to define its own configuration requirements
	/// with specific validation rules. The schema is used to validate TOML configuration
	/// before initializing the pricing source.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Flat fee added on top of every order's base price.
	fn customization_fee(&self) -> Decimal;

	/// Looks up a coupon definition by code.
	///
	/// Codes are matched case-insensitively. Returns None when no coupon
	/// with this code exists.
	async fn find_coupon(&self, code: &str) -> Result<Option<CouponDef>, PricingError>;
}

/// Type alias for pricing factory functions.
///
/// This is the function signature that all pricing implementations must provide
/// to create instances of their pricing interface.
pub type PricingFactory = fn(&toml::Value) -> Result<Box<dyn PricingInterface>, PricingError>;

/// Registry trait for pricing implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// pricing implementations must provide a PricingFactory.
pub trait PricingRegistry: ImplementationRegistry<Factory = PricingFactory> {}

/// Get all registered pricing implementations.
///
/// Returns a vector of (name, factory) tuples for all available pricing implementations.
/// This is used by the factory registry to automatically register all implementations.
pub fn get_all_implementations() -> Vec<(&'static str, PricingFactory)> {
	use implementations::standard;

	vec![(standard::Registry::NAME, standard::Registry::factory())]
}

/// Service that manages pricing with multiple implementations.
///
/// The PricingService coordinates between different pricing implementations
/// and provides a unified interface for quoting orders.
pub struct PricingService {
	/// Map of implementation names to their interfaces.
	implementations: HashMap<String, Arc<dyn PricingInterface>>,
	/// The primary implementation to use for pricing.
	primary_implementation: String,
}

impl PricingService {
	/// Creates a new PricingService with the given implementations.
	///
	/// # Arguments
	///
	/// * `implementations` - Map of implementation names to their interfaces
	/// * `primary_implementation` - The name of the primary implementation to use
	pub fn new(
		implementations: HashMap<String, Arc<dyn PricingInterface>>,
		primary_implementation: String,
	) -> Result<Self, PricingError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(PricingError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	fn primary(&self) -> Result<&Arc<dyn PricingInterface>, PricingError> {
		self.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				PricingError::Internal(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})
	}

	/// Looks up a coupon definition using the primary implementation.
	pub async fn find_coupon(&self, code: &str) -> Result<Option<CouponDef>, PricingError> {
		self.primary()?.find_coupon(code).await
	}

	/// Builds the price breakdown for an order.
	///
	/// The discount applies to the base price only, never to the
	/// customization fee, and is rounded to two decimal places with
	/// midpoints going away from zero before the total is computed.
	pub fn quote(
		&self,
		base_price: Decimal,
		coupon: Option<&CouponDef>,
	) -> Result<PriceBreakdown, PricingError> {
		let customization_fee = self.primary()?.customization_fee();
		let discount = coupon
			.map(|coupon| {
				(base_price * coupon.discount)
					.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
			})
			.unwrap_or(Decimal::ZERO);

		Ok(PriceBreakdown {
			base_price,
			customization_fee,
			discount,
			total: base_price + customization_fee - discount,
			coupon_code: coupon.map(|coupon| coupon.code.to_uppercase()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::standard::{StandardPricing, StandardPricingConfig};

	fn service() -> PricingService {
		let pricing = StandardPricing::new(StandardPricingConfig::default());
		let mut implementations: HashMap<String, Arc<dyn PricingInterface>> = HashMap::new();
		implementations.insert("standard".to_string(), Arc::new(pricing));
		PricingService::new(implementations, "standard".to_string()).unwrap()
	}

	#[test]
	fn test_quote_without_coupon() {
		let service = service();
		let quote = service.quote(Decimal::from(5000), None).unwrap();

		assert_eq!(quote.base_price, Decimal::from(5000));
		assert_eq!(quote.customization_fee, Decimal::from(500));
		assert_eq!(quote.discount, Decimal::ZERO);
		assert_eq!(quote.total, Decimal::from(5500));
		assert_eq!(quote.coupon_code, None);
	}

	#[test]
	fn test_quote_discounts_base_only() {
		let service = service();
		let coupon = CouponDef {
			code: "welcome10".to_string(),
			discount: Decimal::new(10, 2),
			single_use: false,
		};

		let quote = service.quote(Decimal::from(5000), Some(&coupon)).unwrap();

		// 10% off the base, the fee is untouched
		assert_eq!(quote.discount, Decimal::from(500));
		assert_eq!(quote.total, Decimal::from(5000));
		assert_eq!(quote.coupon_code, Some("WELCOME10".to_string()));
	}

	#[test]
	fn test_quote_rounds_discount_to_paise() {
		let service = service();
		let coupon = CouponDef {
			code: "WELCOME10".to_string(),
			discount: Decimal::new(10, 2),
			single_use: false,
		};

		// 4999.99 * 0.10 = 499.999, rounds away from zero to 500.00
		let quote = service
			.quote(Decimal::new(499_999, 2), Some(&coupon))
			.unwrap();
		assert_eq!(quote.discount, Decimal::new(50_000, 2));
		assert_eq!(quote.total, Decimal::new(499_999, 2));
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let result = PricingService::new(HashMap::new(), "standard".to_string());
		assert!(matches!(result, Err(PricingError::Configuration(_))));
	}
}
