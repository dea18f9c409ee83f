//! Standard pricing implementation backed by static configuration.
//!
//! Fee and coupon definitions come straight from the TOML configuration,
//! with defaults matching the storefront's launch pricing. Coupons are
//! indexed by uppercased code so lookups ignore case.

use crate::{PricingError, PricingFactory, PricingInterface, PricingRegistry};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use storefront_types::{ConfigSchema, CouponDef, ImplementationRegistry, ValidationError};

/// Configuration for the standard pricing implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardPricingConfig {
	/// Flat fee added to every order.
	#[serde(default = "default_customization_fee")]
	pub customization_fee: Decimal,
	/// Coupon definitions customers can redeem.
	#[serde(default = "default_coupons")]
	pub coupons: Vec<CouponDef>,
}

fn default_customization_fee() -> Decimal {
	Decimal::from(500)
}

fn default_coupons() -> Vec<CouponDef> {
	vec![
		CouponDef {
			code: "AS392212".to_string(),
			discount: Decimal::new(70, 2),
			single_use: true,
		},
		CouponDef {
			code: "WELCOME10".to_string(),
			discount: Decimal::new(10, 2),
			single_use: false,
		},
	]
}

impl Default for StandardPricingConfig {
	fn default() -> Self {
		Self {
			customization_fee: default_customization_fee(),
			coupons: default_coupons(),
		}
	}
}

impl ConfigSchema for StandardPricingConfig {
	fn validate(&self, _config: &toml::value::Value) -> Result<(), ValidationError> {
		if self.customization_fee.is_sign_negative() {
			return Err(ValidationError::InvalidValue {
				field: "customization_fee".to_string(),
				message: "Customization fee cannot be negative".to_string(),
			});
		}
		for coupon in &self.coupons {
			if coupon.code.trim().is_empty() {
				return Err(ValidationError::InvalidValue {
					field: "coupons".to_string(),
					message: "Coupon code cannot be empty".to_string(),
				});
			}
			if coupon.discount < Decimal::ZERO || coupon.discount > Decimal::ONE {
				return Err(ValidationError::InvalidValue {
					field: format!("coupons.{}", coupon.code),
					message: "Discount must be a fraction in [0, 1]".to_string(),
				});
			}
		}
		Ok(())
	}
}

/// Standard pricing implementation with configured fee and coupons.
pub struct StandardPricing {
	config: StandardPricingConfig,
	/// Coupon definitions indexed by uppercased code.
	coupons: HashMap<String, CouponDef>,
}

impl StandardPricing {
	/// Creates a new standard pricing source with the given configuration.
	pub fn new(config: StandardPricingConfig) -> Self {
		let coupons = config
			.coupons
			.iter()
			.map(|coupon| (coupon.code.to_uppercase(), coupon.clone()))
			.collect();

		Self { config, coupons }
	}
}

#[async_trait]
impl PricingInterface for StandardPricing {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(self.config.clone())
	}

	fn customization_fee(&self) -> Decimal {
		self.config.customization_fee
	}

	async fn find_coupon(&self, code: &str) -> Result<Option<CouponDef>, PricingError> {
		Ok(self.coupons.get(&code.to_uppercase()).cloned())
	}
}

/// Factory function to create the standard pricing source from configuration.
///
/// Optional configuration parameters:
/// - `customization_fee`: Flat fee added to every order (default: "500")
/// - `coupons`: Coupon table replacing the defaults; each entry carries
///   `code`, `discount` and `single_use`
pub fn create_pricing(config: &toml::Value) -> Result<Box<dyn PricingInterface>, PricingError> {
	let pricing_config: StandardPricingConfig = config
		.clone()
		.try_into()
		.map_err(|e| PricingError::Configuration(format!("Invalid pricing config: {}", e)))?;

	pricing_config
		.validate(config)
		.map_err(|e| PricingError::Configuration(e.to_string()))?;

	Ok(Box::new(StandardPricing::new(pricing_config)))
}

/// Registry for the standard pricing implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "standard";
	type Factory = PricingFactory;

	fn factory() -> Self::Factory {
		create_pricing
	}
}

impl PricingRegistry for Registry {}
