//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{
	ApiConfig, CatalogConfig, Config, GatewayConfig, NotifyConfig, OrdersConfig, PricingConfig,
	StoreConfig, StorefrontConfig,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use storefront_types::Template;

/// Builder for creating `Config` instances with a fluent API.
///
/// Provides an easy way to create test configurations with sensible defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	storefront_id: String,
	store_primary: String,
	store_cleanup_interval_seconds: u64,
	gateway_primary: String,
	pricing_primary: String,
	notify_primary: String,
	templates: Vec<Template>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			storefront_id: "test-storefront".to_string(),
			store_primary: "memory".to_string(),
			store_cleanup_interval_seconds: 60,
			gateway_primary: "razorpay".to_string(),
			pricing_primary: "standard".to_string(),
			notify_primary: "feed".to_string(),
			templates: vec![Template {
				id: "zay".to_string(),
				name: "Zay Ecommerce".to_string(),
				category: "E-commerce".to_string(),
				description: None,
				price: Decimal::from(5000),
			}],
			api: None,
		}
	}

	/// Sets the storefront ID.
	pub fn storefront_id(mut self, id: String) -> Self {
		self.storefront_id = id;
		self
	}

	/// Sets the primary store implementation.
	pub fn store_primary(mut self, primary: String) -> Self {
		self.store_primary = primary;
		self
	}

	/// Sets the store cleanup interval in seconds.
	pub fn store_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.store_cleanup_interval_seconds = interval;
		self
	}

	/// Sets the primary gateway implementation.
	pub fn gateway_primary(mut self, primary: String) -> Self {
		self.gateway_primary = primary;
		self
	}

	/// Sets the primary pricing implementation.
	pub fn pricing_primary(mut self, primary: String) -> Self {
		self.pricing_primary = primary;
		self
	}

	/// Sets the primary notification implementation.
	pub fn notify_primary(mut self, primary: String) -> Self {
		self.notify_primary = primary;
		self
	}

	/// Sets the catalog templates.
	pub fn templates(mut self, templates: Vec<Template>) -> Self {
		self.templates = templates;
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			storefront: StorefrontConfig {
				id: self.storefront_id,
			},
			store: StoreConfig {
				primary: self.store_primary,
				implementations: HashMap::new(),
				cleanup_interval_seconds: self.store_cleanup_interval_seconds,
			},
			gateway: GatewayConfig {
				primary: self.gateway_primary,
				implementations: HashMap::new(),
			},
			pricing: PricingConfig {
				primary: self.pricing_primary,
				implementations: HashMap::new(),
			},
			notify: NotifyConfig {
				primary: self.notify_primary,
				implementations: HashMap::new(),
			},
			catalog: CatalogConfig {
				templates: self.templates,
			},
			orders: OrdersConfig::default(),
			api: self.api,
		}
	}
}
