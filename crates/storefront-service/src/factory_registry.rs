//! Dynamic factory registry for storefront implementations.
//!
//! This module provides a centralized registry for all factory functions,
//! allowing dynamic instantiation of implementations based on configuration.

use std::collections::HashMap;
use std::sync::OnceLock;
use storefront_config::Config;
use storefront_engine::{StorefrontBuilder, StorefrontEngine, StorefrontFactories};
use storefront_gateway::GatewayFactory;
use storefront_notify::NotificationFactory;
use storefront_pricing::PricingFactory;
use storefront_store::StoreFactory;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub store: HashMap<String, StoreFactory>,
	pub gateway: HashMap<String, GatewayFactory>,
	pub pricing: HashMap<String, PricingFactory>,
	pub notify: HashMap<String, NotificationFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			store: HashMap::new(),
			gateway: HashMap::new(),
			pricing: HashMap::new(),
			notify: HashMap::new(),
		}
	}

	/// Register a store implementation
	pub fn register_store(&mut self, name: impl Into<String>, factory: StoreFactory) {
		self.store.insert(name.into(), factory);
	}

	/// Register a gateway implementation
	pub fn register_gateway(&mut self, name: impl Into<String>, factory: GatewayFactory) {
		self.gateway.insert(name.into(), factory);
	}

	/// Register a pricing implementation
	pub fn register_pricing(&mut self, name: impl Into<String>, factory: PricingFactory) {
		self.pricing.insert(name.into(), factory);
	}

	/// Register a notification implementation
	pub fn register_notify(&mut self, name: impl Into<String>, factory: NotificationFactory) {
		self.notify.insert(name.into(), factory);
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		// Auto-register all store implementations
		for (name, factory) in storefront_store::get_all_implementations() {
			tracing::debug!("Registering store implementation: {}", name);
			registry.register_store(name, factory);
		}

		// Auto-register all gateway implementations
		for (name, factory) in storefront_gateway::get_all_implementations() {
			tracing::debug!("Registering gateway implementation: {}", name);
			registry.register_gateway(name, factory);
		}

		// Auto-register all pricing implementations
		for (name, factory) in storefront_pricing::get_all_implementations() {
			tracing::debug!("Registering pricing implementation: {}", name);
			registry.register_pricing(name, factory);
		}

		// Auto-register all notification implementations
		for (name, factory) in storefront_notify::get_all_implementations() {
			tracing::debug!("Registering notification implementation: {}", name);
			registry.register_notify(name, factory);
		}

		registry
	})
}

/// Get the global factory registry
pub fn get_registry() -> &'static FactoryRegistry {
	initialize_registry()
}

/// Macro to build factories from config implementations
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				let available_str = available.join(", ");
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name, name, available_str
				)
				.into());
			}
		}
		factories
	}};
}

/// Build the storefront engine using the registry and config
pub fn build_storefront_from_config(
	config: Config,
) -> Result<StorefrontEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();
	let builder = StorefrontBuilder::new(config.clone());

	// Build factories for each component type using the macro
	let store_factories = build_factories!(registry, config.store.implementations, store, "store");
	let gateway_factories =
		build_factories!(registry, config.gateway.implementations, gateway, "gateway");
	let pricing_factories =
		build_factories!(registry, config.pricing.implementations, pricing, "pricing");
	let notify_factories =
		build_factories!(registry, config.notify.implementations, notify, "notification");

	let factories = StorefrontFactories {
		store_factories,
		gateway_factories,
		pricing_factories,
		notify_factories,
	};

	Ok(builder.build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use storefront_config::builders::ConfigBuilder;

	fn configured(config: &mut Config) {
		config
			.store
			.implementations
			.insert("memory".to_string(), toml::Value::Table(Default::default()));
		config.gateway.implementations.insert(
			"razorpay".to_string(),
			toml::from_str(
				r#"
key_id = "rzp_test_key"
key_secret = "test-secret"
"#,
			)
			.unwrap(),
		);
		config.pricing.implementations.insert(
			"standard".to_string(),
			toml::Value::Table(Default::default()),
		);
		config
			.notify
			.implementations
			.insert("feed".to_string(), toml::Value::Table(Default::default()));
	}

	#[test]
	fn registry_contains_all_shipped_implementations() {
		let registry = get_registry();

		assert!(registry.store.contains_key("memory"));
		assert!(registry.store.contains_key("file"));
		assert!(registry.gateway.contains_key("razorpay"));
		assert!(registry.pricing.contains_key("standard"));
		assert!(registry.notify.contains_key("feed"));
	}

	#[test]
	fn builds_engine_from_config() {
		let mut config = ConfigBuilder::new().build();
		configured(&mut config);

		let engine = build_storefront_from_config(config).unwrap();
		assert_eq!(engine.config().storefront.id, "test-storefront");
	}

	#[test]
	fn unknown_implementation_name_is_rejected() {
		let mut config = ConfigBuilder::new().build();
		configured(&mut config);
		config
			.store
			.implementations
			.insert("redis".to_string(), toml::Value::Table(Default::default()));

		let err = build_storefront_from_config(config).unwrap_err();
		assert!(err.to_string().contains("Unknown store implementation"));
		assert!(err.to_string().contains("redis"));
	}
}
