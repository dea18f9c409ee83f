//! Builder for constructing storefront engine instances.
//!
//! Instantiates the configured implementations of every component through
//! the factory maps handed in by the binary, wraps them in their services
//! and wires the engine. Implementations named in configuration but not
//! present in the factory map are skipped; a missing primary is an error.

use crate::engine::event_bus::EventBus;
use crate::engine::StorefrontEngine;
use std::collections::HashMap;
use std::sync::Arc;
use storefront_config::Config;
use storefront_gateway::{GatewayError, GatewayInterface, GatewayService};
use storefront_notify::{NotificationInterface, NotificationService, NotifyError};
use storefront_pricing::{PricingError, PricingInterface, PricingService};
use storefront_store::{StoreError, StoreInterface, StoreService};
use thiserror::Error;

/// Errors that can occur while building the engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory maps for every pluggable component, keyed by implementation
/// name as it appears in configuration.
pub struct StorefrontFactories<SF, GF, PF, NF> {
	pub store_factories: HashMap<String, SF>,
	pub gateway_factories: HashMap<String, GF>,
	pub pricing_factories: HashMap<String, PF>,
	pub notify_factories: HashMap<String, NF>,
}

/// Builder that assembles a `StorefrontEngine` from configuration.
pub struct StorefrontBuilder {
	config: Config,
}

impl StorefrontBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine, instantiating each configured implementation.
	///
	/// Factories validate their own configuration; any factory failure
	/// aborts the build.
	pub fn build<SF, GF, PF, NF>(
		self,
		factories: StorefrontFactories<SF, GF, PF, NF>,
	) -> Result<StorefrontEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StoreInterface>, StoreError>,
		GF: Fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>,
		PF: Fn(&toml::Value) -> Result<Box<dyn PricingInterface>, PricingError>,
		NF: Fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotifyError>,
	{
		// Store: only the primary backend is kept, the service owns it
		// exclusively.
		let mut store_impls: HashMap<String, Box<dyn StoreInterface>> = HashMap::new();
		for (name, impl_config) in &self.config.store.implementations {
			if let Some(factory) = factories.store_factories.get(name) {
				let is_primary = name == &self.config.store.primary;
				match factory(impl_config) {
					Ok(implementation) => {
						tracing::info!(
							component = "store",
							implementation = %name,
							enabled = %is_primary,
							"Loaded"
						);
						store_impls.insert(name.clone(), implementation);
					},
					Err(e) => {
						tracing::error!(
							component = "store",
							implementation = %name,
							"Failed to load: {}",
							e
						);
						return Err(BuilderError::Config(format!(
							"Failed to load store implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}
		let backend = store_impls
			.remove(&self.config.store.primary)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!(
					"Primary store implementation '{}' was not loaded",
					self.config.store.primary
				))
			})?;
		let store = Arc::new(StoreService::new(backend));

		// Gateway, pricing and notify keep every loaded implementation in
		// their service; the service validates the primary.
		let mut gateway_impls: HashMap<String, Arc<dyn GatewayInterface>> = HashMap::new();
		for (name, impl_config) in &self.config.gateway.implementations {
			if let Some(factory) = factories.gateway_factories.get(name) {
				let is_primary = name == &self.config.gateway.primary;
				match factory(impl_config) {
					Ok(implementation) => {
						tracing::info!(
							component = "gateway",
							implementation = %name,
							enabled = %is_primary,
							"Loaded"
						);
						gateway_impls.insert(name.clone(), Arc::from(implementation));
					},
					Err(e) => {
						tracing::error!(
							component = "gateway",
							implementation = %name,
							"Failed to load: {}",
							e
						);
						return Err(BuilderError::Config(format!(
							"Failed to load gateway implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}
		let gateway = Arc::new(
			GatewayService::new(gateway_impls, self.config.gateway.primary.clone())
				.map_err(|e| BuilderError::Config(e.to_string()))?,
		);

		let mut pricing_impls: HashMap<String, Arc<dyn PricingInterface>> = HashMap::new();
		for (name, impl_config) in &self.config.pricing.implementations {
			if let Some(factory) = factories.pricing_factories.get(name) {
				let is_primary = name == &self.config.pricing.primary;
				match factory(impl_config) {
					Ok(implementation) => {
						tracing::info!(
							component = "pricing",
							implementation = %name,
							enabled = %is_primary,
							"Loaded"
						);
						pricing_impls.insert(name.clone(), Arc::from(implementation));
					},
					Err(e) => {
						tracing::error!(
							component = "pricing",
							implementation = %name,
							"Failed to load: {}",
							e
						);
						return Err(BuilderError::Config(format!(
							"Failed to load pricing implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}
		let pricing = Arc::new(
			PricingService::new(pricing_impls, self.config.pricing.primary.clone())
				.map_err(|e| BuilderError::Config(e.to_string()))?,
		);

		let mut notify_impls: HashMap<String, Arc<dyn NotificationInterface>> = HashMap::new();
		for (name, impl_config) in &self.config.notify.implementations {
			if let Some(factory) = factories.notify_factories.get(name) {
				let is_primary = name == &self.config.notify.primary;
				match factory(impl_config) {
					Ok(implementation) => {
						tracing::info!(
							component = "notify",
							implementation = %name,
							enabled = %is_primary,
							"Loaded"
						);
						notify_impls.insert(name.clone(), Arc::from(implementation));
					},
					Err(e) => {
						tracing::error!(
							component = "notify",
							implementation = %name,
							"Failed to load: {}",
							e
						);
						return Err(BuilderError::Config(format!(
							"Failed to load notification implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}
		let notify = Arc::new(
			NotificationService::new(notify_impls, self.config.notify.primary.clone())
				.map_err(|e| BuilderError::Config(e.to_string()))?,
		);

		let event_bus = EventBus::new(1000);

		Ok(StorefrontEngine::new(
			self.config,
			store,
			gateway,
			pricing,
			notify,
			event_bus,
		))
	}
}
