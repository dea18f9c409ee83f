//! Configuration module for the storefront backend.
//!
//! This module provides structures and utilities for managing storefront
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(feature = "testing")]
pub mod builders;
mod loader;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use storefront_types::Template;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the storefront backend.
///
/// Contains all sections required for the backend to operate: the instance
/// identity, persistence, payment gateway, pricing, admin notifications,
/// the template catalog, custom-order settings and the API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this storefront instance.
	pub storefront: StorefrontConfig,
	/// Configuration for the persistence backend.
	pub store: StoreConfig,
	/// Configuration for the payment gateway.
	pub gateway: GatewayConfig,
	/// Configuration for pricing and coupons.
	pub pricing: PricingConfig,
	/// Configuration for the admin alert feed.
	pub notify: NotifyConfig,
	/// Template catalog offered to customers.
	pub catalog: CatalogConfig,
	/// Settings for custom build orders.
	#[serde(default)]
	pub orders: OrdersConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to this storefront instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorefrontConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Configuration for the persistence backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of store implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired store entries.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

/// Returns the default cleanup interval of one hour.
fn default_cleanup_interval_seconds() -> u64 {
	3600
}

/// Configuration for the payment gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of gateway implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for pricing and coupons.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of pricing implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the admin alert feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of notification implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Template catalog offered to customers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
	/// Catalog entries; ids must be unique.
	#[serde(default)]
	pub templates: Vec<Template>,
}

/// Settings for custom build orders.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// Base price per requested delivery window for custom builds.
	#[serde(default = "default_custom_windows")]
	pub custom_windows: HashMap<String, Decimal>,
}

impl Default for OrdersConfig {
	fn default() -> Self {
		Self {
			custom_windows: default_custom_windows(),
		}
	}
}

/// Returns the default delivery-window price table for custom builds.
fn default_custom_windows() -> HashMap<String, Decimal> {
	HashMap::from([
		("48-hours".to_string(), Decimal::from(15000)),
		("3-days".to_string(), Decimal::from(12000)),
		("5-days".to_string(), Decimal::from(10000)),
		("7-days".to_string(), Decimal::from(8000)),
	])
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

/// Returns the default API host of 127.0.0.1.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port of 3000.
fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Limit input size to prevent ReDoS attacks
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with async environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// This method checks every section:
	/// - Ensures the storefront id is not empty
	/// - Validates the primary store/gateway/pricing/notify implementations exist
	/// - Checks the store cleanup interval bounds
	/// - Validates catalog entries are unique and positively priced
	/// - Validates custom delivery-window prices
	fn validate(&self) -> Result<(), ConfigError> {
		// Validate storefront config
		if self.storefront.id.is_empty() {
			return Err(ConfigError::Validation(
				"Storefront ID cannot be empty".into(),
			));
		}

		// Validate store config
		Self::validate_component("store", &self.store.primary, &self.store.implementations)?;
		if self.store.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Store cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.store.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Store cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		// Validate gateway, pricing and notify configs
		Self::validate_component(
			"gateway",
			&self.gateway.primary,
			&self.gateway.implementations,
		)?;
		Self::validate_component(
			"pricing",
			&self.pricing.primary,
			&self.pricing.implementations,
		)?;
		Self::validate_component("notify", &self.notify.primary, &self.notify.implementations)?;

		// Validate catalog config
		self.validate_catalog()?;

		// At least one way to order something must remain
		if self.catalog.templates.is_empty() && self.orders.custom_windows.is_empty() {
			return Err(ConfigError::Validation(
				"Either catalog templates or custom delivery windows must be configured".into(),
			));
		}

		// Validate custom window prices
		for (window, price) in &self.orders.custom_windows {
			if price.is_sign_negative() || price.is_zero() {
				return Err(ConfigError::Validation(format!(
					"Custom window '{}' must have a positive price",
					window
				)));
			}
		}

		// Validate API config if enabled
		if let Some(ref api) = self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
		}

		Ok(())
	}

	/// Validates a component section with a primary implementation selection.
	fn validate_component(
		name: &str,
		primary: &str,
		implementations: &HashMap<String, toml::Value>,
	) -> Result<(), ConfigError> {
		if implementations.is_empty() {
			return Err(ConfigError::Validation(format!(
				"At least one {} implementation must be configured",
				name
			)));
		}
		if primary.is_empty() {
			return Err(ConfigError::Validation(format!(
				"{} primary implementation cannot be empty",
				name
			)));
		}
		if !implementations.contains_key(primary) {
			return Err(ConfigError::Validation(format!(
				"Primary {} '{}' not found in implementations",
				name, primary
			)));
		}
		Ok(())
	}

	/// Validates catalog entries.
	///
	/// # Validation Rules
	/// 1. Template ids must be unique across the catalog
	/// 2. Every template must have a positive price
	/// 3. Template ids and names must not be empty
	fn validate_catalog(&self) -> Result<(), ConfigError> {
		let mut seen: HashMap<&str, &str> = HashMap::new();

		for template in &self.catalog.templates {
			if template.id.is_empty() {
				return Err(ConfigError::Validation(
					"Catalog template id cannot be empty".into(),
				));
			}
			if template.name.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Catalog template '{}' must have a name",
					template.id
				)));
			}
			if template.price.is_sign_negative() || template.price.is_zero() {
				return Err(ConfigError::Validation(format!(
					"Catalog template '{}' must have a positive price",
					template.id
				)));
			}
			if seen.insert(&template.id, &template.name).is_some() {
				return Err(ConfigError::Validation(format!(
					"Duplicate catalog template id '{}'",
					template.id
				)));
			}
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is automatically
/// validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
