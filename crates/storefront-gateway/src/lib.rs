//! Payment gateway module for the storefront backend.
//!
//! This module provides abstractions over the payment gateway used to collect
//! order payments. A gateway implementation opens checkout sessions against
//! the provider's API and verifies the signed confirmations the provider
//! sends back, so that only authentic confirmations ever mark an order paid.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use storefront_types::{ConfigSchema, ImplementationRegistry};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod razorpay;
}

/// Errors that can occur during gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// Error that occurs during network communication with the gateway.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when a confirmation's signature does not verify.
	#[error("Signature verification failed")]
	VerificationFailed,
	/// Error that occurs when the gateway returns an unexpected response.
	#[error("Invalid response from gateway: {0}")]
	InvalidResponse(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A checkout session opened with the gateway for one order.
///
/// Stored keyed by the gateway-side order id until the confirmation
/// arrives, then used to verify the signature and build the receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
	/// Gateway-side order identifier the customer pays against.
	pub gateway_order_id: String,
	/// Storefront order this session collects payment for.
	pub order_id: String,
	/// Amount due in minor units of `currency`.
	pub amount: u64,
	/// ISO currency code the session was opened in.
	pub currency: String,
	/// Timestamp when the session was opened.
	pub created_at: u64,
}

/// A signed payment confirmation posted back after checkout.
///
/// Wire field names follow the gateway's checkout callback convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
	/// Gateway-side order identifier the payment was made against.
	#[serde(rename = "razorpay_order_id")]
	pub gateway_order_id: String,
	/// Gateway-side payment identifier.
	#[serde(rename = "razorpay_payment_id")]
	pub payment_id: String,
	/// Hex-encoded signature over the order and payment identifiers.
	#[serde(rename = "razorpay_signature")]
	pub signature: String,
}

/// Trait defining the interface for payment gateway implementations.
///
/// This trait must be implemented by any payment gateway that wants to
/// integrate with the storefront system. It provides methods for opening
/// checkout sessions and verifying signed confirmations.
#[async_trait]
pub trait GatewayInterface: Send + Sync {
	/// Returns the configuration schema for this gateway implementation.
	///
	/// This allows each implementation to define its own configuration requirements
	/// with specific validation rules. The schema is used to validate TOML configuration
	/// before initializing the gateway.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Public key identifier the browser checkout widget is initialized with.
	fn key_id(&self) -> &str;

	/// ISO currency code orders are charged in.
	fn currency(&self) -> &str;

	/// Opens a checkout session for the given order and amount in minor units.
	async fn create_checkout(
		&self,
		order_id: &str,
		amount: u64,
	) -> Result<CheckoutSession, GatewayError>;

	/// Verifies a signed confirmation against the session it claims to pay.
	///
	/// Returns Ok only when the signature is authentic for this session;
	/// any mismatch is a verification failure, never a state change.
	fn verify_confirmation(
		&self,
		confirmation: &PaymentConfirmation,
		session: &CheckoutSession,
	) -> Result<(), GatewayError>;
}

/// Type alias for gateway factory functions.
///
/// This is the function signature that all gateway implementations must provide
/// to create instances of their gateway interface.
pub type GatewayFactory = fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>;

/// Registry trait for gateway implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// gateway implementations must provide a GatewayFactory.
pub trait GatewayRegistry: ImplementationRegistry<Factory = GatewayFactory> {}

/// Get all registered gateway implementations.
///
/// Returns a vector of (name, factory) tuples for all available gateway implementations.
/// This is used by the factory registry to automatically register all implementations.
pub fn get_all_implementations() -> Vec<(&'static str, GatewayFactory)> {
	use implementations::razorpay;

	vec![(razorpay::Registry::NAME, razorpay::Registry::factory())]
}

/// Service that manages payment gateways with multiple implementations.
///
/// The GatewayService coordinates between different gateway implementations
/// and provides a unified interface for checkout and verification.
pub struct GatewayService {
	/// Map of implementation names to their interfaces.
	implementations: HashMap<String, Arc<dyn GatewayInterface>>,
	/// The primary implementation to use for payments.
	primary_implementation: String,
}

impl GatewayService {
	/// Creates a new GatewayService with the given implementations.
	///
	/// # Arguments
	///
	/// * `implementations` - Map of implementation names to their interfaces
	/// * `primary_implementation` - The name of the primary implementation to use
	pub fn new(
		implementations: HashMap<String, Arc<dyn GatewayInterface>>,
		primary_implementation: String,
	) -> Result<Self, GatewayError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(GatewayError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	fn primary(&self) -> Result<&Arc<dyn GatewayInterface>, GatewayError> {
		self.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				GatewayError::Configuration(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})
	}

	/// Public key identifier of the primary gateway.
	pub fn key_id(&self) -> Result<&str, GatewayError> {
		Ok(self.primary()?.key_id())
	}

	/// Currency code of the primary gateway.
	pub fn currency(&self) -> Result<&str, GatewayError> {
		Ok(self.primary()?.currency())
	}

	/// Opens a checkout session using the primary gateway.
	pub async fn create_checkout(
		&self,
		order_id: &str,
		amount: u64,
	) -> Result<CheckoutSession, GatewayError> {
		self.primary()?.create_checkout(order_id, amount).await
	}

	/// Verifies a signed confirmation using the primary gateway.
	pub fn verify_confirmation(
		&self,
		confirmation: &PaymentConfirmation,
		session: &CheckoutSession,
	) -> Result<(), GatewayError> {
		self.primary()?.verify_confirmation(confirmation, session)
	}
}
