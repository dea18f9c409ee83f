//! Razorpay gateway implementation.
//!
//! Opens checkout sessions through the Razorpay Orders API and verifies the
//! signed confirmations posted back by the checkout widget. Confirmations
//! carry an HMAC-SHA256 signature computed with the key secret over
//! `"{order_id}|{payment_id}"`; verification is constant-time and a failed
//! check never mutates any state.

use crate::{
	CheckoutSession, GatewayError, GatewayFactory, GatewayInterface, GatewayRegistry,
	PaymentConfirmation,
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use storefront_types::{
	current_timestamp, ConfigSchema, ImplementationRegistry, SecretString, ValidationError,
};

type HmacSha256 = Hmac<Sha256>;

/// Configuration for the Razorpay gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayConfig {
	/// Public key id, shared with the browser checkout widget.
	pub key_id: String,
	/// Private key secret used for API auth and signature verification.
	pub key_secret: SecretString,
	/// Base URL of the Razorpay REST API.
	#[serde(default = "default_api_base")]
	pub api_base: String,
	/// Currency orders are charged in.
	#[serde(default = "default_currency")]
	pub currency: String,
}

fn default_api_base() -> String {
	"https://api.razorpay.com/v1".to_string()
}

fn default_currency() -> String {
	"INR".to_string()
}

impl ConfigSchema for RazorpayConfig {
	fn validate(&self, _config: &toml::value::Value) -> Result<(), ValidationError> {
		if self.key_id.trim().is_empty() {
			return Err(ValidationError::InvalidValue {
				field: "key_id".to_string(),
				message: "Gateway key id cannot be empty".to_string(),
			});
		}
		if self.key_secret.is_empty() {
			return Err(ValidationError::InvalidValue {
				field: "key_secret".to_string(),
				message: "Gateway key secret cannot be empty".to_string(),
			});
		}
		if self.currency.len() != 3 {
			return Err(ValidationError::InvalidValue {
				field: "currency".to_string(),
				message: "Currency must be a 3-letter ISO code".to_string(),
			});
		}
		Ok(())
	}
}

/// Shape of an order created through the Razorpay Orders API.
#[derive(Debug, Deserialize)]
struct RazorpayOrderResponse {
	id: String,
}

/// Razorpay gateway implementation.
pub struct RazorpayGateway {
	config: RazorpayConfig,
	client: reqwest::Client,
}

impl RazorpayGateway {
	/// Creates a new Razorpay gateway with the given configuration.
	pub fn new(config: RazorpayConfig) -> Self {
		Self {
			config,
			client: reqwest::Client::new(),
		}
	}

	fn mac(&self) -> Result<HmacSha256, GatewayError> {
		self.config
			.key_secret
			.with_exposed(|secret| HmacSha256::new_from_slice(secret.as_bytes()))
			.map_err(|_| GatewayError::Configuration("Invalid key secret".to_string()))
	}
}

#[async_trait]
impl GatewayInterface for RazorpayGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(self.config.clone())
	}

	fn key_id(&self) -> &str {
		&self.config.key_id
	}

	fn currency(&self) -> &str {
		&self.config.currency
	}

	async fn create_checkout(
		&self,
		order_id: &str,
		amount: u64,
	) -> Result<CheckoutSession, GatewayError> {
		let url = format!("{}/orders", self.config.api_base);
		let body = serde_json::json!({
			"amount": amount,
			"currency": self.config.currency,
			"receipt": order_id,
		});

		let response = self
			.client
			.post(&url)
			.basic_auth(&self.config.key_id, Some(self.config.key_secret.expose_secret()))
			.json(&body)
			.send()
			.await
			.map_err(|e| GatewayError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let detail = response.text().await.unwrap_or_default();
			return Err(GatewayError::Network(format!(
				"Gateway returned {}: {}",
				status, detail
			)));
		}

		let order: RazorpayOrderResponse = response
			.json()
			.await
			.map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

		tracing::info!(
			order_id = %order_id,
			gateway_order_id = %order.id,
			amount = amount,
			"Opened checkout session"
		);

		Ok(CheckoutSession {
			gateway_order_id: order.id,
			order_id: order_id.to_string(),
			amount,
			currency: self.config.currency.clone(),
			created_at: current_timestamp(),
		})
	}

	fn verify_confirmation(
		&self,
		confirmation: &PaymentConfirmation,
		session: &CheckoutSession,
	) -> Result<(), GatewayError> {
		// The confirmation must speak about the session it is presented for
		if confirmation.gateway_order_id != session.gateway_order_id {
			return Err(GatewayError::VerificationFailed);
		}

		let signature =
			hex::decode(&confirmation.signature).map_err(|_| GatewayError::VerificationFailed)?;

		let mut mac = self.mac()?;
		mac.update(
			format!("{}|{}", session.gateway_order_id, confirmation.payment_id).as_bytes(),
		);
		mac.verify_slice(&signature)
			.map_err(|_| GatewayError::VerificationFailed)
	}
}

/// Factory function to create a Razorpay gateway from configuration.
///
/// Required configuration parameters:
/// - `key_id`: Public key id for the Razorpay account
/// - `key_secret`: Private key secret, supports `${ENV_VAR}` resolution
///
/// Optional configuration parameters:
/// - `api_base`: API base URL (default: "https://api.razorpay.com/v1")
/// - `currency`: Charge currency (default: "INR")
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	let razorpay_config: RazorpayConfig = config
		.clone()
		.try_into()
		.map_err(|e| GatewayError::Configuration(format!("Invalid gateway config: {}", e)))?;

	razorpay_config
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	Ok(Box::new(RazorpayGateway::new(razorpay_config)))
}

/// Registry for the Razorpay gateway implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "razorpay";
	type Factory = GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl GatewayRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	fn gateway() -> RazorpayGateway {
		RazorpayGateway::new(RazorpayConfig {
			key_id: "rzp_test_key".to_string(),
			key_secret: SecretString::from("test-secret"),
			api_base: default_api_base(),
			currency: default_currency(),
		})
	}

	fn session() -> CheckoutSession {
		CheckoutSession {
			gateway_order_id: "order_MkWvh2".to_string(),
			order_id: "o1".to_string(),
			amount: 550_000,
			currency: "INR".to_string(),
			created_at: 0,
		}
	}

	fn sign(secret: &str, gateway_order_id: &str, payment_id: &str) -> String {
		let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
		mac.update(format!("{}|{}", gateway_order_id, payment_id).as_bytes());
		hex::encode(mac.finalize().into_bytes())
	}

	#[test]
	fn test_verify_accepts_authentic_signature() {
		let gateway = gateway();
		let session = session();
		let confirmation = PaymentConfirmation {
			gateway_order_id: session.gateway_order_id.clone(),
			payment_id: "pay_29QQoUBi".to_string(),
			signature: sign("test-secret", &session.gateway_order_id, "pay_29QQoUBi"),
		};

		assert!(gateway.verify_confirmation(&confirmation, &session).is_ok());
	}

	#[test]
	fn test_verify_rejects_wrong_secret() {
		let gateway = gateway();
		let session = session();
		let confirmation = PaymentConfirmation {
			gateway_order_id: session.gateway_order_id.clone(),
			payment_id: "pay_29QQoUBi".to_string(),
			signature: sign("other-secret", &session.gateway_order_id, "pay_29QQoUBi"),
		};

		let result = gateway.verify_confirmation(&confirmation, &session);
		assert!(matches!(result, Err(GatewayError::VerificationFailed)));
	}

	#[test]
	fn test_verify_rejects_tampered_payment_id() {
		let gateway = gateway();
		let session = session();
		let confirmation = PaymentConfirmation {
			gateway_order_id: session.gateway_order_id.clone(),
			// Signature was computed for a different payment id
			payment_id: "pay_tampered".to_string(),
			signature: sign("test-secret", &session.gateway_order_id, "pay_29QQoUBi"),
		};

		let result = gateway.verify_confirmation(&confirmation, &session);
		assert!(matches!(result, Err(GatewayError::VerificationFailed)));
	}

	#[test]
	fn test_verify_rejects_session_mismatch() {
		let gateway = gateway();
		let session = session();
		let confirmation = PaymentConfirmation {
			gateway_order_id: "order_other".to_string(),
			payment_id: "pay_29QQoUBi".to_string(),
			signature: sign("test-secret", "order_other", "pay_29QQoUBi"),
		};

		let result = gateway.verify_confirmation(&confirmation, &session);
		assert!(matches!(result, Err(GatewayError::VerificationFailed)));
	}

	#[test]
	fn test_verify_rejects_malformed_signature() {
		let gateway = gateway();
		let session = session();
		let confirmation = PaymentConfirmation {
			gateway_order_id: session.gateway_order_id.clone(),
			payment_id: "pay_29QQoUBi".to_string(),
			signature: "not-hex!".to_string(),
		};

		let result = gateway.verify_confirmation(&confirmation, &session);
		assert!(matches!(result, Err(GatewayError::VerificationFailed)));
	}

	#[test]
	fn test_factory_applies_defaults() {
		let config: toml::Value = toml::from_str(
			r#"
key_id = "rzp_test_key"
key_secret = "test-secret"
"#,
		)
		.unwrap();

		let gateway = create_gateway(&config).unwrap();
		assert_eq!(gateway.key_id(), "rzp_test_key");
		assert_eq!(gateway.currency(), "INR");
	}

	#[test]
	fn test_factory_rejects_empty_key() {
		let config: toml::Value = toml::from_str(
			r#"
key_id = ""
key_secret = "test-secret"
"#,
		)
		.unwrap();

		let result = create_gateway(&config);
		assert!(matches!(result, Err(GatewayError::Configuration(_))));
	}

	#[test]
	fn test_confirmation_wire_names() {
		let confirmation: PaymentConfirmation = serde_json::from_str(
			r#"{
				"razorpay_order_id": "order_MkWvh2",
				"razorpay_payment_id": "pay_29QQoUBi",
				"razorpay_signature": "abc123"
			}"#,
		)
		.unwrap();

		assert_eq!(confirmation.gateway_order_id, "order_MkWvh2");
		assert_eq!(confirmation.payment_id, "pay_29QQoUBi");
		assert_eq!(confirmation.signature, "abc123");
	}
}
