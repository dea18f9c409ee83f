//! Payment endpoints: checkout session opening and confirmation intake.

use serde::Serialize;
use storefront_engine::StorefrontEngine;
use storefront_gateway::PaymentConfirmation;
use storefront_types::{APIError, User};

/// Response for `POST /api/orders/{id}/checkout`, shaped for the browser
/// checkout widget.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
	pub gateway_order_id: String,
	pub key_id: String,
	/// Amount due in minor units (paise).
	pub amount: u64,
	pub currency: String,
	pub order_id: String,
}

/// Response for `POST /api/payments/confirm`.
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
	/// `recorded` for a newly captured payment, `duplicate` for a replay
	/// of a confirmation that was already recorded.
	pub status: &'static str,
	pub order_id: String,
}

/// Opens a gateway checkout session for an order awaiting payment.
pub async fn open_checkout(
	order_id: &str,
	caller: &User,
	engine: &StorefrontEngine,
) -> Result<CheckoutResponse, APIError> {
	super::validate_entity_id(order_id, "Order")?;
	let details = engine
		.payments()
		.open_checkout(order_id, caller)
		.await
		.map_err(super::payment_api_error)?;

	Ok(CheckoutResponse {
		gateway_order_id: details.gateway_order_id,
		key_id: details.key_id,
		amount: details.amount,
		currency: details.currency,
		order_id: details.order_id,
	})
}

/// Records a signed confirmation posted back by the gateway.
pub async fn confirm_payment(
	confirmation: PaymentConfirmation,
	engine: &StorefrontEngine,
) -> Result<ConfirmResponse, APIError> {
	let outcome = engine
		.payments()
		.confirm_payment(confirmation)
		.await
		.map_err(super::payment_api_error)?;

	Ok(ConfirmResponse {
		status: if outcome.event.is_some() {
			"recorded"
		} else {
			"duplicate"
		},
		order_id: outcome.order.id,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::apis::fixtures;
	use storefront_engine::handlers::{CreateOrderRequest, OrderItemRequest};
	use storefront_types::{User, UserRole};

	async fn pending_order(engine: &StorefrontEngine, customer: &User) -> String {
		let (order, _) = engine
			.orders()
			.create_order(
				CreateOrderRequest {
					item: OrderItemRequest::Template {
						template_id: "zay".to_string(),
					},
					coupon_code: None,
				},
				customer,
			)
			.await
			.unwrap();
		order.id
	}

	#[tokio::test]
	async fn checkout_refuses_non_owners() {
		let engine = fixtures::engine();
		let owner = fixtures::register(&engine, "Asha Rao", UserRole::Customer).await;
		let other = fixtures::register(&engine, "Vikram Shah", UserRole::Customer).await;
		let order_id = pending_order(&engine, &owner).await;

		let err = open_checkout(&order_id, &other, &engine).await.unwrap_err();
		assert_eq!(err.status_code(), 403);
	}

	#[tokio::test]
	async fn checkout_refuses_orders_not_yet_accepted() {
		let engine = fixtures::engine();
		let owner = fixtures::register(&engine, "Asha Rao", UserRole::Customer).await;
		let order_id = pending_order(&engine, &owner).await;

		let err = open_checkout(&order_id, &owner, &engine).await.unwrap_err();
		assert_eq!(err.status_code(), 409);
	}

	#[tokio::test]
	async fn confirmation_without_a_session_is_a_verification_failure() {
		let engine = fixtures::engine();

		let err = confirm_payment(
			PaymentConfirmation {
				gateway_order_id: "order_unknown".to_string(),
				payment_id: "pay_123".to_string(),
				signature: "00".repeat(32),
			},
			&engine,
		)
		.await
		.unwrap_err();

		assert_eq!(err.status_code(), 400);
		let body = err.to_error_response();
		assert_eq!(body.error, "VERIFICATION_FAILED");
	}

	#[tokio::test]
	async fn malformed_order_id_is_rejected() {
		let engine = fixtures::engine();
		let owner = fixtures::register(&engine, "Asha Rao", UserRole::Customer).await;

		let err = open_checkout("not-a-uuid", &owner, &engine)
			.await
			.unwrap_err();
		assert_eq!(err.status_code(), 400);
	}
}
