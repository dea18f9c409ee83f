//! Coupon validation endpoint.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_engine::StorefrontEngine;
use storefront_types::{APIError, CouponCheck, User};

/// Body of `POST /api/coupons/validate`.
#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
	pub code: String,
}

/// Response for `POST /api/coupons/validate`.
///
/// Always returned with status 200; a code that does not apply is a
/// normal answer, not an error.
#[derive(Debug, Serialize)]
pub struct ValidateCouponResponse {
	pub valid: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub discount: Option<Decimal>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

/// Checks a coupon code for the calling user without redeeming it.
pub async fn validate_coupon(
	request: ValidateCouponRequest,
	caller: &User,
	engine: &StorefrontEngine,
) -> Result<ValidateCouponResponse, APIError> {
	let check = engine
		.orders()
		.check_coupon(&request.code, &caller.id)
		.await
		.map_err(super::order_api_error)?;

	Ok(match check {
		CouponCheck::Valid { discount } => ValidateCouponResponse {
			valid: true,
			discount: Some(discount),
			message: None,
		},
		rejected => ValidateCouponResponse {
			valid: false,
			discount: None,
			message: rejected.rejection_message().map(|m| m.to_string()),
		},
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::apis::fixtures;
	use storefront_engine::handlers::{CreateOrderRequest, OrderItemRequest};
	use storefront_types::UserRole;

	fn request(code: &str) -> ValidateCouponRequest {
		ValidateCouponRequest {
			code: code.to_string(),
		}
	}

	#[tokio::test]
	async fn known_code_reports_its_discount() {
		let engine = fixtures::engine();
		let customer = fixtures::register(&engine, "Asha Rao", UserRole::Customer).await;

		let response = validate_coupon(request("WELCOME10"), &customer, &engine)
			.await
			.unwrap();

		assert!(response.valid);
		assert_eq!(response.discount, Some(Decimal::new(10, 2)));
		assert_eq!(response.message, None);
	}

	#[tokio::test]
	async fn unknown_code_is_invalid_but_not_an_error() {
		let engine = fixtures::engine();
		let customer = fixtures::register(&engine, "Asha Rao", UserRole::Customer).await;

		let response = validate_coupon(request("NOPE"), &customer, &engine)
			.await
			.unwrap();

		assert!(!response.valid);
		assert_eq!(response.message.as_deref(), Some("Invalid coupon code"));
	}

	#[tokio::test]
	async fn spent_single_use_code_reports_already_redeemed() {
		let engine = fixtures::engine();
		let customer = fixtures::register(&engine, "Asha Rao", UserRole::Customer).await;
		engine
			.orders()
			.create_order(
				CreateOrderRequest {
					item: OrderItemRequest::Template {
						template_id: "zay".to_string(),
					},
					coupon_code: Some("AS392212".to_string()),
				},
				&customer,
			)
			.await
			.unwrap();

		let response = validate_coupon(request("AS392212"), &customer, &engine)
			.await
			.unwrap();

		assert!(!response.valid);
		assert_eq!(
			response.message.as_deref(),
			Some("Coupon already used on your account")
		);
	}
}
