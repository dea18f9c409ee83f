//! Order endpoints: creation, listing, requirements and delivery access.

use serde::{Deserialize, Serialize};
use storefront_engine::handlers::CreateOrderRequest;
use storefront_engine::state::available_actions;
use storefront_engine::StorefrontEngine;
use storefront_types::{
	APIError, DeliveryArtifact, DeliveryStatus, Order, OrderActionKind, User, UserRole,
};

/// Order representation returned by the API.
///
/// Carries the store revision as `version` for optimistic concurrency,
/// the actions the caller may request right now, and the payment gate
/// flag the web client uses to offer checkout.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
	#[serde(flatten)]
	pub order: Order,
	pub version: u64,
	pub available_actions: Vec<OrderActionKind>,
	pub payment_due: bool,
}

impl OrderResponse {
	pub(crate) fn for_caller(order: Order, version: u64, caller: &User) -> Self {
		let available_actions = available_actions(&order, super::role_of(caller));
		let payment_due = order.payment_due();
		Self {
			order,
			version,
			available_actions,
			payment_due,
		}
	}
}

/// Body of `PUT /api/orders/{id}/requirements`.
#[derive(Debug, Deserialize)]
pub struct RequirementsRequest {
	pub text: String,
	pub expected_version: Option<u64>,
}

/// Response for `GET /api/orders/{id}/delivery`.
#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
	pub order_id: String,
	pub artifact: DeliveryArtifact,
}

/// Creates an order for the calling customer.
pub async fn create_order(
	request: CreateOrderRequest,
	caller: &User,
	engine: &StorefrontEngine,
) -> Result<OrderResponse, APIError> {
	if caller.role != UserRole::Customer {
		return Err(APIError::Forbidden {
			error_type: "CUSTOMER_ONLY".to_string(),
			message: "Only customers can place orders".to_string(),
		});
	}

	let (order, version) = engine
		.orders()
		.create_order(request, caller)
		.await
		.map_err(super::order_api_error)?;
	Ok(OrderResponse::for_caller(order, version, caller))
}

/// Lists the caller's orders, newest first.
pub async fn list_orders(
	caller: &User,
	engine: &StorefrontEngine,
) -> Result<Vec<OrderResponse>, APIError> {
	let orders = engine
		.orders()
		.list_orders_for(&caller.id)
		.await
		.map_err(super::order_api_error)?;
	Ok(orders
		.into_iter()
		.map(|(order, version)| OrderResponse::for_caller(order, version, caller))
		.collect())
}

/// Fetches one order. Customers only see their own; admins see all.
pub async fn get_order(
	order_id: &str,
	caller: &User,
	engine: &StorefrontEngine,
) -> Result<OrderResponse, APIError> {
	super::validate_entity_id(order_id, "Order")?;
	let (order, version) = engine
		.orders()
		.get_order(order_id)
		.await
		.map_err(super::order_api_error)?;
	check_order_access(&order, caller)?;
	Ok(OrderResponse::for_caller(order, version, caller))
}

/// Submits the requirements text, or rewrites it while still editable.
pub async fn put_requirements(
	order_id: &str,
	request: RequirementsRequest,
	caller: &User,
	engine: &StorefrontEngine,
) -> Result<OrderResponse, APIError> {
	super::validate_entity_id(order_id, "Order")?;
	let (order, version) = engine
		.orders()
		.submit_or_edit_requirements(order_id, caller, request.text, request.expected_version)
		.await
		.map_err(super::order_api_error)?;
	Ok(OrderResponse::for_caller(order, version, caller))
}

/// Returns the delivered artifact for an order.
pub async fn get_delivery(
	order_id: &str,
	caller: &User,
	engine: &StorefrontEngine,
) -> Result<DeliveryResponse, APIError> {
	super::validate_entity_id(order_id, "Order")?;
	let (order, _) = engine
		.orders()
		.get_order(order_id)
		.await
		.map_err(super::order_api_error)?;
	check_order_access(&order, caller)?;

	if order.delivery_status != DeliveryStatus::Delivered {
		return Err(APIError::NotFound {
			message: "No delivery is available for this order yet".to_string(),
		});
	}
	let artifact = order
		.delivery_artifact
		.ok_or_else(|| APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message: "Delivered order has no artifact attached".to_string(),
		})?;

	Ok(DeliveryResponse {
		order_id: order.id,
		artifact,
	})
}

fn check_order_access(order: &Order, caller: &User) -> Result<(), APIError> {
	if caller.role == UserRole::Admin || order.customer_id == caller.id {
		Ok(())
	} else {
		Err(APIError::Forbidden {
			error_type: "FORBIDDEN".to_string(),
			message: "You do not have access to this order".to_string(),
		})
	}
}
