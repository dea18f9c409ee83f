//! Admin endpoints: order workflow actions, the alert feed and user
//! administration.

use super::order::OrderResponse;
use super::user::UserResponse;
use serde::{Deserialize, Serialize};
use storefront_engine::handlers::UpdateUserRequest;
use storefront_engine::StorefrontEngine;
use storefront_notify::AdminAlert;
use storefront_types::{APIError, Actor, DeliveryArtifact, OrderAction, User};

/// Body of `PATCH /api/admin/orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusPatchRequest {
	/// Requested action: `accept`, `reject`, `advance_in_progress` or
	/// `complete`.
	pub action: String,
	pub expected_version: Option<u64>,
	/// Artifact attached alongside `complete`; optional if one was
	/// uploaded earlier.
	#[serde(default)]
	pub artifact: Option<DeliveryArtifact>,
}

/// Body of `PATCH /api/admin/orders/{id}/delivery`.
#[derive(Debug, Deserialize)]
pub struct DeliveryPatchRequest {
	pub artifact: DeliveryArtifact,
	pub expected_version: Option<u64>,
}

/// Alert feed with its unread count.
#[derive(Debug, Serialize)]
pub struct AlertFeedResponse {
	pub alerts: Vec<AdminAlert>,
	pub unread: usize,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
	pub marked: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
	pub status: &'static str,
}

/// Lists every order, newest first.
pub async fn list_orders(
	admin: &User,
	engine: &StorefrontEngine,
) -> Result<Vec<OrderResponse>, APIError> {
	let orders = engine
		.orders()
		.list_all_orders()
		.await
		.map_err(super::order_api_error)?;
	Ok(orders
		.into_iter()
		.map(|(order, version)| OrderResponse::for_caller(order, version, admin))
		.collect())
}

/// Applies a developer-axis action requested from the admin dashboard.
///
/// Payment is recorded exclusively through the gateway callback and
/// delivery uploads have their own endpoint, so neither can be requested
/// here.
pub async fn patch_status(
	order_id: &str,
	request: StatusPatchRequest,
	admin: &User,
	engine: &StorefrontEngine,
) -> Result<OrderResponse, APIError> {
	super::validate_entity_id(order_id, "Order")?;

	let action = match request.action.as_str() {
		"accept" => OrderAction::Accept,
		"reject" => OrderAction::Reject,
		"advance_in_progress" => OrderAction::AdvanceInProgress,
		"complete" => OrderAction::Complete {
			artifact: request.artifact,
		},
		other => {
			return Err(APIError::BadRequest {
				error_type: "UNKNOWN_ACTION".to_string(),
				message: format!("Unknown status action '{}'", other),
				details: None,
			})
		},
	};

	let actor = Actor::Admin {
		id: admin.id.clone(),
	};
	let outcome = engine
		.orders()
		.apply_action(order_id, action, &actor, request.expected_version)
		.await
		.map_err(super::order_api_error)?;
	Ok(OrderResponse::for_caller(
		outcome.order,
		outcome.version,
		admin,
	))
}

/// Attaches a delivery artifact to an order in progress.
pub async fn patch_delivery(
	order_id: &str,
	request: DeliveryPatchRequest,
	admin: &User,
	engine: &StorefrontEngine,
) -> Result<OrderResponse, APIError> {
	super::validate_entity_id(order_id, "Order")?;

	let actor = Actor::Admin {
		id: admin.id.clone(),
	};
	let outcome = engine
		.orders()
		.apply_action(
			order_id,
			OrderAction::UploadDelivery {
				artifact: request.artifact,
			},
			&actor,
			request.expected_version,
		)
		.await
		.map_err(super::order_api_error)?;
	Ok(OrderResponse::for_caller(
		outcome.order,
		outcome.version,
		admin,
	))
}

/// Lists the alert feed, newest first, with the unread count.
pub async fn list_alerts(engine: &StorefrontEngine) -> Result<AlertFeedResponse, APIError> {
	let alerts = engine
		.notify()
		.list()
		.await
		.map_err(super::notify_api_error)?;
	let unread = engine
		.notify()
		.unread_count()
		.await
		.map_err(super::notify_api_error)?;
	Ok(AlertFeedResponse { alerts, unread })
}

/// Marks one alert as read.
pub async fn mark_alert_read(
	alert_id: &str,
	engine: &StorefrontEngine,
) -> Result<StatusResponse, APIError> {
	super::validate_entity_id(alert_id, "Alert")?;
	engine
		.notify()
		.mark_read(alert_id)
		.await
		.map_err(super::notify_api_error)?;
	Ok(StatusResponse { status: "ok" })
}

/// Marks every alert as read.
pub async fn mark_all_alerts_read(
	engine: &StorefrontEngine,
) -> Result<MarkAllReadResponse, APIError> {
	let marked = engine
		.notify()
		.mark_all_read()
		.await
		.map_err(super::notify_api_error)?;
	Ok(MarkAllReadResponse { marked })
}

/// Clears the alert feed.
pub async fn clear_alerts(engine: &StorefrontEngine) -> Result<StatusResponse, APIError> {
	engine
		.notify()
		.clear()
		.await
		.map_err(super::notify_api_error)?;
	Ok(StatusResponse { status: "cleared" })
}

/// Lists every user, newest first.
pub async fn list_users(engine: &StorefrontEngine) -> Result<Vec<UserResponse>, APIError> {
	let users = engine
		.users()
		.list()
		.await
		.map_err(super::user_api_error)?;
	Ok(users
		.into_iter()
		.map(|(user, version)| UserResponse { user, version })
		.collect())
}

/// Fetches one user record.
pub async fn get_user(user_id: &str, engine: &StorefrontEngine) -> Result<UserResponse, APIError> {
	super::validate_entity_id(user_id, "User")?;
	let (user, version) = engine
		.users()
		.get(user_id)
		.await
		.map_err(super::user_api_error)?;
	Ok(UserResponse { user, version })
}

/// Updates a user's profile fields.
pub async fn update_user(
	user_id: &str,
	request: UpdateUserRequest,
	engine: &StorefrontEngine,
) -> Result<UserResponse, APIError> {
	super::validate_entity_id(user_id, "User")?;
	let (user, version) = engine
		.users()
		.update(user_id, request)
		.await
		.map_err(super::user_api_error)?;
	Ok(UserResponse { user, version })
}

/// Soft-deletes a user account.
pub async fn delete_user(
	user_id: &str,
	admin: &User,
	engine: &StorefrontEngine,
) -> Result<UserResponse, APIError> {
	super::validate_entity_id(user_id, "User")?;
	let (user, version) = engine
		.users()
		.soft_delete(user_id, &admin.id)
		.await
		.map_err(super::user_api_error)?;
	Ok(UserResponse { user, version })
}

/// Restores a soft-deleted user account.
pub async fn restore_user(
	user_id: &str,
	engine: &StorefrontEngine,
) -> Result<UserResponse, APIError> {
	super::validate_entity_id(user_id, "User")?;
	let (user, version) = engine
		.users()
		.restore(user_id)
		.await
		.map_err(super::user_api_error)?;
	Ok(UserResponse { user, version })
}
