//! HTTP server for the storefront API.
//!
//! This module provides the axum server infrastructure for the storefront
//! API: routing, CORS, actor-header extraction and the thin handlers that
//! delegate to the processing functions in [`crate::apis`].

use axum::{
	extract::{Path, State},
	http::HeaderMap,
	response::Json,
	routing::{delete, get, patch, post, put},
	Router,
};
use std::sync::Arc;
use storefront_config::ApiConfig;
use storefront_engine::handlers::{CreateOrderRequest, RegisterUserRequest, UpdateUserRequest};
use storefront_engine::StorefrontEngine;
use storefront_gateway::PaymentConfirmation;
use storefront_types::{APIError, User};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::apis;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the storefront engine for processing requests.
	pub engine: Arc<StorefrontEngine>,
}

/// Starts the HTTP server for the API.
///
/// This function creates and configures the HTTP server with routing,
/// middleware, and error handling for all storefront endpoints.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<StorefrontEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { engine });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Storefront API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Builds the router with the /api base path.
fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/templates", get(handle_list_templates))
				.route(
					"/orders",
					post(handle_create_order).get(handle_list_orders),
				)
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/requirements", put(handle_put_requirements))
				.route("/orders/{id}/checkout", post(handle_checkout))
				.route("/orders/{id}/delivery", get(handle_get_delivery))
				.route("/payments/confirm", post(handle_confirm_payment))
				.route("/coupons/validate", post(handle_validate_coupon))
				.route("/users", post(handle_register_user))
				.route("/users/profile", get(handle_profile))
				.route("/admin/orders", get(handle_admin_list_orders))
				.route("/admin/orders/{id}/status", patch(handle_patch_status))
				.route("/admin/orders/{id}/delivery", patch(handle_patch_delivery))
				.route(
					"/admin/alerts",
					get(handle_list_alerts).delete(handle_clear_alerts),
				)
				.route("/admin/alerts/{id}/read", post(handle_mark_alert_read))
				.route("/admin/alerts/read-all", post(handle_mark_all_alerts_read))
				.route("/admin/users", get(handle_admin_list_users))
				.route(
					"/admin/users/{id}",
					get(handle_admin_get_user)
						.put(handle_admin_update_user)
						.delete(handle_admin_delete_user),
				)
				.route("/admin/users/{id}/restore", patch(handle_admin_restore_user)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Extracts the acting user id from the request headers.
fn actor_id(headers: &HeaderMap) -> Option<&str> {
	headers
		.get(apis::ACTOR_HEADER)
		.and_then(|value| value.to_str().ok())
}

/// Handles GET /api/templates requests. The catalog is public.
async fn handle_list_templates(
	State(state): State<AppState>,
) -> Json<apis::template::TemplateListResponse> {
	Json(apis::template::list_templates(&state.engine))
}

/// Handles POST /api/orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<CreateOrderRequest>,
) -> Result<Json<apis::order::OrderResponse>, APIError> {
	let caller = apis::require_actor(&state.engine, actor_id(&headers)).await?;
	match apis::order::create_order(request, &caller, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Order creation failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/orders requests, scoped to the calling customer.
async fn handle_list_orders(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Vec<apis::order::OrderResponse>>, APIError> {
	let caller = apis::require_actor(&state.engine, actor_id(&headers)).await?;
	match apis::order::list_orders(&caller, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Order listing failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::order::OrderResponse>, APIError> {
	let caller = apis::require_actor(&state.engine, actor_id(&headers)).await?;
	match apis::order::get_order(&id, &caller, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Order retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles PUT /api/orders/{id}/requirements requests.
async fn handle_put_requirements(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<apis::order::RequirementsRequest>,
) -> Result<Json<apis::order::OrderResponse>, APIError> {
	let caller = apis::require_actor(&state.engine, actor_id(&headers)).await?;
	match apis::order::put_requirements(&id, request, &caller, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Requirements update failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/orders/{id}/checkout requests.
async fn handle_checkout(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::payment::CheckoutResponse>, APIError> {
	let caller = apis::require_actor(&state.engine, actor_id(&headers)).await?;
	match apis::payment::open_checkout(&id, &caller, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Checkout failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/orders/{id}/delivery requests.
async fn handle_get_delivery(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::order::DeliveryResponse>, APIError> {
	let caller = apis::require_actor(&state.engine, actor_id(&headers)).await?;
	match apis::order::get_delivery(&id, &caller, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Delivery retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/payments/confirm requests.
///
/// This endpoint is called by the payment gateway redirect flow rather than
/// a signed-in user, so no actor header is required; the HMAC signature in
/// the body authenticates the confirmation.
async fn handle_confirm_payment(
	State(state): State<AppState>,
	Json(confirmation): Json<PaymentConfirmation>,
) -> Result<Json<apis::payment::ConfirmResponse>, APIError> {
	match apis::payment::confirm_payment(confirmation, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Payment confirmation failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/coupons/validate requests.
async fn handle_validate_coupon(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<apis::coupon::ValidateCouponRequest>,
) -> Result<Json<apis::coupon::ValidateCouponResponse>, APIError> {
	let caller = apis::require_actor(&state.engine, actor_id(&headers)).await?;
	match apis::coupon::validate_coupon(request, &caller, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Coupon validation failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/users requests.
///
/// This endpoint is called by the external auth service after signup, so
/// the caller is not resolved against the user store.
async fn handle_register_user(
	State(state): State<AppState>,
	Json(request): Json<RegisterUserRequest>,
) -> Result<Json<User>, APIError> {
	match apis::user::register_user(request, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("User registration failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/users/profile requests.
async fn handle_profile(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::user::UserResponse>, APIError> {
	let caller = apis::require_actor(&state.engine, actor_id(&headers)).await?;
	match apis::user::profile(&caller, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Profile retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/admin/orders requests.
async fn handle_admin_list_orders(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Vec<apis::order::OrderResponse>>, APIError> {
	let admin = apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::list_orders(&admin, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Admin order listing failed: {}", e);
			Err(e)
		},
	}
}

/// Handles PATCH /api/admin/orders/{id}/status requests.
async fn handle_patch_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<apis::admin::StatusPatchRequest>,
) -> Result<Json<apis::order::OrderResponse>, APIError> {
	let admin = apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::patch_status(&id, request, &admin, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Status update failed: {}", e);
			Err(e)
		},
	}
}

/// Handles PATCH /api/admin/orders/{id}/delivery requests.
async fn handle_patch_delivery(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<apis::admin::DeliveryPatchRequest>,
) -> Result<Json<apis::order::OrderResponse>, APIError> {
	let admin = apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::patch_delivery(&id, request, &admin, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Delivery upload failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/admin/alerts requests.
async fn handle_list_alerts(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::admin::AlertFeedResponse>, APIError> {
	apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::list_alerts(&state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Alert listing failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/admin/alerts/{id}/read requests.
async fn handle_mark_alert_read(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::admin::StatusResponse>, APIError> {
	apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::mark_alert_read(&id, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Alert read-marking failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/admin/alerts/read-all requests.
async fn handle_mark_all_alerts_read(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::admin::MarkAllReadResponse>, APIError> {
	apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::mark_all_alerts_read(&state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Alert read-all failed: {}", e);
			Err(e)
		},
	}
}

/// Handles DELETE /api/admin/alerts requests.
async fn handle_clear_alerts(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::admin::StatusResponse>, APIError> {
	apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::clear_alerts(&state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Alert clearing failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/admin/users requests.
async fn handle_admin_list_users(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Vec<apis::user::UserResponse>>, APIError> {
	apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::list_users(&state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("User listing failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/admin/users/{id} requests.
async fn handle_admin_get_user(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::user::UserResponse>, APIError> {
	apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::get_user(&id, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("User retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles PUT /api/admin/users/{id} requests.
async fn handle_admin_update_user(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<UpdateUserRequest>,
) -> Result<Json<apis::user::UserResponse>, APIError> {
	apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::update_user(&id, request, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("User update failed: {}", e);
			Err(e)
		},
	}
}

/// Handles DELETE /api/admin/users/{id} requests.
async fn handle_admin_delete_user(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::user::UserResponse>, APIError> {
	let admin = apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::delete_user(&id, &admin, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("User deletion failed: {}", e);
			Err(e)
		},
	}
}

/// Handles PATCH /api/admin/users/{id}/restore requests.
async fn handle_admin_restore_user(
	Path(id): Path<String>,
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<apis::user::UserResponse>, APIError> {
	apis::require_admin(&state.engine, actor_id(&headers)).await?;
	match apis::admin::restore_user(&id, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("User restore failed: {}", e);
			Err(e)
		},
	}
}
