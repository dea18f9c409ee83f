//! Business logic for the storefront REST API.
//!
//! Each submodule implements the processing behind one group of endpoints,
//! decoupled from the HTTP layer in `server`. Shared request plumbing,
//! actor resolution and the mapping from domain errors onto HTTP status
//! codes live here.

pub mod admin;
pub mod coupon;
pub mod order;
pub mod payment;
pub mod template;
pub mod user;

use storefront_engine::handlers::{OrderError, PaymentError, UserError};
use storefront_engine::state::{OrderStateError, TransitionError};
use storefront_engine::StorefrontEngine;
use storefront_types::{APIError, ActorRole, User, UserRole};
use uuid::Uuid;

/// Header carrying the authenticated caller's user id, set by the auth proxy.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Resolves the calling user from the actor header value.
///
/// Unknown ids and soft-deleted accounts are refused, so a deactivated
/// user holding a still-valid session cannot act.
pub async fn require_actor(
	engine: &StorefrontEngine,
	actor_id: Option<&str>,
) -> Result<User, APIError> {
	let actor_id = actor_id.ok_or_else(|| APIError::Forbidden {
		error_type: "MISSING_ACTOR".to_string(),
		message: format!("The {} header is required", ACTOR_HEADER),
	})?;

	engine
		.users()
		.resolve_actor(actor_id)
		.await
		.map_err(user_api_error)
}

/// Resolves the caller and additionally requires the admin role.
pub async fn require_admin(
	engine: &StorefrontEngine,
	actor_id: Option<&str>,
) -> Result<User, APIError> {
	let user = require_actor(engine, actor_id).await?;
	if user.role != UserRole::Admin {
		return Err(APIError::Forbidden {
			error_type: "ADMIN_ONLY".to_string(),
			message: "This endpoint requires an admin account".to_string(),
		});
	}
	Ok(user)
}

/// Role used when computing the caller's available actions.
pub fn role_of(user: &User) -> ActorRole {
	match user.role {
		UserRole::Admin => ActorRole::Admin,
		UserRole::Customer => ActorRole::Customer,
	}
}

/// Rejects ids that are not UUIDs before they reach the store.
pub fn validate_entity_id(id: &str, entity: &str) -> Result<(), APIError> {
	if Uuid::parse_str(id).is_err() {
		return Err(APIError::BadRequest {
			error_type: "INVALID_ID".to_string(),
			message: format!("{} id must be a valid UUID: {}", entity, id),
			details: None,
		});
	}
	Ok(())
}

/// Maps a transition refusal onto its HTTP classification.
pub fn transition_api_error(err: TransitionError) -> APIError {
	let message = err.to_string();
	match err {
		TransitionError::InvalidActor { .. } => APIError::Forbidden {
			error_type: "INVALID_ACTOR".to_string(),
			message,
		},
		TransitionError::InvalidState { .. } => APIError::Conflict {
			error_type: "INVALID_STATE".to_string(),
			message,
			details: None,
		},
		TransitionError::AlreadyTerminal { .. } => APIError::Conflict {
			error_type: "ALREADY_TERMINAL".to_string(),
			message,
			details: None,
		},
		TransitionError::ConcurrentModification => APIError::Conflict {
			error_type: "VERSION_CONFLICT".to_string(),
			message,
			details: None,
		},
		TransitionError::ValidationFailed { .. } => APIError::UnprocessableEntity {
			error_type: "VALIDATION_FAILED".to_string(),
			message,
			details: None,
		},
		TransitionError::GatewayVerificationFailed(_) => APIError::BadRequest {
			error_type: "VERIFICATION_FAILED".to_string(),
			message,
			details: None,
		},
	}
}

/// Maps state machine failures, including lookups, onto HTTP errors.
pub fn state_api_error(err: OrderStateError) -> APIError {
	match err {
		OrderStateError::NotFound(id) => APIError::NotFound {
			message: format!("Order not found: {}", id),
		},
		OrderStateError::Store(detail) => internal(format!("Store error: {}", detail)),
		OrderStateError::Transition(inner) => transition_api_error(inner),
	}
}

pub fn order_api_error(err: OrderError) -> APIError {
	match err {
		OrderError::Validation(message) => APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
			details: None,
		},
		OrderError::CouponRejected(message) => APIError::UnprocessableEntity {
			error_type: "COUPON_REJECTED".to_string(),
			message: message.to_string(),
			details: None,
		},
		OrderError::Store(detail) => internal(format!("Store error: {}", detail)),
		OrderError::Pricing(detail) => internal(format!("Pricing error: {}", detail)),
		OrderError::State(inner) => state_api_error(inner),
	}
}

pub fn payment_api_error(err: PaymentError) -> APIError {
	match err {
		PaymentError::Forbidden(message) => APIError::Forbidden {
			error_type: "FORBIDDEN".to_string(),
			message,
		},
		PaymentError::InvalidState(message) => APIError::Conflict {
			error_type: "INVALID_STATE".to_string(),
			message,
			details: None,
		},
		PaymentError::Validation(message) => APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
			details: None,
		},
		PaymentError::Gateway(message) => APIError::ServiceUnavailable {
			error_type: "GATEWAY_UNAVAILABLE".to_string(),
			message,
			retry_after: None,
		},
		PaymentError::Store(detail) => internal(format!("Store error: {}", detail)),
		PaymentError::State(inner) => state_api_error(inner),
	}
}

pub fn user_api_error(err: UserError) -> APIError {
	match err {
		UserError::Validation(message) => APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
			details: None,
		},
		UserError::Forbidden(message) => APIError::Forbidden {
			error_type: "FORBIDDEN".to_string(),
			message,
		},
		UserError::NotFound(id) => APIError::NotFound {
			message: format!("User not found: {}", id),
		},
		UserError::Conflict(message) => APIError::Conflict {
			error_type: "VERSION_CONFLICT".to_string(),
			message,
			details: None,
		},
		UserError::Store(detail) => internal(format!("Store error: {}", detail)),
	}
}

pub fn notify_api_error(err: storefront_notify::NotifyError) -> APIError {
	match err {
		storefront_notify::NotifyError::NotFound(id) => APIError::NotFound {
			message: format!("Alert not found: {}", id),
		},
		other => internal(other.to_string()),
	}
}

fn internal(message: String) -> APIError {
	APIError::InternalServerError {
		error_type: "INTERNAL_ERROR".to_string(),
		message,
	}
}

#[cfg(test)]
pub(crate) mod fixtures {
	use std::sync::Arc;
	use storefront_config::builders::ConfigBuilder;
	use storefront_engine::handlers::RegisterUserRequest;
	use storefront_engine::StorefrontEngine;
	use storefront_types::{User, UserRole};

	pub fn engine() -> Arc<StorefrontEngine> {
		let mut config = ConfigBuilder::new().build();
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

		Arc::new(crate::factory_registry::build_storefront_from_config(config).unwrap())
	}

	pub async fn register(engine: &StorefrontEngine, name: &str, role: UserRole) -> User {
		engine
			.users()
			.register(RegisterUserRequest {
				name: name.to_string(),
				email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
				role,
			})
			.await
			.unwrap()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use storefront_types::OrderActionKind;

	#[tokio::test]
	async fn missing_actor_header_is_forbidden() {
		let engine = fixtures::engine();

		let err = require_actor(&engine, None).await.unwrap_err();
		assert_eq!(err.status_code(), 403);
	}

	#[tokio::test]
	async fn unknown_actor_is_forbidden() {
		let engine = fixtures::engine();

		let err = require_actor(&engine, Some("nobody")).await.unwrap_err();
		assert_eq!(err.status_code(), 403);
	}

	#[tokio::test]
	async fn deleted_actor_is_forbidden() {
		let engine = fixtures::engine();
		let admin = fixtures::register(&engine, "Root", UserRole::Admin).await;
		let customer = fixtures::register(&engine, "Asha Rao", UserRole::Customer).await;
		engine
			.users()
			.soft_delete(&customer.id, &admin.id)
			.await
			.unwrap();

		let err = require_actor(&engine, Some(&customer.id))
			.await
			.unwrap_err();
		assert_eq!(err.status_code(), 403);
	}

	#[tokio::test]
	async fn customer_cannot_pass_the_admin_gate() {
		let engine = fixtures::engine();
		let customer = fixtures::register(&engine, "Asha Rao", UserRole::Customer).await;

		let err = require_admin(&engine, Some(&customer.id)).await.unwrap_err();
		assert_eq!(err.status_code(), 403);

		let resolved = require_actor(&engine, Some(&customer.id)).await.unwrap();
		assert_eq!(resolved.id, customer.id);
	}

	#[test]
	fn malformed_ids_map_to_bad_request() {
		let err = validate_entity_id("not-a-uuid", "Order").unwrap_err();
		assert_eq!(err.status_code(), 400);

		assert!(validate_entity_id("7f9c24e5-3f3c-4f7a-9f60-0d5b7c2a9d11", "Order").is_ok());
	}

	#[test]
	fn transition_errors_map_to_http_statuses() {
		let invalid_actor = TransitionError::InvalidActor {
			action: OrderActionKind::Accept,
			reason: "customers cannot accept orders".to_string(),
		};
		assert_eq!(transition_api_error(invalid_actor).status_code(), 403);

		let invalid_state = TransitionError::InvalidState {
			action: OrderActionKind::Accept,
			reason: "requirements not submitted".to_string(),
		};
		assert_eq!(transition_api_error(invalid_state).status_code(), 409);

		let terminal = TransitionError::AlreadyTerminal {
			action: OrderActionKind::Reject,
			reason: "order is rejected".to_string(),
		};
		assert_eq!(transition_api_error(terminal).status_code(), 409);

		assert_eq!(
			transition_api_error(TransitionError::ConcurrentModification).status_code(),
			409
		);

		let validation = TransitionError::ValidationFailed {
			action: OrderActionKind::SubmitRequirements,
			reason: "empty text".to_string(),
		};
		assert_eq!(transition_api_error(validation).status_code(), 422);

		let verification =
			TransitionError::GatewayVerificationFailed("bad signature".to_string());
		assert_eq!(transition_api_error(verification).status_code(), 400);
	}

	#[test]
	fn order_not_found_maps_to_404() {
		let err = state_api_error(OrderStateError::NotFound("ord-1".to_string()));
		assert_eq!(err.status_code(), 404);
	}

	#[test]
	fn coupon_rejection_maps_to_422() {
		let err = order_api_error(OrderError::CouponRejected("Invalid coupon code"));
		assert_eq!(err.status_code(), 422);
	}
}
