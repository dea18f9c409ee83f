//! User endpoints: registration and the caller's own profile.

use serde::Serialize;
use storefront_engine::handlers::RegisterUserRequest;
use storefront_engine::StorefrontEngine;
use storefront_types::{APIError, User};

/// User representation returned where concurrent edits matter.
#[derive(Debug, Serialize)]
pub struct UserResponse {
	#[serde(flatten)]
	pub user: User,
	pub version: u64,
}

/// Registers a user record. The external auth service calls this after
/// signup, so the caller is not resolved against the user store.
pub async fn register_user(
	request: RegisterUserRequest,
	engine: &StorefrontEngine,
) -> Result<User, APIError> {
	engine
		.users()
		.register(request)
		.await
		.map_err(super::user_api_error)
}

/// Returns the calling user's record.
pub async fn profile(caller: &User, engine: &StorefrontEngine) -> Result<UserResponse, APIError> {
	let (user, version) = engine
		.users()
		.get(&caller.id)
		.await
		.map_err(super::user_api_error)?;
	Ok(UserResponse { user, version })
}
