//! User handler for the storefront engine.
//!
//! Authentication lives upstream; this handler owns the stored profiles,
//! the actor resolution every API request goes through, and the admin
//! management operations. Accounts are soft-deleted so order ownership
//! stays resolvable after closure.

use serde::Deserialize;
use std::sync::Arc;
use storefront_store::{StoreError, StoreService};
use storefront_types::{
	current_timestamp, truncate_id, AccountStatus, StoreNamespace, User, UserRole,
};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Errors that can occur while handling users.
#[derive(Debug, Error)]
pub enum UserError {
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Forbidden: {0}")]
	Forbidden(String),
	#[error("User not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Store error: {0}")]
	Store(String),
}

/// Request to register a user, posted by the auth service after signup.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
	pub name: String,
	pub email: String,
	#[serde(default = "default_role")]
	pub role: UserRole,
}

fn default_role() -> UserRole {
	UserRole::Customer
}

/// Admin request to update a user's profile fields.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
}

/// Handles user registration, resolution and admin management.
pub struct UserHandler {
	store: Arc<StoreService>,
}

impl UserHandler {
	pub fn new(store: Arc<StoreService>) -> Self {
		Self { store }
	}

	/// Registers a new user record.
	#[instrument(skip_all, fields(role = %request.role))]
	pub async fn register(&self, request: RegisterUserRequest) -> Result<User, UserError> {
		validate_name(&request.name)?;
		validate_email(&request.email)?;

		let now = current_timestamp();
		let user = User {
			id: Uuid::new_v4().to_string(),
			name: request.name.trim().to_string(),
			email: request.email.trim().to_string(),
			role: request.role,
			status: AccountStatus::Active,
			created_at: now,
			updated_at: now,
		};

		self.store
			.create(StoreNamespace::Users, &user.id, &user)
			.await
			.map_err(|e| UserError::Store(e.to_string()))?;

		debug!(user_id = %truncate_id(&user.id), "User registered");
		Ok(user)
	}

	/// Fetches a user with the record's store revision.
	pub async fn get(&self, user_id: &str) -> Result<(User, u64), UserError> {
		self.store
			.fetch::<User>(StoreNamespace::Users, user_id)
			.await
			.map_err(|e| match e {
				StoreError::NotFound => UserError::NotFound(user_id.to_string()),
				other => UserError::Store(other.to_string()),
			})
	}

	/// Resolves the acting user for a request.
	///
	/// Unknown ids and soft-deleted accounts both resolve to forbidden; a
	/// closed account keeps its data but loses the ability to act.
	pub async fn resolve_actor(&self, user_id: &str) -> Result<User, UserError> {
		let (user, _) = match self.get(user_id).await {
			Ok(found) => found,
			Err(UserError::NotFound(_)) => {
				return Err(UserError::Forbidden("Unknown actor".to_string()));
			},
			Err(e) => return Err(e),
		};
		if !user.is_active() {
			return Err(UserError::Forbidden(
				"Account has been deactivated".to_string(),
			));
		}
		Ok(user)
	}

	/// Lists every user record, newest first.
	pub async fn list(&self) -> Result<Vec<(User, u64)>, UserError> {
		let ids = self
			.store
			.list_ids(StoreNamespace::Users)
			.await
			.map_err(|e| UserError::Store(e.to_string()))?;

		let mut users = Vec::with_capacity(ids.len());
		for id in ids {
			match self.store.fetch::<User>(StoreNamespace::Users, &id).await {
				Ok(entry) => users.push(entry),
				Err(StoreError::NotFound) => continue,
				Err(e) => return Err(UserError::Store(e.to_string())),
			}
		}
		users.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
		Ok(users)
	}

	/// Updates profile fields on a user record.
	#[instrument(skip_all, fields(user_id = %truncate_id(user_id)))]
	pub async fn update(
		&self,
		user_id: &str,
		request: UpdateUserRequest,
	) -> Result<(User, u64), UserError> {
		let (mut user, revision) = self.get(user_id).await?;

		if let Some(name) = request.name {
			validate_name(&name)?;
			user.name = name.trim().to_string();
		}
		if let Some(email) = request.email {
			validate_email(&email)?;
			user.email = email.trim().to_string();
		}
		user.updated_at = current_timestamp();

		let version = self.put_if(user_id, &user, revision).await?;
		Ok((user, version))
	}

	/// Soft-deletes a user. Admins cannot close their own account, so the
	/// storefront can never lock out its last administrator.
	#[instrument(skip_all, fields(user_id = %truncate_id(user_id)))]
	pub async fn soft_delete(
		&self,
		user_id: &str,
		acting_admin_id: &str,
	) -> Result<(User, u64), UserError> {
		if user_id == acting_admin_id {
			return Err(UserError::Forbidden(
				"Admins cannot delete their own account".to_string(),
			));
		}

		let (mut user, revision) = self.get(user_id).await?;
		if user.status == AccountStatus::Deleted {
			return Ok((user, revision));
		}

		user.status = AccountStatus::Deleted;
		user.updated_at = current_timestamp();

		let version = self.put_if(user_id, &user, revision).await?;
		debug!("User soft-deleted");
		Ok((user, version))
	}

	/// Restores a soft-deleted user to active.
	#[instrument(skip_all, fields(user_id = %truncate_id(user_id)))]
	pub async fn restore(&self, user_id: &str) -> Result<(User, u64), UserError> {
		let (mut user, revision) = self.get(user_id).await?;
		if user.status == AccountStatus::Active {
			return Ok((user, revision));
		}

		user.status = AccountStatus::Active;
		user.updated_at = current_timestamp();

		let version = self.put_if(user_id, &user, revision).await?;
		debug!("User restored");
		Ok((user, version))
	}

	async fn put_if(&self, user_id: &str, user: &User, revision: u64) -> Result<u64, UserError> {
		self.store
			.put_if(StoreNamespace::Users, user_id, user, revision)
			.await
			.map_err(|e| match e {
				StoreError::VersionConflict { .. } => UserError::Conflict(
					"User record was modified concurrently, retry".to_string(),
				),
				other => UserError::Store(other.to_string()),
			})
	}
}

fn validate_name(name: &str) -> Result<(), UserError> {
	if name.trim().is_empty() {
		return Err(UserError::Validation("Name must not be empty".to_string()));
	}
	Ok(())
}

fn validate_email(email: &str) -> Result<(), UserError> {
	let email = email.trim();
	if email.is_empty() || !email.contains('@') {
		return Err(UserError::Validation(format!(
			"'{}' is not a valid email address",
			email
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use storefront_store::implementations::memory::MemoryStore;

	fn handler() -> UserHandler {
		UserHandler::new(Arc::new(StoreService::new(Box::new(MemoryStore::new()))))
	}

	fn register_request(name: &str, role: UserRole) -> RegisterUserRequest {
		RegisterUserRequest {
			name: name.to_string(),
			email: format!("{}@example.com", name.to_lowercase()),
			role,
		}
	}

	#[tokio::test]
	async fn registers_and_resolves_a_customer() {
		let handler = handler();
		let user = handler
			.register(register_request("Asha", UserRole::Customer))
			.await
			.unwrap();

		let resolved = handler.resolve_actor(&user.id).await.unwrap();
		assert_eq!(resolved.name, "Asha");
		assert_eq!(resolved.role, UserRole::Customer);
		assert!(resolved.is_active());
	}

	#[tokio::test]
	async fn rejects_blank_name_and_bad_email() {
		let handler = handler();

		let err = handler
			.register(RegisterUserRequest {
				name: "   ".to_string(),
				email: "asha@example.com".to_string(),
				role: UserRole::Customer,
			})
			.await
			.unwrap_err();
		assert!(matches!(err, UserError::Validation(_)));

		let err = handler
			.register(RegisterUserRequest {
				name: "Asha".to_string(),
				email: "not-an-email".to_string(),
				role: UserRole::Customer,
			})
			.await
			.unwrap_err();
		assert!(matches!(err, UserError::Validation(_)));
	}

	#[tokio::test]
	async fn unknown_actor_is_forbidden() {
		let handler = handler();
		let err = handler.resolve_actor("ghost").await.unwrap_err();
		assert!(matches!(err, UserError::Forbidden(_)));
	}

	#[tokio::test]
	async fn soft_delete_blocks_acting_and_restore_reverses_it() {
		let handler = handler();
		let admin = handler
			.register(register_request("Root", UserRole::Admin))
			.await
			.unwrap();
		let user = handler
			.register(register_request("Asha", UserRole::Customer))
			.await
			.unwrap();

		let (deleted, _) = handler.soft_delete(&user.id, &admin.id).await.unwrap();
		assert_eq!(deleted.status, AccountStatus::Deleted);

		let err = handler.resolve_actor(&user.id).await.unwrap_err();
		assert!(matches!(err, UserError::Forbidden(_)));

		// The record itself survives for ownership lookups.
		let (kept, _) = handler.get(&user.id).await.unwrap();
		assert_eq!(kept.name, "Asha");

		let (restored, _) = handler.restore(&user.id).await.unwrap();
		assert_eq!(restored.status, AccountStatus::Active);
		assert!(handler.resolve_actor(&user.id).await.is_ok());
	}

	#[tokio::test]
	async fn admins_cannot_delete_themselves() {
		let handler = handler();
		let admin = handler
			.register(register_request("Root", UserRole::Admin))
			.await
			.unwrap();

		let err = handler
			.soft_delete(&admin.id, &admin.id)
			.await
			.unwrap_err();
		assert!(matches!(err, UserError::Forbidden(_)));

		let (unchanged, _) = handler.get(&admin.id).await.unwrap();
		assert_eq!(unchanged.status, AccountStatus::Active);
	}

	#[tokio::test]
	async fn update_rewrites_profile_fields() {
		let handler = handler();
		let user = handler
			.register(register_request("Asha", UserRole::Customer))
			.await
			.unwrap();

		let (updated, version) = handler
			.update(
				&user.id,
				UpdateUserRequest {
					name: Some("Asha Rao".to_string()),
					email: None,
				},
			)
			.await
			.unwrap();

		assert_eq!(updated.name, "Asha Rao");
		assert_eq!(updated.email, user.email);
		assert_eq!(version, 2);
	}

	#[tokio::test]
	async fn deleting_a_missing_user_is_not_found() {
		let handler = handler();
		let err = handler
			.soft_delete("ghost", "admin-1")
			.await
			.unwrap_err();
		assert!(matches!(err, UserError::NotFound(_)));
	}
}
