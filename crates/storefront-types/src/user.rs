//! User account types.
//!
//! Authentication happens upstream; the backend stores the profile and the
//! role used for authorization decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered user of the storefront.
///
/// Users are soft-deleted rather than removed so order ownership stays
/// resolvable after an account is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	/// Unique identifier for this user.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Contact email.
	pub email: String,
	/// Authorization role.
	pub role: UserRole,
	/// Whether the account is active or soft-deleted.
	#[serde(default)]
	pub status: AccountStatus,
	/// Timestamp when this user was registered.
	pub created_at: u64,
	/// Timestamp when this user was last updated.
	pub updated_at: u64,
}

impl User {
	/// True when the account may act on the API.
	pub fn is_active(&self) -> bool {
		self.status == AccountStatus::Active
	}
}

/// Authorization role of a user. Every user has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
	Customer,
	Admin,
}

impl fmt::Display for UserRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			UserRole::Customer => write!(f, "customer"),
			UserRole::Admin => write!(f, "admin"),
		}
	}
}

/// Soft-deletion state of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
	/// Account may log in and act.
	#[default]
	Active,
	/// Account is soft-deleted; requests resolve to forbidden.
	Deleted,
}

impl fmt::Display for AccountStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AccountStatus::Active => write!(f, "active"),
			AccountStatus::Deleted => write!(f, "deleted"),
		}
	}
}
