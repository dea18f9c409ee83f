//! Notification module for the storefront backend.
//!
//! This module provides the admin alert feed: short records surfaced to
//! administrators when customers submit requirements or payments land.
//! Implementations decide where the feed lives; the bundled one keeps a
//! capacity-bounded list in memory. It follows the same trait-based pattern
//! as the other storefront components.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use storefront_types::{ConfigSchema, ImplementationRegistry};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod feed;
}

/// Errors that can occur during notification operations.
#[derive(Debug, Error)]
pub enum NotifyError {
	/// Error that occurs when a referenced alert does not exist.
	#[error("Alert not found: {0}")]
	NotFound(String),
	/// Error that occurs in the notification backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
	/// A customer submitted or edited requirements.
	RequirementsUpdate,
	/// A payment was captured for an order.
	PaymentReceived,
}

/// One entry in the admin alert feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAlert {
	/// Unique identifier of this alert.
	pub id: String,
	/// What happened.
	pub kind: AlertKind,
	/// Human-readable summary shown in the feed.
	pub message: String,
	/// Display name of the customer involved.
	pub user_name: String,
	/// Display name of the ordered template or build.
	pub template_name: String,
	/// Order the alert refers to.
	pub order_id: String,
	/// When the underlying event happened.
	pub timestamp: u64,
	/// Whether an admin has seen this alert.
	pub read: bool,
}

/// Trait defining the interface for notification implementations.
///
/// This trait must be implemented by any alert feed that wants to integrate
/// with the storefront system.
#[async_trait]
pub trait NotificationInterface: Send + Sync {
	/// Returns the configuration schema for this notification implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Appends an alert to the feed.
	async fn push(&self, alert: AdminAlert) -> Result<(), NotifyError>;

	/// Returns all alerts, newest first.
	async fn list(&self) -> Result<Vec<AdminAlert>, NotifyError>;

	/// Marks a single alert as read.
	async fn mark_read(&self, alert_id: &str) -> Result<(), NotifyError>;

	/// Marks every alert as read, returning how many were unread.
	async fn mark_all_read(&self) -> Result<usize, NotifyError>;

	/// Removes all alerts from the feed.
	async fn clear(&self) -> Result<(), NotifyError>;

	/// Number of unread alerts.
	async fn unread_count(&self) -> Result<usize, NotifyError>;
}

/// Type alias for notification factory functions.
///
/// This is the function signature that all notification implementations must
/// provide to create instances of their notification interface.
pub type NotificationFactory =
	fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotifyError>;

/// Registry trait for notification implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// notification implementations must provide a NotificationFactory.
pub trait NotificationRegistry: ImplementationRegistry<Factory = NotificationFactory> {}

/// Get all registered notification implementations.
///
/// Returns a vector of (name, factory) tuples for all available notification
/// implementations. This is used by the factory registry to automatically
/// register all implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotificationFactory)> {
	use implementations::feed;

	vec![(feed::Registry::NAME, feed::Registry::factory())]
}

/// Service that manages alert feeds with multiple implementations.
///
/// The NotificationService coordinates between different notification
/// implementations and provides a unified interface for the alert feed.
pub struct NotificationService {
	/// Map of implementation names to their interfaces.
	implementations: HashMap<String, Arc<dyn NotificationInterface>>,
	/// The primary implementation backing the feed.
	primary_implementation: String,
}

impl NotificationService {
	/// Creates a new NotificationService with the given implementations.
	///
	/// # Arguments
	///
	/// * `implementations` - Map of implementation names to their interfaces
	/// * `primary_implementation` - The name of the primary implementation to use
	pub fn new(
		implementations: HashMap<String, Arc<dyn NotificationInterface>>,
		primary_implementation: String,
	) -> Result<Self, NotifyError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(NotifyError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	fn primary(&self) -> Result<&Arc<dyn NotificationInterface>, NotifyError> {
		self.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				NotifyError::Backend(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})
	}

	/// Appends an alert to the feed.
	pub async fn push(&self, alert: AdminAlert) -> Result<(), NotifyError> {
		self.primary()?.push(alert).await
	}

	/// Returns all alerts, newest first.
	pub async fn list(&self) -> Result<Vec<AdminAlert>, NotifyError> {
		self.primary()?.list().await
	}

	/// Marks a single alert as read.
	pub async fn mark_read(&self, alert_id: &str) -> Result<(), NotifyError> {
		self.primary()?.mark_read(alert_id).await
	}

	/// Marks every alert as read, returning how many were unread.
	pub async fn mark_all_read(&self) -> Result<usize, NotifyError> {
		self.primary()?.mark_all_read().await
	}

	/// Removes all alerts from the feed.
	pub async fn clear(&self) -> Result<(), NotifyError> {
		self.primary()?.clear().await
	}

	/// Number of unread alerts.
	pub async fn unread_count(&self) -> Result<usize, NotifyError> {
		self.primary()?.unread_count().await
	}
}
