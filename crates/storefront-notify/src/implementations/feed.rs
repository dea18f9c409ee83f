//! In-memory alert feed implementation.
//!
//! Keeps the newest alerts in a capacity-bounded deque; when the feed is
//! full the oldest alerts fall off the end. Suitable for a single-instance
//! deployment where alerts are advisory and may be lost on restart.

use crate::{
	AdminAlert, NotificationFactory, NotificationInterface, NotificationRegistry, NotifyError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use storefront_types::{ConfigSchema, ImplementationRegistry, ValidationError};
use tokio::sync::RwLock;

/// Configuration for the in-memory alert feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
	/// Maximum number of alerts retained; the oldest are evicted first.
	#[serde(default = "default_capacity")]
	pub capacity: usize,
}

fn default_capacity() -> usize {
	200
}

impl Default for FeedConfig {
	fn default() -> Self {
		Self {
			capacity: default_capacity(),
		}
	}
}

impl ConfigSchema for FeedConfig {
	fn validate(&self, _config: &toml::value::Value) -> Result<(), ValidationError> {
		if self.capacity == 0 {
			return Err(ValidationError::InvalidValue {
				field: "capacity".to_string(),
				message: "Feed capacity must be greater than 0".to_string(),
			});
		}
		Ok(())
	}
}

/// In-memory alert feed, newest alerts at the front.
pub struct MemoryFeed {
	config: FeedConfig,
	alerts: Arc<RwLock<VecDeque<AdminAlert>>>,
}

impl MemoryFeed {
	/// Creates a new feed with the given configuration.
	pub fn new(config: FeedConfig) -> Self {
		Self {
			config,
			alerts: Arc::new(RwLock::new(VecDeque::new())),
		}
	}
}

#[async_trait]
impl NotificationInterface for MemoryFeed {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(self.config.clone())
	}

	async fn push(&self, alert: AdminAlert) -> Result<(), NotifyError> {
		let mut alerts = self.alerts.write().await;
		alerts.push_front(alert);
		alerts.truncate(self.config.capacity);
		Ok(())
	}

	async fn list(&self) -> Result<Vec<AdminAlert>, NotifyError> {
		let alerts = self.alerts.read().await;
		Ok(alerts.iter().cloned().collect())
	}

	async fn mark_read(&self, alert_id: &str) -> Result<(), NotifyError> {
		let mut alerts = self.alerts.write().await;
		match alerts.iter_mut().find(|alert| alert.id == alert_id) {
			Some(alert) => {
				alert.read = true;
				Ok(())
			},
			None => Err(NotifyError::NotFound(alert_id.to_string())),
		}
	}

	async fn mark_all_read(&self) -> Result<usize, NotifyError> {
		let mut alerts = self.alerts.write().await;
		let mut marked = 0;
		for alert in alerts.iter_mut() {
			if !alert.read {
				alert.read = true;
				marked += 1;
			}
		}
		Ok(marked)
	}

	async fn clear(&self) -> Result<(), NotifyError> {
		let mut alerts = self.alerts.write().await;
		alerts.clear();
		Ok(())
	}

	async fn unread_count(&self) -> Result<usize, NotifyError> {
		let alerts = self.alerts.read().await;
		Ok(alerts.iter().filter(|alert| !alert.read).count())
	}
}

/// Factory function to create an in-memory alert feed from configuration.
///
/// Optional configuration parameters:
/// - `capacity`: Maximum number of retained alerts (default: 200)
pub fn create_feed(config: &toml::Value) -> Result<Box<dyn NotificationInterface>, NotifyError> {
	let feed_config: FeedConfig = config
		.clone()
		.try_into()
		.map_err(|e| NotifyError::Configuration(format!("Invalid feed config: {}", e)))?;

	feed_config
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;

	Ok(Box::new(MemoryFeed::new(feed_config)))
}

/// Registry for the in-memory alert feed implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "feed";
	type Factory = NotificationFactory;

	fn factory() -> Self::Factory {
		create_feed
	}
}

impl NotificationRegistry for Registry {}
