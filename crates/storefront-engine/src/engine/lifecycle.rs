//! Engine lifecycle management.

use super::{EngineError, StorefrontEngine};
use tracing::{info, warn};

impl StorefrontEngine {
	/// Prepares the engine for serving requests.
	///
	/// Drops store entries that expired while the process was down, such as
	/// stale checkout sessions, and logs the effective component selection.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let removed = self
			.store
			.cleanup_expired()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;
		if removed > 0 {
			info!(removed, "Dropped expired entries left from a previous run");
		}

		info!(
			store = %self.config.store.primary,
			gateway = %self.config.gateway.primary,
			pricing = %self.config.pricing.primary,
			notify = %self.config.notify.primary,
			templates = self.config.catalog.templates.len(),
			"Engine initialized"
		);
		Ok(())
	}

	/// Gracefully shuts the engine down.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		if let Err(e) = self.store.cleanup_expired().await {
			warn!("Final store cleanup failed: {}", e);
		}
		info!("Engine shut down");
		Ok(())
	}
}
