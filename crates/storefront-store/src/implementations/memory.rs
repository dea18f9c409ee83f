//! In-memory store backend implementation for the storefront service.
//!
//! This module provides a memory-based implementation of the StoreInterface trait,
//! useful for testing and development scenarios where persistence is not required.
//! Unlike a plain map it still honors revisions and TTLs so that concurrency and
//! expiry behavior matches the persistent backends.

use crate::{StoreError, StoreInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use storefront_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use tokio::sync::RwLock;

/// A single stored entry with its revision and optional expiry.
#[derive(Debug, Clone)]
struct MemoryEntry {
	value: Vec<u8>,
	revision: u64,
	expires_at: Option<u64>,
}

impl MemoryEntry {
	fn is_expired(&self, now: u64) -> bool {
		matches!(self.expires_at, Some(at) if now >= at)
	}
}

/// In-memory store implementation.
///
/// This implementation stores data in a HashMap in memory,
/// providing fast access but no persistence across restarts.
pub struct MemoryStore {
	/// The in-memory entries protected by a read-write lock.
	entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryStore {
	/// Creates a new MemoryStore instance.
	pub fn new() -> Self {
		Self {
			entries: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	fn now() -> u64 {
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or(0)
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StoreInterface for MemoryStore {
	async fn get_bytes(&self, key: &str) -> Result<(Vec<u8>, u64), StoreError> {
		let entries = self.entries.read().await;
		match entries.get(key) {
			Some(entry) if !entry.is_expired(Self::now()) => {
				Ok((entry.value.clone(), entry.revision))
			},
			_ => Err(StoreError::NotFound),
		}
	}

	async fn put_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
		expected: Option<u64>,
	) -> Result<u64, StoreError> {
		let now = Self::now();
		let mut entries = self.entries.write().await;

		// An expired entry counts as absent for revision purposes
		let current = entries
			.get(key)
			.filter(|entry| !entry.is_expired(now))
			.map(|entry| entry.revision);

		if let Some(expected) = expected {
			let actual = current.unwrap_or(0);
			if expected != actual {
				return Err(StoreError::VersionConflict { expected, actual });
			}
		}

		let revision = current.unwrap_or(0) + 1;
		let expires_at = ttl
			.filter(|ttl| !ttl.is_zero())
			.map(|ttl| now.saturating_add(ttl.as_secs()));

		entries.insert(
			key.to_string(),
			MemoryEntry {
				value,
				revision,
				expires_at,
			},
		);
		Ok(revision)
	}

	async fn delete(&self, key: &str) -> Result<(), StoreError> {
		let mut entries = self.entries.write().await;
		entries.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StoreError> {
		let entries = self.entries.read().await;
		Ok(entries
			.get(key)
			.is_some_and(|entry| !entry.is_expired(Self::now())))
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
		let now = Self::now();
		let entries = self.entries.read().await;
		Ok(entries
			.iter()
			.filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired(now))
			.map(|(key, _)| key.clone())
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStoreSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StoreError> {
		let now = Self::now();
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|_, entry| !entry.is_expired(now));
		Ok(before - entries.len())
	}
}

/// Configuration schema for MemoryStore.
pub struct MemoryStoreSchema;

impl ConfigSchema for MemoryStoreSchema {
	fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
		// Memory store has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(_config)
	}
}

/// Factory function to create a memory store backend from configuration.
///
/// Configuration parameters:
/// - None required for memory store
pub fn create_store(_config: &toml::Value) -> Result<Box<dyn StoreInterface>, StoreError> {
	Ok(Box::new(MemoryStore::new()))
}

/// Registry for the memory store implementation.
///
/// Provides the factory function for creating in-memory stores.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::StoreRegistry for Registry {}
