//! Store module for the storefront backend.
//!
//! This module provides abstractions for persistent storage of storefront data,
//! supporting different backend implementations such as in-memory or file-based
//! storage. Every stored entry carries a monotonically increasing revision
//! number which doubles as the public version used for optimistic concurrency:
//! writers may require that the entry still has the revision they read, and
//! receive a version conflict otherwise.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use storefront_types::{ConfigSchema, ImplementationRegistry, StoreNamespace};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the store backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Error that occurs when a conditional write loses against a newer revision.
	#[error("Version conflict: expected revision {expected}, found {actual}")]
	VersionConflict {
		/// Revision the writer expected the entry to have.
		expected: u64,
		/// Revision the entry actually had (0 if absent).
		actual: u64,
	},
}

/// Trait defining the low-level interface for store backends.
///
/// This trait must be implemented by any store backend that wants to
/// integrate with the storefront system. It provides key-value operations
/// with per-entry revisions and optional TTL support.
///
/// Revision semantics for `put_bytes`:
/// - `expected = None`: unconditional write, revision advances.
/// - `expected = Some(0)`: create-only, fails with `VersionConflict` if the
///   key already exists.
/// - `expected = Some(n)` with `n > 0`: compare-and-swap, fails with
///   `VersionConflict` unless the current revision is exactly `n`.
#[async_trait]
pub trait StoreInterface: Send + Sync {
	/// Retrieves raw bytes and the current revision for the given key.
	async fn get_bytes(&self, key: &str) -> Result<(Vec<u8>, u64), StoreError>;

	/// Stores raw bytes with optional time-to-live and revision expectation.
	///
	/// Returns the revision the entry has after the write.
	async fn put_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
		expected: Option<u64>,
	) -> Result<u64, StoreError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StoreError>;

	/// Checks if a key exists in the store.
	async fn exists(&self, key: &str) -> Result<bool, StoreError>;

	/// Lists all keys starting with the given prefix.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries from the store (optional operation).
	/// Returns the number of entries removed.
	/// Implementations that don't support expiration can return Ok(0).
	async fn cleanup_expired(&self) -> Result<usize, StoreError> {
		Ok(0) // Default implementation for backends without TTL support
	}
}

/// Type alias for store factory functions.
///
/// This is the function signature that all store implementations must provide
/// to create instances of their store interface.
pub type StoreFactory = fn(&toml::Value) -> Result<Box<dyn StoreInterface>, StoreError>;

/// Registry trait for store implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// store implementations must provide a StoreFactory.
pub trait StoreRegistry: ImplementationRegistry<Factory = StoreFactory> {}

/// Get all registered store implementations.
///
/// Returns a vector of (name, factory) tuples for all available store implementations.
/// This is used by the factory registry to automatically register all implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StoreFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level store service that provides typed operations.
///
/// The StoreService wraps a low-level store backend and provides
/// convenient methods for storing and retrieving typed data with
/// automatic serialization/deserialization and revision tracking.
pub struct StoreService {
	/// The underlying store backend implementation.
	backend: Box<dyn StoreInterface>,
}

impl StoreService {
	/// Creates a new StoreService with the specified backend.
	pub fn new(backend: Box<dyn StoreInterface>) -> Self {
		Self { backend }
	}

	/// Creates a new entry, failing if the id is already taken.
	///
	/// The namespace and id are combined to form a unique key.
	/// Returns the initial revision (always 1 for a fresh key).
	pub async fn create<T: Serialize>(
		&self,
		namespace: StoreNamespace,
		id: &str,
		data: &T,
	) -> Result<u64, StoreError> {
		let key = format!("{}:{}", namespace.as_str(), id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StoreError::Serialization(e.to_string()))?;
		self.backend.put_bytes(&key, bytes, None, Some(0)).await
	}

	/// Creates a new entry with a time-to-live, failing if the id is taken.
	///
	/// Used for short-lived records such as checkout sessions.
	pub async fn create_with_ttl<T: Serialize>(
		&self,
		namespace: StoreNamespace,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<u64, StoreError> {
		let key = format!("{}:{}", namespace.as_str(), id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StoreError::Serialization(e.to_string()))?;
		self.backend.put_bytes(&key, bytes, ttl, Some(0)).await
	}

	/// Stores a value unconditionally, creating or overwriting it.
	///
	/// Returns the revision the entry has after the write.
	pub async fn put<T: Serialize>(
		&self,
		namespace: StoreNamespace,
		id: &str,
		data: &T,
	) -> Result<u64, StoreError> {
		let key = format!("{}:{}", namespace.as_str(), id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StoreError::Serialization(e.to_string()))?;
		self.backend.put_bytes(&key, bytes, None, None).await
	}

	/// Stores a value only if the entry still has the expected revision.
	///
	/// This is the optimistic-concurrency write: the caller passes the
	/// revision it read, and the write fails with `VersionConflict` if
	/// someone else advanced the entry in the meantime.
	pub async fn put_if<T: Serialize>(
		&self,
		namespace: StoreNamespace,
		id: &str,
		data: &T,
		expected: u64,
	) -> Result<u64, StoreError> {
		let key = format!("{}:{}", namespace.as_str(), id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StoreError::Serialization(e.to_string()))?;
		self.backend
			.put_bytes(&key, bytes, None, Some(expected))
			.await
	}

	/// Retrieves and deserializes a value together with its revision.
	///
	/// The namespace and id are combined to form the lookup key.
	/// The retrieved bytes are deserialized from JSON.
	pub async fn fetch<T: DeserializeOwned>(
		&self,
		namespace: StoreNamespace,
		id: &str,
	) -> Result<(T, u64), StoreError> {
		let key = format!("{}:{}", namespace.as_str(), id);
		let (bytes, revision) = self.backend.get_bytes(&key).await?;
		let data = serde_json::from_slice(&bytes)
			.map_err(|e| StoreError::Serialization(e.to_string()))?;
		Ok((data, revision))
	}

	/// Removes a value from the store.
	///
	/// The namespace and id are combined to form the key to delete.
	pub async fn remove(&self, namespace: StoreNamespace, id: &str) -> Result<(), StoreError> {
		let key = format!("{}:{}", namespace.as_str(), id);
		self.backend.delete(&key).await
	}

	/// Checks if a value exists in the store.
	///
	/// The namespace and id are combined to form the lookup key.
	/// Returns true if the key exists, false otherwise.
	pub async fn exists(&self, namespace: StoreNamespace, id: &str) -> Result<bool, StoreError> {
		let key = format!("{}:{}", namespace.as_str(), id);
		self.backend.exists(&key).await
	}

	/// Lists all ids stored under the given namespace.
	pub async fn list_ids(&self, namespace: StoreNamespace) -> Result<Vec<String>, StoreError> {
		let prefix = format!("{}:", namespace.as_str());
		let keys = self.backend.list_keys(&prefix).await?;
		Ok(keys
			.into_iter()
			.filter_map(|key| key.strip_prefix(&prefix).map(|id| id.to_string()))
			.collect())
	}

	/// Removes expired entries from the store.
	///
	/// Returns the number of entries that were removed.
	/// This is a no-op for backends that don't support TTL.
	pub async fn cleanup_expired(&self) -> Result<usize, StoreError> {
		self.backend.cleanup_expired().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStore;
	use serde::Deserialize;

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct TestRecord {
		name: String,
		count: u32,
	}

	fn service() -> StoreService {
		StoreService::new(Box::new(MemoryStore::new()))
	}

	#[tokio::test]
	async fn test_create_fetch_roundtrip() {
		let store = service();
		let record = TestRecord {
			name: "zay".to_string(),
			count: 3,
		};

		let revision = store
			.create(StoreNamespace::Orders, "o1", &record)
			.await
			.unwrap();
		assert_eq!(revision, 1);

		let (fetched, revision): (TestRecord, u64) =
			store.fetch(StoreNamespace::Orders, "o1").await.unwrap();
		assert_eq!(fetched, record);
		assert_eq!(revision, 1);
	}

	#[tokio::test]
	async fn test_create_is_exclusive() {
		let store = service();
		let record = TestRecord {
			name: "zay".to_string(),
			count: 1,
		};

		store
			.create(StoreNamespace::CouponRedemptions, "AS392212:u1", &record)
			.await
			.unwrap();

		let result = store
			.create(StoreNamespace::CouponRedemptions, "AS392212:u1", &record)
			.await;
		assert!(matches!(
			result,
			Err(StoreError::VersionConflict {
				expected: 0,
				actual: 1
			})
		));
	}

	#[tokio::test]
	async fn test_put_if_detects_stale_revision() {
		let store = service();
		let mut record = TestRecord {
			name: "order".to_string(),
			count: 0,
		};

		let revision = store
			.create(StoreNamespace::Orders, "o1", &record)
			.await
			.unwrap();

		record.count = 1;
		let revision = store
			.put_if(StoreNamespace::Orders, "o1", &record, revision)
			.await
			.unwrap();
		assert_eq!(revision, 2);

		// A writer still holding revision 1 loses the race
		record.count = 2;
		let result = store.put_if(StoreNamespace::Orders, "o1", &record, 1).await;
		assert!(matches!(
			result,
			Err(StoreError::VersionConflict {
				expected: 1,
				actual: 2
			})
		));
	}

	#[tokio::test]
	async fn test_list_ids_scopes_by_namespace() {
		let store = service();
		let record = TestRecord {
			name: "x".to_string(),
			count: 0,
		};

		store
			.create(StoreNamespace::Orders, "o1", &record)
			.await
			.unwrap();
		store
			.create(StoreNamespace::Orders, "o2", &record)
			.await
			.unwrap();
		store
			.create(StoreNamespace::Users, "u1", &record)
			.await
			.unwrap();

		let mut ids = store.list_ids(StoreNamespace::Orders).await.unwrap();
		ids.sort();
		assert_eq!(ids, vec!["o1".to_string(), "o2".to_string()]);

		let ids = store.list_ids(StoreNamespace::Users).await.unwrap();
		assert_eq!(ids, vec!["u1".to_string()]);
	}

	#[tokio::test]
	async fn test_remove_and_exists() {
		let store = service();
		let record = TestRecord {
			name: "x".to_string(),
			count: 0,
		};

		store
			.create(StoreNamespace::Users, "u1", &record)
			.await
			.unwrap();
		assert!(store.exists(StoreNamespace::Users, "u1").await.unwrap());

		store.remove(StoreNamespace::Users, "u1").await.unwrap();
		assert!(!store.exists(StoreNamespace::Users, "u1").await.unwrap());

		let result: Result<(TestRecord, u64), _> =
			store.fetch(StoreNamespace::Users, "u1").await;
		assert!(matches!(result, Err(StoreError::NotFound)));
	}
}
