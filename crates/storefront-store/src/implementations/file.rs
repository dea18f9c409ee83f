//! File-based store backend implementation for the storefront service.
//!
//! This module provides a filesystem implementation of the StoreInterface trait.
//! Entries are stored as binary files with a fixed header that carries the
//! revision and expiry, laid out one directory per namespace so keys can be
//! listed back. Mutations are serialized through an exclusive file lock and
//! written atomically via a temp file and rename.

use crate::{StoreError, StoreInterface};
use async_trait::async_trait;
use fs2::FileExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use storefront_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StoreNamespace,
	ValidationError,
};
use tokio::fs;

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header carrying revision and TTL support.
///
/// Binary layout (64 bytes total):
/// - [0-3]: Magic bytes "SFST"
/// - [4-5]: Format version (u16, little-endian)
/// - [6-13]: Entry revision (u64, little-endian, starts at 1)
/// - [14-21]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [22-63]: Reserved/padding for future use
#[derive(Debug, Clone)]
struct FileHeader {
	magic: [u8; 4],
	version: u16,
	revision: u64,
	expires_at: u64,
	padding: [u8; 42],
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"SFST";
	const VERSION: u16 = 1;
	const SIZE: usize = 64;

	/// Creates a new header with the given revision and TTL.
	fn new(revision: u64, ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0 // Permanent storage
		} else {
			SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map(|d| d.as_secs())
				.unwrap_or(0)
				.saturating_add(ttl.as_secs())
		};

		Self {
			magic: *Self::MAGIC,
			version: Self::VERSION,
			revision,
			expires_at,
			padding: [0; 42],
		}
	}

	/// Serializes the header to bytes.
	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(&self.magic);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.revision.to_le_bytes());
		bytes[14..22].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes[22..64].copy_from_slice(&self.padding);
		bytes
	}

	/// Deserializes a header from bytes.
	fn deserialize(bytes: &[u8]) -> Result<Self, StoreError> {
		if bytes.len() < Self::SIZE {
			return Err(StoreError::Backend("File too small for header".into()));
		}

		let mut magic = [0u8; 4];
		magic.copy_from_slice(&bytes[0..4]);

		if magic != *Self::MAGIC {
			return Err(StoreError::Backend("Not a store file".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StoreError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut revision_bytes = [0u8; 8];
		revision_bytes.copy_from_slice(&bytes[6..14]);
		let revision = u64::from_le_bytes(revision_bytes);

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[14..22]);
		let expires_at = u64::from_le_bytes(expires_bytes);

		let mut padding = [0u8; 42];
		padding.copy_from_slice(&bytes[22..64]);

		Ok(Self {
			magic,
			version,
			revision,
			expires_at,
			padding,
		})
	}

	/// Checks if the data has expired.
	fn is_expired(&self) -> bool {
		if self.expires_at == 0 {
			return false; // Permanent storage
		}

		let now = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or(0);

		now >= self.expires_at
	}
}

/// TTL configuration for the different store namespaces.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StoreNamespace, Duration>,
}

impl TtlConfig {
	/// Creates TTL config from TOML configuration.
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		if let Some(table) = config.as_table() {
			for namespace in StoreNamespace::all() {
				let config_key = format!("ttl_{}", namespace.as_str());
				if let Some(ttl_value) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.map(|v| v as u64)
				{
					ttls.insert(namespace, Duration::from_secs(ttl_value));
				}
			}
		}

		Self { ttls }
	}

	/// Gets the TTL for a specific namespace.
	fn get_ttl(&self, namespace: StoreNamespace) -> Duration {
		self.ttls.get(&namespace).copied().unwrap_or(Duration::ZERO)
	}
}

/// File-based store implementation.
///
/// This implementation stores data as binary files on the filesystem,
/// providing simple persistence without requiring external dependencies.
/// Files include a header with the entry revision and TTL information so
/// conditional writes and expiration survive restarts.
pub struct FileStore {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// TTL configuration for the different namespaces.
	ttl_config: TtlConfig,
}

impl FileStore {
	/// Creates a new FileStore instance with the specified base path and TTL config.
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	/// Converts a store key to a filesystem path.
	///
	/// Keys have the form `namespace:id`; the namespace becomes a directory
	/// and the id the file name, sanitized for the filesystem. Ids are
	/// expected to already be filesystem-safe (uuids or coupon records);
	/// `list_keys` reports sanitized names for anything that was not.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = key.split_once(':').unwrap_or(("", key));
		let safe_id = id.replace(['/', ':'], "_");
		self.base_path.join(namespace).join(format!("{}.bin", safe_id))
	}

	/// Gets the TTL for a given key based on its namespace.
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");

		namespace
			.parse::<StoreNamespace>()
			.map(|ns| self.ttl_config.get_ttl(ns))
			.unwrap_or(Duration::ZERO)
	}

	/// Acquires the store-wide mutation lock.
	///
	/// Mutations are read-modify-write sequences (the current revision has to
	/// be inspected before the new file lands), so they are serialized through
	/// an exclusive lock on a dedicated lock file. The lock is released when
	/// the returned handle drops.
	fn acquire_lock(&self) -> Result<std::fs::File, StoreError> {
		std::fs::create_dir_all(&self.base_path)
			.map_err(|e| StoreError::Backend(e.to_string()))?;
		let lock_path = self.base_path.join(".lock");
		let lock_file = std::fs::OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(&lock_path)
			.map_err(|e| StoreError::Backend(e.to_string()))?;
		lock_file
			.lock_exclusive()
			.map_err(|e| StoreError::Backend(e.to_string()))?;
		Ok(lock_file)
	}

	/// Reads a file and returns its payload and header, honoring expiry.
	async fn read_entry(&self, key: &str) -> Result<(Vec<u8>, FileHeader), StoreError> {
		let path = self.get_file_path(key);

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StoreError::NotFound)
			},
			Err(e) => return Err(StoreError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Err(StoreError::NotFound);
		}

		let payload = if data.len() > FileHeader::SIZE {
			data[FileHeader::SIZE..].to_vec()
		} else {
			Vec::new()
		};
		Ok((payload, header))
	}

	/// Removes all expired files from the store.
	async fn cleanup_expired_files(&self) -> Result<usize, StoreError> {
		let mut removed = 0;

		for namespace in StoreNamespace::all() {
			let dir = self.base_path.join(namespace.as_str());
			let mut entries = match fs::read_dir(&dir).await {
				Ok(entries) => entries,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
				Err(e) => return Err(StoreError::Backend(e.to_string())),
			};

			while let Some(entry) = entries
				.next_entry()
				.await
				.map_err(|e| StoreError::Backend(e.to_string()))?
			{
				let path = entry.path();
				if path.extension() != Some(std::ffi::OsStr::new("bin")) {
					continue;
				}
				match fs::read(&path).await {
					Ok(data) => {
						if data.len() >= FileHeader::SIZE {
							if let Ok(header) =
								FileHeader::deserialize(&data[..FileHeader::SIZE])
							{
								if header.is_expired() {
									if let Err(e) = fs::remove_file(&path).await {
										tracing::warn!(
											"Failed to remove expired file {:?}: {}",
											path,
											e
										);
									} else {
										removed += 1;
									}
								}
							}
						} else {
							tracing::debug!(
								"Skipping file {:?}: too small ({} bytes, expected at least {})",
								path,
								data.len(),
								FileHeader::SIZE
							);
						}
					},
					Err(e) => {
						tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
					},
				}
			}
		}
		Ok(removed)
	}
}

#[async_trait]
impl StoreInterface for FileStore {
	async fn get_bytes(&self, key: &str) -> Result<(Vec<u8>, u64), StoreError> {
		let (payload, header) = self.read_entry(key).await?;
		Ok((payload, header.revision))
	}

	async fn put_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
		expected: Option<u64>,
	) -> Result<u64, StoreError> {
		let path = self.get_file_path(key);

		// Serialize read-modify-write against concurrent mutators
		let _lock = self.acquire_lock()?;

		// An expired entry counts as absent for revision purposes
		let current = match self.read_entry(key).await {
			Ok((_, header)) => Some(header.revision),
			Err(StoreError::NotFound) => None,
			Err(e) => return Err(e),
		};

		if let Some(expected) = expected {
			let actual = current.unwrap_or(0);
			if expected != actual {
				return Err(StoreError::VersionConflict { expected, actual });
			}
		}

		let revision = current.unwrap_or(0) + 1;

		// Create parent directory if it doesn't exist
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StoreError::Backend(e.to_string()))?;
		}

		// Determine TTL: use provided TTL, or get from config based on key
		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));

		let header = FileHeader::new(revision, ttl);
		let header_bytes = header.serialize();

		// Combine header and data
		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header_bytes);
		file_data.extend_from_slice(&value);

		// Write atomically by writing to temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StoreError::Backend(e.to_string()))?;

		Ok(revision)
	}

	async fn delete(&self, key: &str) -> Result<(), StoreError> {
		let path = self.get_file_path(key);

		let _lock = self.acquire_lock()?;

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StoreError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StoreError> {
		match self.read_entry(key).await {
			Ok(_) => Ok(true),
			Err(StoreError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
		let mut keys = Vec::new();

		for namespace in StoreNamespace::all() {
			let namespace_prefix = format!("{}:", namespace.as_str());
			if !namespace_prefix.starts_with(prefix) && !prefix.starts_with(&namespace_prefix) {
				continue;
			}

			let dir = self.base_path.join(namespace.as_str());
			let mut entries = match fs::read_dir(&dir).await {
				Ok(entries) => entries,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
				Err(e) => return Err(StoreError::Backend(e.to_string())),
			};

			while let Some(entry) = entries
				.next_entry()
				.await
				.map_err(|e| StoreError::Backend(e.to_string()))?
			{
				let path = entry.path();
				if path.extension() != Some(std::ffi::OsStr::new("bin")) {
					continue;
				}
				let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
					continue;
				};
				let key = format!("{}:{}", namespace.as_str(), stem);
				if !key.starts_with(prefix) {
					continue;
				}
				// Hide entries that have expired but not been cleaned up yet
				match self.read_entry(&key).await {
					Ok(_) => keys.push(key),
					Err(StoreError::NotFound) => {},
					Err(e) => return Err(e),
				}
			}
		}

		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStoreSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StoreError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStore.
pub struct FileStoreSchema;

impl ConfigSchema for FileStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Build TTL fields dynamically based on the known namespaces
		let mut optional_fields = vec![Field::new("path", FieldType::String)];

		for namespace in StoreNamespace::all() {
			let field_name = format!("ttl_{}", namespace.as_str());
			optional_fields.push(Field::new(
				field_name.clone(),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		let schema = Schema::new(
			vec![], // No required fields
			optional_fields,
		);

		schema.validate(config)?;

		Ok(())
	}
}

/// Factory function to create a file store backend from configuration.
///
/// Configuration parameters:
/// - `path`: Base directory for file storage (default: "./data/store")
/// - `ttl_orders`: TTL in seconds for orders (default: 0, never expires)
/// - `ttl_users`: TTL in seconds for users (default: 0, never expires)
/// - `ttl_coupon_redemptions`: TTL in seconds for redemptions (default: 0)
/// - `ttl_checkout_sessions`: TTL in seconds for checkout sessions (default: 0)
pub fn create_store(config: &toml::Value) -> Result<Box<dyn StoreInterface>, StoreError> {
	let path = config
		.get("path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/store")
		.to_string();

	let ttl_config = TtlConfig::from_config(config);

	Ok(Box::new(FileStore::new(PathBuf::from(path), ttl_config)))
}

/// Registry for the file store implementation.
///
/// Provides the factory function for creating file-backed stores.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::StoreRegistry for Registry {}
