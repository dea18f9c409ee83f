//! Registry trait for self-registering implementations.
//!
//! This module provides the base trait that all pluggable implementations
//! must implement to register themselves with their configuration name and
//! factory function.

/// Base trait for implementation registries.
///
/// Each implementation module (store backend, gateway, pricing, notify)
/// provides a Registry struct that implements this trait, so every
/// implementation declares its configuration name and factory in one place.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example:
	/// - "memory" for store.implementations.memory
	/// - "razorpay" for gateway.implementations.razorpay
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	///
	/// Each crate defines its own factory type, for example StoreFactory
	/// for store backends or GatewayFactory for payment gateways.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
