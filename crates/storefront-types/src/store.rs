//! Store-related types for the storefront backend.

use std::str::FromStr;

/// Namespaces for the different persisted collections.
///
/// This enum provides type safety for store operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreNamespace {
	/// Namespace for order records
	Orders,
	/// Namespace for user records
	Users,
	/// Namespace for coupon redemption records
	CouponRedemptions,
	/// Namespace for gateway checkout sessions
	CheckoutSessions,
}

impl StoreNamespace {
	/// Returns the string representation of the namespace.
	pub fn as_str(&self) -> &'static str {
		match self {
			StoreNamespace::Orders => "orders",
			StoreNamespace::Users => "users",
			StoreNamespace::CouponRedemptions => "coupon_redemptions",
			StoreNamespace::CheckoutSessions => "checkout_sessions",
		}
	}

	/// Returns an iterator over all StoreNamespace variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::Users,
			Self::CouponRedemptions,
			Self::CheckoutSessions,
		]
		.into_iter()
	}
}

impl FromStr for StoreNamespace {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"users" => Ok(Self::Users),
			"coupon_redemptions" => Ok(Self::CouponRedemptions),
			"checkout_sessions" => Ok(Self::CheckoutSessions),
			_ => Err(()),
		}
	}
}

impl From<StoreNamespace> for &'static str {
	fn from(ns: StoreNamespace) -> Self {
		ns.as_str()
	}
}
