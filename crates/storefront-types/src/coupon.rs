//! Coupon definitions and redemption records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A discount coupon configured for the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponDef {
	/// Code customers enter, compared case-insensitively.
	pub code: String,
	/// Fraction of the base price taken off, in `[0, 1]`.
	pub discount: Decimal,
	/// Whether each user may redeem the code only once.
	#[serde(default)]
	pub single_use: bool,
}

/// Record of a user redeeming a single-use coupon.
///
/// Stored keyed by code and user with a create-only write, so a second
/// redemption attempt loses deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponRedemption {
	/// Uppercased coupon code.
	pub code: String,
	/// User who redeemed it.
	pub user_id: String,
	/// Order the redemption discounted.
	pub order_id: String,
	/// Timestamp of redemption.
	pub redeemed_at: u64,
}

impl CouponRedemption {
	/// Store id for a redemption record.
	pub fn record_id(code: &str, user_id: &str) -> String {
		format!("{}:{}", code.to_uppercase(), user_id)
	}
}

/// Outcome of checking a coupon code for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CouponCheck {
	/// The code applies; `discount` is the fraction taken off the base price.
	Valid { discount: Decimal },
	/// No coupon with this code exists.
	InvalidCode,
	/// A single-use code this user has already redeemed.
	AlreadyRedeemed,
}

impl CouponCheck {
	/// Customer-facing message for a failed check, None when the check passed.
	pub fn rejection_message(&self) -> Option<&'static str> {
		match self {
			CouponCheck::Valid { .. } => None,
			CouponCheck::InvalidCode => Some("Invalid coupon code"),
			CouponCheck::AlreadyRedeemed => Some("Coupon already used on your account"),
		}
	}
}
