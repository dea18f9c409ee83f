//! Money conversion helpers.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Converts a major-unit amount to integer minor units (e.g. rupees to paise).
///
/// Returns `None` when the amount is negative, does not fit in a `u64`, or
/// still has fractional precision after scaling by 100.
pub fn to_minor_units(amount: Decimal) -> Option<u64> {
	let scaled = amount.checked_mul(Decimal::ONE_HUNDRED)?;
	if scaled.is_sign_negative() || !scaled.fract().is_zero() {
		return None;
	}
	scaled.to_u64()
}
