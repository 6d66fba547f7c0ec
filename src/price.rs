//! Fixed-point prices.
//!
//! Prices are `u64` tick counts with 4 implied decimal places
//! (e.g. $149.00 -> 1_490_000). Ordering and equality on integer ticks are
//! exact, which a price-ordered book depends on; floating point drifts under
//! repeated arithmetic and two "equal" prices may compare unequal.
//!
//! `rust_decimal` handles the lossless boundary conversion for callers that
//! speak in decimal dollars (the simulation driver, test fixtures).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Ticks per whole currency unit (4 decimal places)
pub const PRICE_SCALE: u64 = 10_000;

/// Convert a decimal price to integer ticks.
///
/// Returns `None` if the price is negative, has more precision than the
/// tick size can represent, or overflows u64.
pub fn ticks_from_decimal(price: Decimal) -> Option<u64> {
    if price.is_sign_negative() {
        return None;
    }
    let scaled = price.checked_mul(Decimal::from(PRICE_SCALE))?;
    if scaled.fract() != Decimal::ZERO {
        return None; // sub-tick precision would be silently truncated
    }
    scaled.to_u64()
}

/// Convert integer ticks back to a decimal price.
pub fn ticks_to_decimal(ticks: u64) -> Decimal {
    Decimal::from(ticks) / Decimal::from(PRICE_SCALE)
}
