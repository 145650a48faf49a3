//! Amount normalization.
//!
//! Records always carry a non-negative amount; direction lives in
//! [`TxnKind`]. Sources encode direction three ways: a signed amount, an
//! explicit DEBIT/CREDIT flag, or a purchase/payment classification. The
//! helpers here cover the signed-amount case; flag-based sources map the
//! flag themselves and take the absolute value.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use banktap_core_types::TxnKind;

/// Parse a signed amount string such as `"-42.50"` or `"$1,203.99"`.
/// Negative means withdrawal when the source carries no direction flag.
pub fn parse_signed(raw: &str) -> Option<(Decimal, TxnKind)> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    let value = Decimal::from_str(&cleaned).ok()?;
    if value.is_sign_negative() {
        Some((-value, TxnKind::Withdrawal))
    } else {
        Some((value, TxnKind::Deposit))
    }
}

/// Absolute decimal from an f64 payload field. Falls back to zero on
/// non-finite input rather than failing the batch.
pub fn abs_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value.abs()).unwrap_or_default()
}
