use crate::error::{ReconcileError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept for fiat amounts.
pub const FIAT_DECIMALS: u32 = 2;
/// Maximum decimal places kept for crypto amounts (one satoshi).
pub const CRYPTO_DECIMALS: u32 = 8;

/// The currency an invoice is denominated in.
///
/// Only USD is treated as fiat; every other denomination is settled on chain
/// and keeps up to eight decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Btc,
}

impl Currency {
    pub fn is_fiat(&self) -> bool {
        matches!(self, Currency::Usd)
    }

    /// Rounds `value` the way amounts in this currency are stored.
    pub fn round(&self, value: Decimal) -> Decimal {
        if self.is_fiat() {
            round_half_up(value, FIAT_DECIMALS)
        } else {
            round_crypto(value)
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Usd => write!(f, "USD"),
            Currency::Btc => write!(f, "BTC"),
        }
    }
}

/// Rounds half away from zero to `dp` decimal places.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Number of significant decimal places, ignoring trailing zeros.
pub fn decimal_places(value: Decimal) -> u32 {
    value.normalize().scale()
}

/// Rounds to eight places only when the value carries more precision than that.
pub fn round_crypto(value: Decimal) -> Decimal {
    if decimal_places(value) > CRYPTO_DECIMALS {
        round_half_up(value, CRYPTO_DECIMALS)
    } else {
        value
    }
}

/// Fiat value of a crypto `amount` at `rate`, rounded to cents.
///
/// Fails with `ReconcileError::Validation` when the product does not fit a `Decimal`.
pub fn to_fiat(amount: Decimal, rate: Decimal) -> Result<Decimal> {
    amount
        .checked_mul(rate)
        .map(|value| round_half_up(value, FIAT_DECIMALS))
        .ok_or_else(|| {
            ReconcileError::Validation(format!("{} at rate {} is out of range", amount, rate))
        })
}
