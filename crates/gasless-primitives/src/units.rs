//! Fixed-point helpers for the amounts that end up in intent hashes.

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::U256;

use crate::{PrimitivesError, Result};

/// USDC collateral precision
pub const USDC_DECIMALS: u8 = 6;
/// oracle price precision
pub const PRICE_DECIMALS: u8 = 8;

fn parse_fixed(value: &str, decimals: u8) -> Result<U256> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('-') {
        return Err(PrimitivesError::AmountError(format!(
            "expected a non-negative decimal, got {value:?}"
        )));
    }
    parse_units(value, decimals)
        .map(Into::into)
        .map_err(|e| PrimitivesError::AmountError(e.to_string()))
}

/// "100" -> 100_000000
pub fn parse_usdc(value: &str) -> Result<U256> {
    parse_fixed(value, USDC_DECIMALS)
}

/// "3450.00" -> 345000000000
pub fn parse_price(value: &str) -> Result<U256> {
    parse_fixed(value, PRICE_DECIMALS)
}

pub fn format_usdc(amount: U256) -> String {
    format_units(amount, USDC_DECIMALS).unwrap_or_else(|_| amount.to_string())
}

pub fn format_price(price: U256) -> String {
    format_units(price, PRICE_DECIMALS).unwrap_or_else(|_| price.to_string())
}
