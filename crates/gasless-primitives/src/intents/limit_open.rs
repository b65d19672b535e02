use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::{ensure_trader, IntentHeader, OrderDraft};
use crate::{PrimitivesError, Result};

/// longest symbol the executor stores
pub const MAX_SYMBOL_LEN: usize = 32;

/// Limit order that opens a new position once the trigger price is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOpen {
    pub header: IntentHeader,
    pub symbol: String,
    pub is_long: bool,
    /// USDC, 6 decimals
    pub collateral: U256,
    pub leverage: U256,
    /// 8 decimals
    pub trigger_price: U256,
    pub take_profit: Option<U256>,
    pub stop_loss: Option<U256>,
}

impl LimitOpen {
    /// trader ‖ len(symbol) ‖ symbol ‖ isLong ‖ collateral ‖ leverage ‖ triggerPrice ‖
    /// hasTp ‖ tp ‖ hasSl ‖ sl ‖ nonce ‖ expiresAt ‖ destination
    ///
    /// TP and SL are always present as a one byte flag plus a uint256, so an unset level
    /// and a level of zero hash differently
    pub fn preimage(&self) -> Vec<u8> {
        DynSolValue::Tuple(vec![
            DynSolValue::Address(self.header.trader),
            DynSolValue::Uint(U256::from(self.symbol.len()), 256),
            DynSolValue::String(self.symbol.clone()),
            DynSolValue::Bool(self.is_long),
            DynSolValue::Uint(self.collateral, 256),
            DynSolValue::Uint(self.leverage, 256),
            DynSolValue::Uint(self.trigger_price, 256),
            DynSolValue::Bool(self.take_profit.is_some()),
            DynSolValue::Uint(self.take_profit.unwrap_or_default(), 256),
            DynSolValue::Bool(self.stop_loss.is_some()),
            DynSolValue::Uint(self.stop_loss.unwrap_or_default(), 256),
            DynSolValue::Uint(self.header.nonce, 256),
            DynSolValue::Uint(U256::from(self.header.expires_at), 256),
            DynSolValue::Address(self.header.destination),
        ])
        .abi_encode_packed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOpenDraft {
    pub trader: Address,
    pub symbol: String,
    pub is_long: bool,
    pub collateral: U256,
    pub leverage: U256,
    pub trigger_price: U256,
    pub take_profit: Option<U256>,
    pub stop_loss: Option<U256>,
    pub expires_at: u64,
}

impl LimitOpenDraft {
    pub(super) fn bind(&self, header: IntentHeader) -> LimitOpen {
        LimitOpen {
            header,
            symbol: self.symbol.clone(),
            is_long: self.is_long,
            collateral: self.collateral,
            leverage: self.leverage,
            trigger_price: self.trigger_price,
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
        }
    }
}

/// Builder for limit-open drafts
#[derive(Debug, Clone)]
pub struct LimitOpenBuilder {
    trader: Address,
    symbol: String,
    is_long: bool,
    collateral: U256,
    leverage: U256,
    trigger_price: U256,
    take_profit: Option<U256>,
    stop_loss: Option<U256>,
    expires_at: u64,
}

impl LimitOpenBuilder {
    pub fn new(trader: Address, symbol: impl Into<String>) -> Self {
        Self {
            trader,
            symbol: symbol.into(),
            is_long: true,
            collateral: U256::ZERO,
            leverage: U256::from(1),
            trigger_price: U256::ZERO,
            take_profit: None,
            stop_loss: None,
            expires_at: 0,
        }
    }

    pub fn long(mut self) -> Self {
        self.is_long = true;
        self
    }

    pub fn short(mut self) -> Self {
        self.is_long = false;
        self
    }

    pub fn collateral(mut self, collateral: U256) -> Self {
        self.collateral = collateral;
        self
    }

    pub fn leverage(mut self, leverage: u64) -> Self {
        self.leverage = U256::from(leverage);
        self
    }

    pub fn trigger_price(mut self, price: U256) -> Self {
        self.trigger_price = price;
        self
    }

    pub fn take_profit(mut self, price: U256) -> Self {
        self.take_profit = Some(price);
        self
    }

    pub fn stop_loss(mut self, price: U256) -> Self {
        self.stop_loss = Some(price);
        self
    }

    pub fn expires_at(mut self, timestamp: u64) -> Self {
        self.expires_at = timestamp;
        self
    }

    pub fn build(self) -> Result<OrderDraft> {
        ensure_trader(self.trader)?;
        if self.symbol.is_empty() || self.symbol.len() > MAX_SYMBOL_LEN {
            return Err(PrimitivesError::IntentError(format!(
                "symbol must be 1..={MAX_SYMBOL_LEN} bytes, got {:?}",
                self.symbol
            )));
        }
        if !self.symbol.is_ascii() {
            return Err(PrimitivesError::IntentError("symbol must be ascii".into()));
        }
        if self.collateral.is_zero() {
            return Err(PrimitivesError::IntentError("collateral is zero".into()));
        }
        if self.leverage.is_zero() {
            return Err(PrimitivesError::IntentError("leverage must be >= 1".into()));
        }
        if self.trigger_price.is_zero() {
            return Err(PrimitivesError::IntentError("trigger price is zero".into()));
        }
        if self.expires_at == 0 {
            return Err(PrimitivesError::IntentError("expiry not set".into()));
        }
        // take profit above entry for longs, below for shorts; stop loss the other way
        let entry = self.trigger_price;
        if let Some(tp) = self.take_profit {
            let wrong_side = if self.is_long { tp <= entry } else { tp >= entry };
            if wrong_side {
                return Err(PrimitivesError::IntentError(format!(
                    "take profit {tp} is on the wrong side of trigger {}",
                    self.trigger_price
                )));
            }
        }
        if let Some(sl) = self.stop_loss {
            let wrong_side = if self.is_long { sl >= entry } else { sl <= entry };
            if wrong_side {
                return Err(PrimitivesError::IntentError(format!(
                    "stop loss {sl} is on the wrong side of trigger {}",
                    self.trigger_price
                )));
            }
        }

        Ok(OrderDraft::LimitOpen(LimitOpenDraft {
            trader: self.trader,
            symbol: self.symbol,
            is_long: self.is_long,
            collateral: self.collateral,
            leverage: self.leverage,
            trigger_price: self.trigger_price,
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            expires_at: self.expires_at,
        }))
    }
}
