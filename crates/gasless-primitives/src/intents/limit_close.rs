use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::{ensure_trader, IntentHeader, OrderDraft, OrderKind};
use crate::{PrimitivesError, Result};

/// Trigger on an existing position: limit-close or stop-loss
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTrigger {
    pub header: IntentHeader,
    pub symbol: String,
    pub position_id: U256,
    /// 8 decimals
    pub trigger_price: U256,
}

impl CloseTrigger {
    /// trader ‖ kind ‖ positionId ‖ triggerPrice ‖ nonce ‖ expiresAt ‖ destination
    ///
    /// the one byte kind tag keeps a limit-close signature from being replayed as a
    /// stop-loss on the same position
    pub fn preimage(&self, kind: OrderKind) -> Vec<u8> {
        DynSolValue::Tuple(vec![
            DynSolValue::Address(self.header.trader),
            DynSolValue::Uint(U256::from(kind.code()), 8),
            DynSolValue::Uint(self.position_id, 256),
            DynSolValue::Uint(self.trigger_price, 256),
            DynSolValue::Uint(self.header.nonce, 256),
            DynSolValue::Uint(U256::from(self.header.expires_at), 256),
            DynSolValue::Address(self.header.destination),
        ])
        .abi_encode_packed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseDraft {
    pub trader: Address,
    pub symbol: String,
    pub position_id: U256,
    pub trigger_price: U256,
    pub expires_at: u64,
}

impl CloseDraft {
    pub(super) fn bind(&self, header: IntentHeader) -> CloseTrigger {
        CloseTrigger {
            header,
            symbol: self.symbol.clone(),
            position_id: self.position_id,
            trigger_price: self.trigger_price,
        }
    }
}

/// Builder for limit-close and stop-loss drafts
#[derive(Debug, Clone)]
pub struct CloseTriggerBuilder {
    kind: OrderKind,
    trader: Address,
    symbol: String,
    position_id: U256,
    trigger_price: U256,
    expires_at: u64,
}

impl CloseTriggerBuilder {
    pub fn limit_close(trader: Address, position_id: U256) -> Self {
        Self::new(OrderKind::LimitClose, trader, position_id)
    }

    pub fn stop_loss(trader: Address, position_id: U256) -> Self {
        Self::new(OrderKind::StopLoss, trader, position_id)
    }

    fn new(kind: OrderKind, trader: Address, position_id: U256) -> Self {
        Self {
            kind,
            trader,
            symbol: String::new(),
            position_id,
            trigger_price: U256::ZERO,
            expires_at: 0,
        }
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn trigger_price(mut self, price: U256) -> Self {
        self.trigger_price = price;
        self
    }

    pub fn expires_at(mut self, timestamp: u64) -> Self {
        self.expires_at = timestamp;
        self
    }

    pub fn build(self) -> Result<OrderDraft> {
        ensure_trader(self.trader)?;
        if self.trigger_price.is_zero() {
            return Err(PrimitivesError::IntentError("trigger price is zero".into()));
        }
        if self.expires_at == 0 {
            return Err(PrimitivesError::IntentError("expiry not set".into()));
        }
        let draft = CloseDraft {
            trader: self.trader,
            symbol: self.symbol,
            position_id: self.position_id,
            trigger_price: self.trigger_price,
            expires_at: self.expires_at,
        };
        Ok(match self.kind {
            OrderKind::StopLoss => OrderDraft::StopLoss(draft),
            _ => OrderDraft::LimitClose(draft),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intents::test_utils::{header, EXECUTOR_A, EXECUTOR_B, T0, TRADER};
    use crate::intents::{LimitOpen, OrderIntent};

    fn trigger(nonce: u64, destination: Address) -> CloseTrigger {
        CloseTrigger {
            header: header(nonce, destination),
            symbol: "ETH".into(),
            position_id: U256::from(12),
            trigger_price: U256::from(360_000_000_000u64),
        }
    }

    #[test]
    fn test_close_and_stop_loss_never_share_a_hash() {
        let close = OrderIntent::LimitClose(trigger(3, EXECUTOR_A));
        let stop = OrderIntent::StopLoss(trigger(3, EXECUTOR_A));
        assert_ne!(close.signing_hash(), stop.signing_hash());
    }

    #[test]
    fn test_destination_is_trailing_field() {
        let preimage = trigger(3, EXECUTOR_B).preimage(OrderKind::LimitClose);
        assert_eq!(preimage.len(), 20 + 1 + 32 * 4 + 20);
        assert_eq!(&preimage[preimage.len() - 20..], EXECUTOR_B.as_slice());
        assert_ne!(
            OrderIntent::LimitClose(trigger(3, EXECUTOR_A)).signing_hash(),
            OrderIntent::LimitClose(trigger(3, EXECUTOR_B)).signing_hash()
        );
    }

    #[test]
    fn test_close_preimage_never_matches_open_preimage() {
        // the shortest open preimage (one byte symbol) is still longer than a close preimage
        let open = LimitOpen {
            header: header(3, EXECUTOR_A),
            symbol: "E".into(),
            is_long: true,
            collateral: U256::from(1),
            leverage: U256::from(1),
            trigger_price: U256::from(1),
            take_profit: None,
            stop_loss: None,
        };
        assert!(open.preimage().len() > trigger(3, EXECUTOR_A).preimage(OrderKind::StopLoss).len());
    }

    #[test]
    fn test_builder_kinds() {
        let close = CloseTriggerBuilder::limit_close(TRADER, U256::from(1))
            .trigger_price(U256::from(5))
            .expires_at(T0)
            .build()
            .unwrap();
        assert_eq!(close.kind(), OrderKind::LimitClose);

        let stop = CloseTriggerBuilder::stop_loss(TRADER, U256::from(1))
            .trigger_price(U256::from(5))
            .expires_at(T0)
            .build()
            .unwrap();
        assert_eq!(stop.kind(), OrderKind::StopLoss);

        assert!(CloseTriggerBuilder::stop_loss(TRADER, U256::from(1))
            .expires_at(T0)
            .build()
            .is_err());
    }
}
