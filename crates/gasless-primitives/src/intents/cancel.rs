use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

use super::ensure_trader;
use crate::Result;

/// literal tag appended to every cancellation preimage
pub const CANCEL_TAG: &str = "CANCEL";

/// Cancellation of a pending order, signed like any other intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelIntent {
    pub trader: Address,
    pub chain_id: u64,
    pub order_id: U256,
    pub nonce: U256,
    pub destination: Address,
}

impl CancelIntent {
    pub fn new(
        trader: Address,
        chain_id: u64,
        order_id: U256,
        nonce: U256,
        destination: Address,
    ) -> Result<Self> {
        ensure_trader(trader)?;
        Ok(Self {
            trader,
            chain_id,
            order_id,
            nonce,
            destination,
        })
    }

    /// trader ‖ orderId ‖ nonce ‖ destination ‖ "CANCEL"
    pub fn preimage(&self) -> Vec<u8> {
        DynSolValue::Tuple(vec![
            DynSolValue::Address(self.trader),
            DynSolValue::Uint(self.order_id, 256),
            DynSolValue::Uint(self.nonce, 256),
            DynSolValue::Address(self.destination),
            DynSolValue::String(CANCEL_TAG.to_string()),
        ])
        .abi_encode_packed()
    }

    pub fn signing_hash(&self) -> B256 {
        keccak256(self.preimage())
    }
}
