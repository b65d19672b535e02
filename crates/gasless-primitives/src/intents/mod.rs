//! Order intents and their signing hashes.
//!
//! Every hash is keccak256 over a tight packed encoding. Each field is fixed-width or
//! length-prefixed, and order intents always end with the destination contract address so a
//! signature is bound to the chain and contract version it was produced for.

use alloy::primitives::{Address, PrimitiveSignature, B256, U256};
use serde::{Deserialize, Serialize};

use crate::session::SessionAuthorization;
use crate::{PrimitivesError, Result};

pub mod cancel;
pub mod limit_close;
pub mod limit_open;

pub use cancel::CancelIntent;
pub use limit_close::{CloseDraft, CloseTrigger, CloseTriggerBuilder};
pub use limit_open::{LimitOpen, LimitOpenBuilder, LimitOpenDraft};

/// Order type discriminant, matches the executor's `orderType` codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    LimitOpen,
    LimitClose,
    StopLoss,
}

impl OrderKind {
    pub fn code(&self) -> u8 {
        match self {
            OrderKind::LimitOpen => 0,
            OrderKind::LimitClose => 1,
            OrderKind::StopLoss => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OrderKind::LimitOpen),
            1 => Some(OrderKind::LimitClose),
            2 => Some(OrderKind::StopLoss),
            _ => None,
        }
    }

    /// name the relay uses for the execution fee query
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::LimitOpen => "LIMIT_OPEN",
            OrderKind::LimitClose => "LIMIT_CLOSE",
            OrderKind::StopLoss => "STOP_LOSS",
        }
    }
}

/// Fields shared by every intent, filled in once the chain and nonce are known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentHeader {
    pub trader: Address,
    pub chain_id: u64,
    pub nonce: U256,
    pub expires_at: u64,
    /// contract that will verify the signature
    pub destination: Address,
}

/// A fully bound order intent ready to be hashed and signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrderIntent {
    LimitOpen(LimitOpen),
    LimitClose(CloseTrigger),
    StopLoss(CloseTrigger),
}

impl OrderIntent {
    pub fn kind(&self) -> OrderKind {
        match self {
            OrderIntent::LimitOpen(_) => OrderKind::LimitOpen,
            OrderIntent::LimitClose(_) => OrderKind::LimitClose,
            OrderIntent::StopLoss(_) => OrderKind::StopLoss,
        }
    }

    pub fn header(&self) -> &IntentHeader {
        match self {
            OrderIntent::LimitOpen(intent) => &intent.header,
            OrderIntent::LimitClose(intent) | OrderIntent::StopLoss(intent) => &intent.header,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            OrderIntent::LimitOpen(intent) => &intent.symbol,
            OrderIntent::LimitClose(intent) | OrderIntent::StopLoss(intent) => &intent.symbol,
        }
    }

    pub fn preimage(&self) -> Vec<u8> {
        match self {
            OrderIntent::LimitOpen(intent) => intent.preimage(),
            OrderIntent::LimitClose(intent) => intent.preimage(OrderKind::LimitClose),
            OrderIntent::StopLoss(intent) => intent.preimage(OrderKind::StopLoss),
        }
    }

    /// hash the signer commits to
    pub fn signing_hash(&self) -> B256 {
        alloy::primitives::keccak256(self.preimage())
    }
}

/// An order draft before the chain, nonce and destination are bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderDraft {
    LimitOpen(LimitOpenDraft),
    LimitClose(CloseDraft),
    StopLoss(CloseDraft),
}

impl OrderDraft {
    pub fn kind(&self) -> OrderKind {
        match self {
            OrderDraft::LimitOpen(_) => OrderKind::LimitOpen,
            OrderDraft::LimitClose(_) => OrderKind::LimitClose,
            OrderDraft::StopLoss(_) => OrderKind::StopLoss,
        }
    }

    pub fn trader(&self) -> Address {
        match self {
            OrderDraft::LimitOpen(draft) => draft.trader,
            OrderDraft::LimitClose(draft) | OrderDraft::StopLoss(draft) => draft.trader,
        }
    }

    pub fn expires_at(&self) -> u64 {
        match self {
            OrderDraft::LimitOpen(draft) => draft.expires_at,
            OrderDraft::LimitClose(draft) | OrderDraft::StopLoss(draft) => draft.expires_at,
        }
    }

    /// bind the draft to a chain, a freshly read nonce and the destination contract
    pub fn bind(
        &self,
        chain_id: u64,
        nonce: U256,
        destination: Address,
        now: u64,
    ) -> Result<OrderIntent> {
        if self.expires_at() <= now {
            return Err(PrimitivesError::IntentError(format!(
                "intent expired at {} (now {now})",
                self.expires_at()
            )));
        }
        let header = IntentHeader {
            trader: self.trader(),
            chain_id,
            nonce,
            expires_at: self.expires_at(),
            destination,
        };
        Ok(match self {
            OrderDraft::LimitOpen(draft) => OrderIntent::LimitOpen(draft.bind(header)),
            OrderDraft::LimitClose(draft) => OrderIntent::LimitClose(draft.bind(header)),
            OrderDraft::StopLoss(draft) => OrderIntent::StopLoss(draft.bind(header)),
        })
    }
}

/// An intent together with its signature and, when a session key signed it, the session's
/// delegation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIntent<I> {
    pub intent: I,
    pub hash: B256,
    pub signature: PrimitiveSignature,
    pub signer: Address,
    pub session: Option<SessionAuthorization>,
}

/// Recover the address that produced `signature` over `hash` (EIP-191 over the 32 bytes)
pub fn recover_signer(hash: B256, signature: &PrimitiveSignature) -> Result<Address> {
    signature
        .recover_address_from_msg(hash)
        .map_err(|e| PrimitivesError::SignatureError(e.to_string()))
}

pub(crate) fn ensure_trader(trader: Address) -> Result<()> {
    if trader == Address::ZERO {
        return Err(PrimitivesError::InvalidAddress(
            "trader cannot be the zero address".into(),
        ));
    }
    Ok(())
}
