//! Session key delegation message and the public authorization record.
//!
//! The delegation message is a compatibility contract with the relay's verifier:
//! `"Authorize session key " ‖ session address (20 bytes) ‖ " for <product> until " ‖
//! expiry (uint256, big-endian)`, hashed with keccak256 and signed by the primary wallet as
//! an EIP-191 personal message over the 32-byte hash.

use alloy::primitives::{keccak256, Address, PrimitiveSignature, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{PrimitivesError, Result};

pub const DELEGATION_PREFIX: &str = "Authorize session key ";

pub fn delegation_message(session_address: Address, product: &str, expires_at: u64) -> Vec<u8> {
    let until = format!(" for {product} until ");
    let mut message = Vec::with_capacity(DELEGATION_PREFIX.len() + 20 + until.len() + 32);
    message.extend_from_slice(DELEGATION_PREFIX.as_bytes());
    message.extend_from_slice(session_address.as_slice());
    message.extend_from_slice(until.as_bytes());
    message.extend_from_slice(&U256::from(expires_at).to_be_bytes::<32>());
    message
}

pub fn delegation_hash(session_address: Address, product: &str, expires_at: u64) -> B256 {
    keccak256(delegation_message(session_address, product, expires_at))
}

/// Public half of a session key: what the relay needs to accept session-signed intents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAuthorization {
    pub session_address: Address,
    pub owner: Address,
    pub chain_id: u64,
    pub created_at: u64,
    pub expires_at: u64,
    pub signature: PrimitiveSignature,
}

impl SessionAuthorization {
    pub fn delegation_hash(&self, product: &str) -> B256 {
        delegation_hash(self.session_address, product, self.expires_at)
    }

    /// checks the structural invariants and that the delegation signature recovers to the
    /// owner
    pub fn verify(&self, product: &str) -> Result<()> {
        if self.expires_at <= self.created_at {
            return Err(PrimitivesError::SessionError(format!(
                "expiry {} is not after creation {}",
                self.expires_at, self.created_at
            )));
        }
        let recovered = self
            .signature
            .recover_address_from_msg(self.delegation_hash(product))
            .map_err(|e| PrimitivesError::SignatureError(e.to_string()))?;
        if recovered != self.owner {
            return Err(PrimitivesError::SessionError(format!(
                "delegation signed by {recovered}, expected owner {}",
                self.owner
            )));
        }
        Ok(())
    }

    pub fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}
