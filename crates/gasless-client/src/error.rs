use std::fmt;

use gasless_primitives::alloy::primitives::U256;
use gasless_primitives::PrimitivesError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable reason a relay refused a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    InsufficientAllowance,
    InsufficientBalance,
    InvalidSignature,
    StaleNonce,
    OrderExpired,
    SessionUnauthorized,
    Other(String),
}

impl RejectionReason {
    /// map the relay's `error` code onto a reason, unknown codes are kept verbatim
    pub fn from_code(code: &str) -> Self {
        let normalized = code.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "INSUFFICIENT_ALLOWANCE" => RejectionReason::InsufficientAllowance,
            "INSUFFICIENT_BALANCE" | "INSUFFICIENT_DEPOSIT" => {
                RejectionReason::InsufficientBalance
            }
            "INVALID_SIGNATURE" => RejectionReason::InvalidSignature,
            "STALE_NONCE" | "INVALID_NONCE" | "NONCE_TOO_LOW" => RejectionReason::StaleNonce,
            "ORDER_EXPIRED" | "EXPIRED" => RejectionReason::OrderExpired,
            "SESSION_UNAUTHORIZED" | "INVALID_SESSION" => RejectionReason::SessionUnauthorized,
            _ => RejectionReason::Other(code.trim().to_string()),
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::InsufficientAllowance => write!(f, "insufficient allowance"),
            RejectionReason::InsufficientBalance => write!(f, "insufficient balance"),
            RejectionReason::InvalidSignature => write!(f, "invalid signature"),
            RejectionReason::StaleNonce => write!(f, "stale nonce"),
            RejectionReason::OrderExpired => write!(f, "order expired"),
            RejectionReason::SessionUnauthorized => write!(f, "session not authorized"),
            RejectionReason::Other(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unknown chain: {0}")]
    UnknownChain(u64),
    #[error("Chain {chain_id} unreachable: {message}")]
    ChainUnreachable { chain_id: u64, message: String },
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Session key delegation denied: {0}")]
    DelegationDenied(String),
    #[error("Session key for chain {0} expired")]
    SessionExpired(u64),
    #[error("No signer available: {0}")]
    SignerUnavailable(String),
    #[error("Failed intent signing: {0}")]
    SigningError(String),
    #[error("Relay rejected submission: {reason}")]
    RelayRejected { reason: RejectionReason },
    #[error("Relay unreachable: {0}")]
    RelayUnreachable(String),
    #[error("Nonce {0} already consumed on chain")]
    StaleNonce(U256),
    #[error("{0} timed out, outcome unknown")]
    Timeout(&'static str),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Invalid order state transition: {0}")]
    InvalidTransition(String),
    #[error("Session storage error: {0}")]
    Storage(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Failed to parse relay url: {0}")]
    RelayUrlParsingError(String),
    #[error("Order tracking stopped before a terminal status")]
    TrackingCancelled,
    #[error("Primitives error: {0}")]
    PrimitivesError(PrimitivesError),
}

impl From<PrimitivesError> for ClientError {
    fn from(e: PrimitivesError) -> Self {
        match e {
            PrimitivesError::UnknownChain(chain_id) => ClientError::UnknownChain(chain_id),
            PrimitivesError::InvalidAddress(msg) => ClientError::InvalidAddress(msg),
            other => ClientError::PrimitivesError(other),
        }
    }
}

impl ClientError {
    /// transient faults are retried with a fresh nonce read, never a blind resubmission
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::ChainUnreachable { .. }
                | ClientError::RelayUnreachable(_)
                | ClientError::Timeout(_)
        )
    }

    /// stale nonce errors force a rebuild from scratch
    pub fn is_stale_nonce(&self) -> bool {
        matches!(
            self,
            ClientError::StaleNonce(_)
                | ClientError::RelayRejected {
                    reason: RejectionReason::StaleNonce
                }
        )
    }

    /// message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            ClientError::UnknownChain(id) => format!("chain {id} is not supported"),
            ClientError::ChainUnreachable { chain_id, .. } => {
                format!("network {chain_id} is unreachable, please retry")
            }
            ClientError::InvalidAddress(addr) => format!("invalid address: {addr}"),
            ClientError::DelegationDenied(_) => {
                "session authorization was declined, please approve it in your wallet".into()
            }
            ClientError::SessionExpired(_) => "session expired, please re-authorize".into(),
            ClientError::SignerUnavailable(_) => "connect a wallet to continue".into(),
            ClientError::SigningError(_) => "signature request failed, please retry".into(),
            ClientError::RelayRejected { reason } => format!("order rejected: {reason}"),
            ClientError::RelayUnreachable(_) => "relay is unreachable, please retry".into(),
            ClientError::StaleNonce(_) => "order was superseded, rebuilding".into(),
            ClientError::Timeout(_) => "status unknown, checking…".into(),
            ClientError::MalformedResponse(_) => "unexpected response from the network".into(),
            ClientError::TrackingCancelled => "stopped watching the order".into(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = core::result::Result<T, ClientError>;
