use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitivesError {
    #[error("Unknown chain: {0}")]
    UnknownChain(u64),
    #[error("Duplicate chain descriptor for chain id {0}")]
    DuplicateChain(u64),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid intent: {0}")]
    IntentError(String),
    #[error("Invalid amount: {0}")]
    AmountError(String),
    #[error("Invalid signature: {0}")]
    SignatureError(String),
    #[error("Invalid session key: {0}")]
    SessionError(String),
}

pub type Result<T> = core::result::Result<T, PrimitivesError>;
