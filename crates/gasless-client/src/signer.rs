//! Intent signing with either the primary wallet or a chain's session key.
//!
//! Both signers produce an EIP-191 personal-message signature over the raw 32 bytes of the
//! intent hash, so the relay verifies them the same way.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gasless_primitives::alloy::primitives::{Address, PrimitiveSignature, B256};
use gasless_primitives::alloy::signers::{PrivateKeySigner, Signer};
use gasless_primitives::intents::{recover_signer, SignedIntent};
use gasless_primitives::session::SessionAuthorization;

use crate::error::{ClientError, Result};
use crate::session::{SessionKeyStore, SessionLookup};

/// A wallet that can sign on the user's behalf, usually behind a confirmation prompt
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_hash_message(&self, hash: B256) -> Result<PrimitiveSignature>;
}

#[async_trait]
impl WalletSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_hash_message(&self, hash: B256) -> Result<PrimitiveSignature> {
        self.sign_message(hash.as_slice())
            .await
            .map_err(|e| ClientError::SigningError(e.to_string()))
    }
}

/// how long a wallet may sit on a signature request before the flow gives up
pub const DEFAULT_SIGNATURE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    Primary,
    /// `owner`'s session key for the chain
    Session { owner: Address, chain_id: u64 },
}

/// Signature plus who produced it
#[derive(Debug, Clone)]
pub struct IntentSignature {
    pub signature: PrimitiveSignature,
    pub signer: Address,
    pub session: Option<SessionAuthorization>,
}

impl IntentSignature {
    pub fn attach<I>(self, intent: I, hash: B256) -> SignedIntent<I> {
        SignedIntent {
            intent,
            hash,
            signature: self.signature,
            signer: self.signer,
            session: self.session,
        }
    }
}

pub struct SigningClient {
    primary: Option<Arc<dyn WalletSigner>>,
    sessions: Arc<SessionKeyStore>,
    signature_timeout: Duration,
}

impl fmt::Debug for SigningClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningClient")
            .field("primary", &self.primary.as_ref().map(|p| p.address()))
            .field("sessions", &self.sessions)
            .field("signature_timeout", &self.signature_timeout)
            .finish()
    }
}

impl SigningClient {
    pub fn new(primary: Option<Arc<dyn WalletSigner>>, sessions: Arc<SessionKeyStore>) -> Self {
        Self {
            primary,
            sessions,
            signature_timeout: DEFAULT_SIGNATURE_TIMEOUT,
        }
    }

    pub fn signature_timeout(mut self, timeout: Duration) -> Self {
        self.signature_timeout = timeout;
        self
    }

    /// Ask `wallet` to sign, bounded by the signature timeout
    pub async fn request_signature(
        &self,
        wallet: &dyn WalletSigner,
        hash: B256,
    ) -> Result<PrimitiveSignature> {
        tokio::time::timeout(self.signature_timeout, wallet.sign_hash_message(hash))
            .await
            .map_err(|_| ClientError::Timeout("signature request"))?
    }

    pub fn primary(&self) -> Option<&Arc<dyn WalletSigner>> {
        self.primary.as_ref()
    }

    pub fn sessions(&self) -> &Arc<SessionKeyStore> {
        &self.sessions
    }

    pub async fn sign(&self, hash: B256, kind: SignerKind) -> Result<IntentSignature> {
        match kind {
            SignerKind::Primary => {
                let primary = self.primary.as_ref().ok_or_else(|| {
                    ClientError::SignerUnavailable("no primary wallet connected".into())
                })?;
                let signature = self.request_signature(primary.as_ref(), hash).await?;
                tracing::debug!("signed {} with primary wallet {}", hash, primary.address());
                Ok(IntentSignature {
                    signature,
                    signer: primary.address(),
                    session: None,
                })
            }
            SignerKind::Session { owner, chain_id } => {
                let key = match self.sessions.lookup(owner, chain_id)? {
                    SessionLookup::Live(key) => key,
                    SessionLookup::Expired => return Err(ClientError::SessionExpired(chain_id)),
                    SessionLookup::Absent => {
                        return Err(ClientError::SignerUnavailable(format!(
                            "no session key for {owner} on chain {chain_id}"
                        )))
                    }
                };
                let signature = key.signer().sign_hash_message(hash).await?;
                tracing::debug!("signed {} with session key {}", hash, key.address());
                Ok(IntentSignature {
                    signature,
                    signer: key.address(),
                    session: Some(key.authorization().clone()),
                })
            }
        }
    }

    /// address that produced `signature` over `hash`
    pub fn recover(&self, hash: B256, signature: &PrimitiveSignature) -> Result<Address> {
        Ok(recover_signer(hash, signature)?)
    }
}
