//! Session keys: short-lived per-chain signing keys delegated by the primary wallet.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gasless_primitives::alloy::primitives::{Address, B256};
use gasless_primitives::alloy::signers::PrivateKeySigner;
use gasless_primitives::session::{delegation_hash, SessionAuthorization};

use crate::error::{ClientError, Result};
use crate::signer::WalletSigner;

pub mod storage;

pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage, StoredSessionKey};

/// Source of unix time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A delegated signing key scoped to one chain
#[derive(Clone)]
pub struct SessionKey {
    signer: PrivateKeySigner,
    authorization: SessionAuthorization,
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("address", &self.address())
            .field("owner", &self.owner())
            .field("chain_id", &self.chain_id())
            .field("expires_at", &self.expires_at())
            .finish_non_exhaustive()
    }
}

impl SessionKey {
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn authorization(&self) -> &SessionAuthorization {
        &self.authorization
    }

    pub fn address(&self) -> Address {
        self.authorization.session_address
    }

    pub fn owner(&self) -> Address {
        self.authorization.owner
    }

    pub fn chain_id(&self) -> u64 {
        self.authorization.chain_id
    }

    pub fn created_at(&self) -> u64 {
        self.authorization.created_at
    }

    pub fn expires_at(&self) -> u64 {
        self.authorization.expires_at
    }

    pub fn is_live(&self, now: u64) -> bool {
        self.authorization.is_live(now)
    }

    fn to_record(&self) -> StoredSessionKey {
        StoredSessionKey {
            private_key: self.signer.to_bytes(),
            authorization: self.authorization.clone(),
        }
    }

    fn from_record(record: StoredSessionKey, product: &str) -> Result<Self> {
        let signer = PrivateKeySigner::from_bytes(&record.private_key)
            .map_err(|e| ClientError::Storage(format!("bad session key material: {e}")))?;
        if signer.address() != record.authorization.session_address {
            return Err(ClientError::Storage(
                "session key material does not match its address".into(),
            ));
        }
        record.authorization.verify(product)?;
        Ok(Self {
            signer,
            authorization: record.authorization,
        })
    }
}

/// Result of looking a chain up in the store
#[derive(Debug)]
pub enum SessionLookup {
    Live(SessionKey),
    Expired,
    Absent,
}

pub struct SessionKeyStore {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    product: String,
}

impl fmt::Debug for SessionKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeyStore")
            .field("origin", &self.storage.origin())
            .field("product", &self.product)
            .finish()
    }
}

impl SessionKeyStore {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
        product: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            clock,
            product: product.into(),
        }
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Generate a key for `chain_id`, have the primary wallet sign the delegation once and
    /// persist it, replacing any previous key for the chain.
    pub async fn create(
        &self,
        user: Address,
        chain_id: u64,
        duration: Duration,
        primary: &dyn WalletSigner,
    ) -> Result<SessionKey> {
        if primary.address() != user {
            return Err(ClientError::DelegationDenied(format!(
                "primary wallet {} is not the user {}",
                primary.address(),
                user
            )));
        }
        if duration.as_secs() == 0 {
            return Err(ClientError::ConfigError(
                "session duration must be at least one second".into(),
            ));
        }

        let signer = PrivateKeySigner::random();
        let created_at = self.clock.now();
        let expires_at = created_at.checked_add(duration.as_secs()).ok_or_else(|| {
            ClientError::ConfigError(format!("session duration {duration:?} overflows expiry"))
        })?;
        let hash: B256 = delegation_hash(signer.address(), &self.product, expires_at);
        let signature = primary
            .sign_hash_message(hash)
            .await
            .map_err(|e| ClientError::DelegationDenied(e.to_string()))?;

        let authorization = SessionAuthorization {
            session_address: signer.address(),
            owner: user,
            chain_id,
            created_at,
            expires_at,
            signature,
        };
        authorization
            .verify(&self.product)
            .map_err(|e| ClientError::DelegationDenied(e.to_string()))?;

        let key = SessionKey {
            signer,
            authorization,
        };
        self.storage.put(&key.to_record())?;
        tracing::info!(
            "session key {} authorized by {} on chain {} until {}",
            key.address(),
            user,
            chain_id,
            expires_at
        );
        Ok(key)
    }

    /// `user`'s live key for the chain; expired or invalid records are purged on the way.
    /// A key delegated by another wallet is left in place and reported absent.
    pub fn lookup(&self, user: Address, chain_id: u64) -> Result<SessionLookup> {
        let Some(record) = self.storage.get(chain_id)? else {
            return Ok(SessionLookup::Absent);
        };
        let key = match SessionKey::from_record(record, &self.product) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("purging invalid session key for chain {}: {}", chain_id, e);
                self.storage.remove(chain_id)?;
                return Ok(SessionLookup::Absent);
            }
        };
        if key.owner() != user {
            tracing::debug!("session key for chain {} belongs to {}", chain_id, key.owner());
            return Ok(SessionLookup::Absent);
        }
        if !key.is_live(self.clock.now()) {
            tracing::debug!("session key for chain {} expired, purging", chain_id);
            self.storage.remove(chain_id)?;
            return Ok(SessionLookup::Expired);
        }
        Ok(SessionLookup::Live(key))
    }

    pub fn get(&self, user: Address, chain_id: u64) -> Result<Option<SessionKey>> {
        match self.lookup(user, chain_id)? {
            SessionLookup::Live(key) => Ok(Some(key)),
            SessionLookup::Expired | SessionLookup::Absent => Ok(None),
        }
    }

    pub fn is_valid(&self, user: Address, chain_id: u64) -> bool {
        match self.lookup(user, chain_id) {
            Ok(SessionLookup::Live(_)) => true,
            Ok(_) => false,
            Err(e) => {
                tracing::warn!("session lookup for chain {} failed: {}", chain_id, e);
                false
            }
        }
    }

    pub fn clear(&self, chain_id: u64) -> Result<()> {
        self.storage.remove(chain_id)
    }

    /// drop every key of this origin
    pub fn clear_all(&self) -> Result<()> {
        for chain_id in self.storage.chain_ids()? {
            self.storage.remove(chain_id)?;
        }
        Ok(())
    }
}
