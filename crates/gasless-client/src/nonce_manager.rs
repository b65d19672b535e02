use std::sync::Arc;
use std::time::Duration;

use gasless_primitives::alloy::primitives::{Address, U256};
use gasless_primitives::chains::ChainDescriptor;

use crate::chain::ChainClients;
use crate::error::{ClientError, Result};

/// Reads the executor's per-user nonce. Nothing is cached, the chain is the only
/// source of truth and every call does a fresh read.
#[derive(Debug, Clone)]
pub struct NonceSequencer {
    clients: Arc<ChainClients>,
    timeout: Duration,
}

impl NonceSequencer {
    pub fn new(clients: Arc<ChainClients>, timeout: Duration) -> Self {
        Self { clients, timeout }
    }

    pub async fn next_nonce(&self, user: Address, chain: &ChainDescriptor) -> Result<U256> {
        if user == Address::ZERO {
            return Err(ClientError::InvalidAddress(
                "cannot read the nonce of the zero address".into(),
            ));
        }
        let client = self.clients.get(chain.chain_id)?;
        let executor = chain.contracts.limit_executor;
        let nonce = tokio::time::timeout(self.timeout, client.user_nonce(executor, user))
            .await
            .map_err(|_| ClientError::Timeout("nonce read"))??;
        tracing::debug!("nonce for {} on {}: {}", user, chain, nonce);
        Ok(nonce)
    }
}
