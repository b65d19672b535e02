//! Chain descriptors and the registry every component routes through.
//!
//! Routing is always explicit: callers name the chain id on each call, the registry never
//! tracks a "current" chain.

use std::collections::HashMap;
use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{PrimitivesError, Result};

/// Contract addresses deployed on a single chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAddresses {
    pub position_manager: Address,
    pub limit_executor: Address,
    pub tap_to_trade_executor: Address,
    pub one_tap_profit: Address,
    pub usdc: Address,
    pub paymaster: Address,
}

/// Network parameters for one chain. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub name: String,
    /// chain identifier the relay expects in request bodies
    pub relay_chain: String,
    pub rpc_url: Url,
    pub contracts: ContractAddresses,
}

impl fmt::Display for ChainDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

/// Read-only mapping from chain id to its descriptor
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainDescriptor>,
}

impl ChainRegistry {
    pub fn new(descriptors: impl IntoIterator<Item = ChainDescriptor>) -> Result<Self> {
        let mut chains = HashMap::new();
        for descriptor in descriptors {
            let chain_id = descriptor.chain_id;
            if chains.insert(chain_id, descriptor).is_some() {
                return Err(PrimitivesError::DuplicateChain(chain_id));
            }
        }
        Ok(Self { chains })
    }

    pub fn resolve(&self, chain_id: u64) -> Result<&ChainDescriptor> {
        self.chains
            .get(&chain_id)
            .ok_or(PrimitivesError::UnknownChain(chain_id))
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.chains.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
