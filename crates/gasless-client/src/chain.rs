//! Typed access to the order contracts on each chain.
//!
//! Every read decodes into one fixed record; a shape or code mismatch fails with
//! `MalformedResponse` instead of being patched up at the call site.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use gasless_primitives::abi::erc20::IERC20;
use gasless_primitives::abi::limit_executor::{order_status, ILimitExecutor};
use gasless_primitives::alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use gasless_primitives::alloy::primitives::{Address, Bytes, B256, U256};
use gasless_primitives::alloy::providers::{Provider, ProviderBuilder};
use gasless_primitives::alloy::rpc::{Filter, TransactionRequest};
use gasless_primitives::alloy::sol_types::SolEvent;
use gasless_primitives::alloy::transports::{Transport, TransportError};
use gasless_primitives::chains::ChainRegistry;
use gasless_primitives::intents::OrderKind;

use crate::error::{ClientError, Result};

/// blocks searched backwards for a `LimitOrderCreated` event when matching it by nonce
const CREATED_ORDER_LOOKBACK_BLOCKS: u64 = 50_000;

/// A contract call that is either estimated or sent directly to a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl ContractCall {
    pub fn new(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to,
            data: data.into(),
            value: U256::ZERO,
        }
    }

    fn to_request(&self) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.from)
            .with_to(self.to)
            .with_input(self.data.clone())
            .with_value(self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Executed,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            order_status::PENDING => Ok(OrderStatus::Pending),
            order_status::EXECUTED => Ok(OrderStatus::Executed),
            order_status::CANCELLED => Ok(OrderStatus::Cancelled),
            order_status::EXPIRED => Ok(OrderStatus::Expired),
            other => Err(ClientError::MalformedResponse(format!(
                "unknown order status code {other}"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// Order as stored by the limit executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnchainOrder {
    pub id: U256,
    pub trader: Address,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub position_id: U256,
    pub trigger_price: U256,
    pub expires_at: u64,
}

impl TryFrom<ILimitExecutor::LimitOrder> for OnchainOrder {
    type Error = ClientError;

    fn try_from(order: ILimitExecutor::LimitOrder) -> Result<Self> {
        let kind = OrderKind::from_code(order.orderType).ok_or_else(|| {
            ClientError::MalformedResponse(format!("unknown order type {}", order.orderType))
        })?;
        let expires_at = u64::try_from(order.expiresAt).map_err(|_| {
            ClientError::MalformedResponse(format!("expiry {} overflows u64", order.expiresAt))
        })?;
        Ok(Self {
            id: order.id,
            trader: order.trader,
            kind,
            status: OrderStatus::from_code(order.status)?,
            position_id: order.positionId,
            trigger_price: order.triggerPrice,
            expires_at,
        })
    }
}

/// A `LimitOrderCreated` event and the transaction that emitted it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_id: U256,
    pub tx_hash: B256,
}

/// Read/write surface of a chain's order contracts
#[async_trait]
pub trait OrderContractClient: Send + Sync {
    /// authoritative nonce for `user` on the executor
    async fn user_nonce(&self, executor: Address, user: Address) -> Result<U256>;

    async fn order(&self, executor: Address, order_id: U256) -> Result<OnchainOrder>;

    /// order id emitted by the executor in the given transaction, `None` while unmined
    async fn created_order_id(&self, executor: Address, tx_hash: B256) -> Result<Option<U256>>;

    /// the order created for `trader` with `nonce`, if the executor emitted one recently
    async fn created_order_by_nonce(
        &self,
        executor: Address,
        trader: Address,
        nonce: U256,
    ) -> Result<Option<CreatedOrder>>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64>;

    async fn send_transaction(&self, call: &ContractCall, gas_limit: u64) -> Result<B256>;
}

/// `OrderContractClient` backed by an alloy provider
pub struct RpcOrderContractClient<T, P> {
    chain_id: u64,
    provider: P,
    phantom_data: PhantomData<fn() -> T>,
}

impl<T, P> RpcOrderContractClient<T, P>
where
    T: Transport + Clone,
    P: Provider<T, Ethereum> + Clone,
{
    pub fn new(chain_id: u64, provider: P) -> Self {
        Self {
            chain_id,
            provider,
            phantom_data: PhantomData,
        }
    }

    fn transport_error(&self, e: TransportError) -> ClientError {
        match e.as_error_resp() {
            // the node answered, the call itself failed
            Some(payload) => ClientError::MalformedResponse(format!(
                "chain {} returned error {}: {}",
                self.chain_id, payload.code, payload.message
            )),
            None => ClientError::ChainUnreachable {
                chain_id: self.chain_id,
                message: e.to_string(),
            },
        }
    }

    fn contract_error(&self, e: gasless_primitives::alloy::contract::Error) -> ClientError {
        match e {
            gasless_primitives::alloy::contract::Error::TransportError(e) => {
                self.transport_error(e)
            }
            other => ClientError::MalformedResponse(other.to_string()),
        }
    }
}

#[async_trait]
impl<T, P> OrderContractClient for RpcOrderContractClient<T, P>
where
    T: Transport + Clone,
    P: Provider<T, Ethereum> + Clone + 'static,
{
    async fn user_nonce(&self, executor: Address, user: Address) -> Result<U256> {
        let contract = ILimitExecutor::new(executor, self.provider.clone());
        let nonce = contract
            .getUserNonce(user)
            .call()
            .await
            .map_err(|e| self.contract_error(e))?
            .nonce;
        Ok(nonce)
    }

    async fn order(&self, executor: Address, order_id: U256) -> Result<OnchainOrder> {
        let contract = ILimitExecutor::new(executor, self.provider.clone());
        let order = contract
            .getOrder(order_id)
            .call()
            .await
            .map_err(|e| self.contract_error(e))?
            .order;
        OnchainOrder::try_from(order)
    }

    async fn created_order_id(&self, executor: Address, tx_hash: B256) -> Result<Option<U256>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| self.transport_error(e))?;
        let Some(receipt) = receipt else {
            return Ok(None);
        };
        for log in receipt.inner.logs() {
            if log.address() != executor {
                continue;
            }
            if let Ok(created) = log.log_decode::<ILimitExecutor::LimitOrderCreated>() {
                return Ok(Some(created.inner.data.orderId));
            }
        }
        Err(ClientError::MalformedResponse(format!(
            "transaction {tx_hash} has no LimitOrderCreated event from {executor}"
        )))
    }

    async fn created_order_by_nonce(
        &self,
        executor: Address,
        trader: Address,
        nonce: U256,
    ) -> Result<Option<CreatedOrder>> {
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| self.transport_error(e))?;
        let filter = Filter::new()
            .address(executor)
            .event_signature(ILimitExecutor::LimitOrderCreated::SIGNATURE_HASH)
            .topic2(trader.into_word())
            .from_block(latest.saturating_sub(CREATED_ORDER_LOOKBACK_BLOCKS));
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| self.transport_error(e))?;
        for log in logs {
            let tx_hash = log.transaction_hash;
            let created = log
                .log_decode::<ILimitExecutor::LimitOrderCreated>()
                .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;
            if created.inner.data.nonce != nonce {
                continue;
            }
            let tx_hash = tx_hash.ok_or_else(|| {
                ClientError::MalformedResponse("LimitOrderCreated log without tx hash".into())
            })?;
            return Ok(Some(CreatedOrder {
                order_id: created.inner.data.orderId,
                tx_hash,
            }));
        }
        Ok(None)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let contract = IERC20::new(token, self.provider.clone());
        let remaining = contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| self.contract_error(e))?
            .remaining;
        Ok(remaining)
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64> {
        self.provider
            .estimate_gas(&call.to_request())
            .await
            .map_err(|e| self.transport_error(e))
    }

    async fn send_transaction(&self, call: &ContractCall, gas_limit: u64) -> Result<B256> {
        let request = call.to_request().with_gas_limit(gas_limit);
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(*pending.tx_hash())
    }
}

/// Per-chain order contract clients, keyed by chain id
#[derive(Clone, Default)]
pub struct ChainClients {
    clients: HashMap<u64, Arc<dyn OrderContractClient>>,
}

impl std::fmt::Debug for ChainClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClients")
            .field("chains", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ChainClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// http providers for every chain in the registry; `wallet` is only needed for direct
    /// (non-relayed) submissions
    pub fn connect(registry: &ChainRegistry, wallet: Option<EthereumWallet>) -> Result<Self> {
        let mut clients = Self::new();
        for chain_id in registry.chain_ids() {
            let descriptor = registry.resolve(chain_id)?;
            let rpc_url = descriptor.rpc_url.clone();
            match &wallet {
                Some(wallet) => {
                    let provider = ProviderBuilder::new()
                        .with_recommended_fillers()
                        .wallet(wallet.clone())
                        .on_http(rpc_url);
                    let client = RpcOrderContractClient::new(chain_id, provider);
                    clients.insert(chain_id, Arc::new(client));
                }
                None => {
                    let provider = ProviderBuilder::new().on_http(rpc_url);
                    let client = RpcOrderContractClient::new(chain_id, provider);
                    clients.insert(chain_id, Arc::new(client));
                }
            }
            tracing::debug!("connected order contract client for {}", descriptor);
        }
        Ok(clients)
    }

    pub fn insert(&mut self, chain_id: u64, client: Arc<dyn OrderContractClient>) {
        self.clients.insert(chain_id, client);
    }

    pub fn get(&self, chain_id: u64) -> Result<Arc<dyn OrderContractClient>> {
        self.clients
            .get(&chain_id)
            .cloned()
            .ok_or(ClientError::UnknownChain(chain_id))
    }
}
