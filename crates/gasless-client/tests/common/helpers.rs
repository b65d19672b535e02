use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gasless_client::api::types::{
    CancelOrderRequest, ClosePositionRequest, DepositBalance, ExecutionFee, ExecutionFeeQuery,
    RelayTransactionRequest, RelayTransactionResponse, TxHashResponse,
};
use gasless_client::api::RelayService;
use gasless_client::chain::{
    ChainClients, ContractCall, CreatedOrder, OnchainOrder, OrderContractClient, OrderStatus,
};
use gasless_client::config::ClientConfig;
use gasless_client::error::{ClientError, RejectionReason, Result};
use gasless_client::session::{ManualClock, MemorySessionStorage, SessionStorage};
use gasless_client::signer::WalletSigner;
use gasless_client::OrderLifecycleController;
use gasless_primitives::alloy::primitives::{Address, B256, U256};
use gasless_primitives::alloy::signers::PrivateKeySigner;
use gasless_primitives::intents::OrderKind;

use super::fixtures::{ARBITRUM_SEPOLIA, BASE_SEPOLIA, T0};

/// In-memory stand-in for one chain's order contracts
#[derive(Default)]
pub struct MockChain {
    nonces: Mutex<HashMap<Address, VecDeque<U256>>>,
    pub nonce_reads: AtomicUsize,
    statuses: Mutex<VecDeque<OrderStatus>>,
    pub order_expiry: AtomicU64,
    receipts: Mutex<HashMap<B256, U256>>,
    pub receipts_unreachable: AtomicBool,
    created: Mutex<HashMap<(Address, U256), CreatedOrder>>,
    pub gas_estimate: AtomicU64,
    pub allowance: AtomicU64,
    pub sent: Mutex<Vec<(ContractCall, u64)>>,
    pub unreachable: AtomicBool,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        let chain = Self::default();
        chain.order_expiry.store(T0 + 30 * 24 * 3600, Ordering::SeqCst);
        chain.gas_estimate.store(100_000, Ordering::SeqCst);
        Arc::new(chain)
    }

    /// successive reads return these values, the last one repeats
    pub fn set_nonces(&self, user: Address, nonces: &[u64]) {
        self.nonces
            .lock()
            .unwrap()
            .insert(user, nonces.iter().map(|n| U256::from(*n)).collect());
    }

    pub fn set_statuses(&self, statuses: &[OrderStatus]) {
        *self.statuses.lock().unwrap() = statuses.iter().copied().collect();
    }

    pub fn add_receipt(&self, tx_hash: B256, order_id: u64) {
        self.receipts.lock().unwrap().insert(tx_hash, U256::from(order_id));
    }

    /// a `LimitOrderCreated` event for `trader` with `nonce`
    pub fn add_created(&self, trader: Address, nonce: u64, order_id: u64, tx_hash: B256) {
        let created = CreatedOrder {
            order_id: U256::from(order_id),
            tx_hash,
        };
        self.created
            .lock()
            .unwrap()
            .insert((trader, U256::from(nonce)), created);
    }
}

#[async_trait]
impl OrderContractClient for MockChain {
    async fn user_nonce(&self, _executor: Address, user: Address) -> Result<U256> {
        self.nonce_reads.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ClientError::ChainUnreachable {
                chain_id: 0,
                message: "connection refused".into(),
            });
        }
        let mut nonces = self.nonces.lock().unwrap();
        let queue = nonces.entry(user).or_default();
        let nonce = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().copied().unwrap_or_default()
        };
        Ok(nonce)
    }

    async fn order(&self, _executor: Address, order_id: U256) -> Result<OnchainOrder> {
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front().unwrap_or(OrderStatus::Pending)
        } else {
            statuses.front().copied().unwrap_or(OrderStatus::Pending)
        };
        Ok(OnchainOrder {
            id: order_id,
            trader: Address::ZERO,
            kind: OrderKind::LimitOpen,
            status,
            position_id: U256::ZERO,
            trigger_price: U256::from(1),
            expires_at: self.order_expiry.load(Ordering::SeqCst),
        })
    }

    async fn created_order_id(&self, _executor: Address, tx_hash: B256) -> Result<Option<U256>> {
        if self.receipts_unreachable.load(Ordering::SeqCst) {
            return Err(ClientError::ChainUnreachable {
                chain_id: 0,
                message: "receipt read failed".into(),
            });
        }
        Ok(self.receipts.lock().unwrap().get(&tx_hash).copied())
    }

    async fn created_order_by_nonce(
        &self,
        _executor: Address,
        trader: Address,
        nonce: U256,
    ) -> Result<Option<CreatedOrder>> {
        Ok(self.created.lock().unwrap().get(&(trader, nonce)).copied())
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256> {
        Ok(U256::from(self.allowance.load(Ordering::SeqCst)))
    }

    async fn estimate_gas(&self, _call: &ContractCall) -> Result<u64> {
        Ok(self.gas_estimate.load(Ordering::SeqCst))
    }

    async fn send_transaction(&self, call: &ContractCall, gas_limit: u64) -> Result<B256> {
        self.sent.lock().unwrap().push((call.clone(), gas_limit));
        Ok(B256::repeat_byte(0xd1))
    }
}

/// What the mock relay does with the next `/relay/transaction` call
#[derive(Debug, Clone, Copy)]
pub enum RelayScript {
    /// accept, assigning the given id or the next sequential one
    Accept { order_id: Option<u64> },
    /// accept without an order id, leaving it to the receipt
    AcceptWithoutId,
    Reject(&'static str),
    Hang,
}

#[derive(Default)]
pub struct MockRelay {
    script: Mutex<VecDeque<RelayScript>>,
    next_order_id: AtomicU64,
    pub transactions: Mutex<Vec<RelayTransactionRequest>>,
    pub cancels: Mutex<Vec<CancelOrderRequest>>,
    pub closes: Mutex<Vec<ClosePositionRequest>>,
}

impl MockRelay {
    pub fn new() -> Arc<Self> {
        let relay = Self::default();
        relay.next_order_id.store(42, Ordering::SeqCst);
        Arc::new(relay)
    }

    pub fn script(&self, steps: &[RelayScript]) {
        self.script.lock().unwrap().extend(steps.iter().cloned());
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.lock().unwrap().len()
    }

    fn next_step(&self) -> RelayScript {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RelayScript::Accept { order_id: None })
    }

    async fn play(&self, step: RelayScript) -> Result<()> {
        match step {
            RelayScript::Accept { .. } | RelayScript::AcceptWithoutId => Ok(()),
            RelayScript::Reject(code) => Err(ClientError::RelayRejected {
                reason: RejectionReason::from_code(code),
            }),
            RelayScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RelayService for MockRelay {
    async fn relay_transaction(
        &self,
        request: &RelayTransactionRequest,
    ) -> Result<RelayTransactionResponse> {
        self.transactions.lock().unwrap().push(request.clone());
        let step = self.next_step();
        let order_id = match &step {
            RelayScript::Accept { order_id: Some(id) } => Some(U256::from(*id)),
            RelayScript::Accept { order_id: None } => {
                Some(U256::from(self.next_order_id.fetch_add(1, Ordering::SeqCst)))
            }
            _ => None,
        };
        self.play(step).await?;
        Ok(RelayTransactionResponse {
            tx_hash: B256::repeat_byte(0xaa),
            gas_used: Some(U256::from(250_000)),
            usdc_charged: Some(U256::from(12_000)),
            order_id,
        })
    }

    async fn close_position(&self, request: &ClosePositionRequest) -> Result<TxHashResponse> {
        self.closes.lock().unwrap().push(request.clone());
        Ok(TxHashResponse {
            tx_hash: B256::repeat_byte(0xcc),
        })
    }

    async fn cancel_order(&self, request: &CancelOrderRequest) -> Result<TxHashResponse> {
        self.cancels.lock().unwrap().push(request.clone());
        let step = self.next_step();
        self.play(step).await?;
        Ok(TxHashResponse {
            tx_hash: B256::repeat_byte(0xbb),
        })
    }

    async fn execution_fee(&self, query: &ExecutionFeeQuery) -> Result<ExecutionFee> {
        Ok(ExecutionFee {
            gas_estimate: U256::from(query.estimated_gas),
            base_cost: U256::from(10_000),
            recommended_max_execution_fee: U256::from(12_000),
            buffer_bps: query.buffer_bps,
        })
    }

    async fn deposit_balance(&self, _address: Address) -> Result<DepositBalance> {
        Ok(DepositBalance {
            deposit: U256::from(50_000_000),
        })
    }
}

pub struct TestHarness {
    pub controller: OrderLifecycleController,
    pub base: Arc<MockChain>,
    pub arbitrum: Arc<MockChain>,
    pub relay: Arc<MockRelay>,
    pub clock: Arc<ManualClock>,
    pub storage: Arc<MemorySessionStorage>,
    pub wallet: PrivateKeySigner,
}

pub fn setup_harness(config: &ClientConfig, wallet: Option<PrivateKeySigner>) -> TestHarness {
    let wallet = wallet.unwrap_or_else(PrivateKeySigner::random);
    let base = MockChain::new();
    let arbitrum = MockChain::new();
    let relay = MockRelay::new();
    let clock = Arc::new(ManualClock::new(T0));
    let storage = Arc::new(MemorySessionStorage::new(config.origin.clone()));

    let mut chains = ChainClients::new();
    chains.insert(BASE_SEPOLIA, base.clone());
    chains.insert(ARBITRUM_SEPOLIA, arbitrum.clone());

    let primary: Arc<dyn WalletSigner> = Arc::new(wallet.clone());
    let controller = OrderLifecycleController::from_config(
        config,
        chains,
        relay.clone(),
        Some(primary),
        storage.clone() as Arc<dyn SessionStorage>,
        clock.clone(),
    )
    .unwrap();

    TestHarness {
        controller,
        base,
        arbitrum,
        relay,
        clock,
        storage,
        wallet,
    }
}
