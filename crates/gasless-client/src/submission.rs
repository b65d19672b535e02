//! Relay and direct submission of signed intents.

use std::sync::Arc;
use std::time::Duration;

use gasless_primitives::abi::erc20::IERC20;
use gasless_primitives::abi::limit_executor::ILimitExecutor;
use gasless_primitives::alloy::primitives::{Address, Bytes, B256, U256};
use gasless_primitives::alloy::sol_types::SolCall;
use gasless_primitives::chains::ChainDescriptor;
use gasless_primitives::intents::{CancelIntent, OrderIntent, OrderKind, SignedIntent};
use gasless_primitives::PrimitivesError;

use crate::api::types::{
    CancelOrderRequest, ClosePositionRequest, DepositBalance, ExecutionFee, ExecutionFeeQuery,
    RelayTransactionRequest, SessionKeyPayload,
};
use crate::api::RelayService;
use crate::chain::{ChainClients, ContractCall, CreatedOrder};
use crate::error::{ClientError, Result};

const BPS_DENOMINATOR: u64 = 10_000;
/// receipt lookups made before giving up on resolving an order id
const ORDER_ID_LOOKUPS: u32 = 5;

/// What the relay accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// `None` when neither the relay nor the receipt gave it yet; resolve it later with
    /// `RelaySubmissionClient::order_id_for_tx`
    pub order_id: Option<U256>,
    pub tx_hash: B256,
    pub gas_used: Option<U256>,
    pub usdc_charged: Option<U256>,
}

/// gas estimate plus `buffer_bps` basis points
pub fn pad_gas(estimate: u64, buffer_bps: u64) -> u64 {
    let padding = (u128::from(estimate) * u128::from(buffer_bps)) / u128::from(BPS_DENOMINATOR);
    estimate.saturating_add(u64::try_from(padding).unwrap_or(u64::MAX))
}

/// Executor calldata carrying the intent fields and its signature
pub fn encode_order_call(signed: &SignedIntent<OrderIntent>) -> Bytes {
    let signature = Bytes::from(signed.signature.as_bytes());
    let calldata = match &signed.intent {
        OrderIntent::LimitOpen(order) => ILimitExecutor::createLimitOpenOrderCall {
            trader: order.header.trader,
            symbol: order.symbol.clone(),
            isLong: order.is_long,
            collateral: order.collateral,
            leverage: order.leverage,
            triggerPrice: order.trigger_price,
            takeProfit: order.take_profit.unwrap_or_default(),
            stopLoss: order.stop_loss.unwrap_or_default(),
            nonce: order.header.nonce,
            expiresAt: U256::from(order.header.expires_at),
            signature,
        }
        .abi_encode(),
        OrderIntent::LimitClose(order) => ILimitExecutor::createLimitCloseOrderCall {
            trader: order.header.trader,
            positionId: order.position_id,
            triggerPrice: order.trigger_price,
            nonce: order.header.nonce,
            expiresAt: U256::from(order.header.expires_at),
            signature,
        }
        .abi_encode(),
        OrderIntent::StopLoss(order) => ILimitExecutor::createStopLossOrderCall {
            trader: order.header.trader,
            positionId: order.position_id,
            triggerPrice: order.trigger_price,
            nonce: order.header.nonce,
            expiresAt: U256::from(order.header.expires_at),
            signature,
        }
        .abi_encode(),
    };
    Bytes::from(calldata)
}

/// `approve(paymaster, amount)` on the chain's USDC token, sent directly by `owner`
pub fn paymaster_approval_call(
    chain: &ChainDescriptor,
    owner: Address,
    amount: U256,
) -> ContractCall {
    let data = IERC20::approveCall {
        spender: chain.contracts.paymaster,
        amount,
    }
    .abi_encode();
    ContractCall::new(owner, chain.contracts.usdc, data)
}

pub struct RelaySubmissionClient {
    relay: Arc<dyn RelayService>,
    chains: Arc<ChainClients>,
    timeout: Duration,
    gas_buffer_bps: u64,
    receipt_poll_interval: Duration,
}

impl std::fmt::Debug for RelaySubmissionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySubmissionClient")
            .field("chains", &self.chains)
            .field("timeout", &self.timeout)
            .field("gas_buffer_bps", &self.gas_buffer_bps)
            .finish()
    }
}

impl RelaySubmissionClient {
    pub fn new(
        relay: Arc<dyn RelayService>,
        chains: Arc<ChainClients>,
        timeout: Duration,
        gas_buffer_bps: u64,
    ) -> Self {
        Self {
            relay,
            chains,
            timeout,
            gas_buffer_bps,
            receipt_poll_interval: Duration::from_secs(1),
        }
    }

    pub fn receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    async fn with_timeout<T>(
        &self,
        what: &'static str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ClientError::Timeout(what))?
    }

    pub async fn submit(
        &self,
        chain: &ChainDescriptor,
        signed: &SignedIntent<OrderIntent>,
    ) -> Result<SubmissionReceipt> {
        let header = signed.intent.header();
        ensure_routed(chain, header.chain_id, header.destination)?;

        let request = RelayTransactionRequest {
            to: header.destination,
            data: encode_order_call(signed),
            user_address: header.trader,
            value: None,
            chain: chain.relay_chain.clone(),
            session_key: signed.session.as_ref().map(SessionKeyPayload::from),
        };
        tracing::info!(
            "submitting {} intent {} (nonce {}) to {}",
            signed.intent.kind().as_str(),
            signed.hash,
            header.nonce,
            chain
        );
        let response = self
            .with_timeout("submission", self.relay.relay_transaction(&request))
            .await?;

        // the relay has the transaction now: nothing below may turn this into a failure
        let order_id = match response.order_id {
            Some(order_id) => Some(order_id),
            None => match self.order_id_for_tx(chain, response.tx_hash).await {
                Ok(order_id) => Some(order_id),
                Err(e) => {
                    tracing::warn!(
                        "relay accepted tx {} but its order id is unresolved: {}",
                        response.tx_hash,
                        e
                    );
                    None
                }
            },
        };
        tracing::info!("order {:?} accepted in tx {}", order_id, response.tx_hash);
        Ok(SubmissionReceipt {
            order_id,
            tx_hash: response.tx_hash,
            gas_used: response.gas_used,
            usdc_charged: response.usdc_charged,
        })
    }

    /// order id from the executor's `LimitOrderCreated` event in `tx_hash`
    pub async fn order_id_for_tx(&self, chain: &ChainDescriptor, tx_hash: B256) -> Result<U256> {
        let client = self.chains.get(chain.chain_id)?;
        let executor = chain.contracts.limit_executor;
        for attempt in 1..=ORDER_ID_LOOKUPS {
            let lookup = self
                .with_timeout("receipt lookup", client.created_order_id(executor, tx_hash))
                .await?;
            if let Some(order_id) = lookup {
                return Ok(order_id);
            }
            tracing::debug!("receipt for {} not available yet (attempt {})", tx_hash, attempt);
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
        Err(ClientError::Timeout("order id resolution"))
    }

    /// the order `trader` created with `nonce`, found through the executor's event log
    pub async fn find_created_order(
        &self,
        chain: &ChainDescriptor,
        trader: Address,
        nonce: U256,
    ) -> Result<Option<CreatedOrder>> {
        let client = self.chains.get(chain.chain_id)?;
        let executor = chain.contracts.limit_executor;
        self.with_timeout(
            "created order lookup",
            client.created_order_by_nonce(executor, trader, nonce),
        )
        .await
    }

    pub async fn submit_cancel(
        &self,
        chain: &ChainDescriptor,
        signed: &SignedIntent<CancelIntent>,
    ) -> Result<B256> {
        ensure_routed(chain, signed.intent.chain_id, signed.intent.destination)?;
        let request = CancelOrderRequest {
            user_address: signed.intent.trader,
            order_id: signed.intent.order_id,
            signature: Bytes::from(signed.signature.as_bytes()),
            chain: chain.relay_chain.clone(),
        };
        tracing::info!("cancelling order {} on {}", signed.intent.order_id, chain);
        let response = self
            .with_timeout("cancel submission", self.relay.cancel_order(&request))
            .await?;
        Ok(response.tx_hash)
    }

    /// relay a call the relay forwards without interpreting it
    pub async fn submit_raw(
        &self,
        chain: &ChainDescriptor,
        to: Address,
        data: Bytes,
        from: Address,
    ) -> Result<B256> {
        let request = RelayTransactionRequest {
            to,
            data,
            user_address: from,
            value: None,
            chain: chain.relay_chain.clone(),
            session_key: None,
        };
        let response = self
            .with_timeout("raw submission", self.relay.relay_transaction(&request))
            .await?;
        Ok(response.tx_hash)
    }

    /// market close of an open position, executed by the relay
    pub async fn close_position(
        &self,
        chain: &ChainDescriptor,
        user: Address,
        position_id: U256,
        symbol: &str,
    ) -> Result<B256> {
        let request = ClosePositionRequest {
            user_address: user,
            position_id,
            symbol: symbol.to_string(),
            chain: chain.relay_chain.clone(),
        };
        tracing::info!("closing position {} ({}) on {}", position_id, symbol, chain);
        let response = self
            .with_timeout("close position", self.relay.close_position(&request))
            .await?;
        Ok(response.tx_hash)
    }

    pub async fn estimate_and_pad(
        &self,
        chain: &ChainDescriptor,
        call: &ContractCall,
    ) -> Result<u64> {
        let client = self.chains.get(chain.chain_id)?;
        let estimate = self
            .with_timeout("gas estimate", client.estimate_gas(call))
            .await?;
        let padded = pad_gas(estimate, self.gas_buffer_bps);
        tracing::debug!("gas estimate {} padded to {} on {}", estimate, padded, chain);
        Ok(padded)
    }

    /// send straight to the chain, paying gas from `call.from`
    pub async fn send_direct(&self, chain: &ChainDescriptor, call: &ContractCall) -> Result<B256> {
        let gas_limit = self.estimate_and_pad(chain, call).await?;
        let client = self.chains.get(chain.chain_id)?;
        let tx_hash = self
            .with_timeout("direct submission", client.send_transaction(call, gas_limit))
            .await?;
        tracing::info!("sent {} directly to {}", tx_hash, chain);
        Ok(tx_hash)
    }

    /// USDC the paymaster may still pull from `owner` to cover relayed gas
    pub async fn paymaster_allowance(
        &self,
        chain: &ChainDescriptor,
        owner: Address,
    ) -> Result<U256> {
        let client = self.chains.get(chain.chain_id)?;
        self.with_timeout(
            "allowance read",
            client.allowance(chain.contracts.usdc, owner, chain.contracts.paymaster),
        )
        .await
    }

    pub async fn execution_fee(&self, kind: OrderKind, estimated_gas: u64) -> Result<ExecutionFee> {
        let query = ExecutionFeeQuery {
            order_type: kind,
            estimated_gas,
            buffer_bps: self.gas_buffer_bps,
        };
        self.with_timeout("execution fee", self.relay.execution_fee(&query))
            .await
    }

    pub async fn deposit_balance(&self, address: Address) -> Result<DepositBalance> {
        self.with_timeout("deposit balance", self.relay.deposit_balance(address))
            .await
    }
}

/// a signature bound to another chain or contract would be rejected, so fail before sending
fn ensure_routed(chain: &ChainDescriptor, chain_id: u64, destination: Address) -> Result<()> {
    if chain_id != chain.chain_id || destination != chain.contracts.limit_executor {
        return Err(PrimitivesError::IntentError(format!(
            "intent for chain {chain_id} / {destination} routed to {chain}"
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasless_primitives::alloy::primitives::PrimitiveSignature;
    use gasless_primitives::intents::{CloseTriggerBuilder, LimitOpenBuilder};

    fn signed(intent: OrderIntent) -> SignedIntent<OrderIntent> {
        let hash = intent.signing_hash();
        SignedIntent {
            intent,
            hash,
            signature: PrimitiveSignature::new(U256::from(1), U256::from(2), true),
            signer: Address::repeat_byte(1),
            session: None,
        }
    }

    #[test]
    fn test_paymaster_approval_call() {
        let chain: ChainDescriptor = serde_json::from_value(serde_json::json!({
            "chainId": 84532,
            "name": "base-sepolia",
            "relayChain": "base",
            "rpcUrl": "https://sepolia.base.org",
            "contracts": {
                "positionManager": Address::repeat_byte(1),
                "limitExecutor": Address::repeat_byte(2),
                "tapToTradeExecutor": Address::repeat_byte(3),
                "oneTapProfit": Address::repeat_byte(4),
                "usdc": Address::repeat_byte(5),
                "paymaster": Address::repeat_byte(6)
            }
        }))
        .unwrap();
        let call = paymaster_approval_call(&chain, Address::repeat_byte(9), U256::from(1_000_000));
        assert_eq!(call.to, Address::repeat_byte(5));
        assert_eq!(call.from, Address::repeat_byte(9));
        let decoded = IERC20::approveCall::abi_decode(&call.data, true).unwrap();
        assert_eq!(decoded.spender, Address::repeat_byte(6));
        assert_eq!(decoded.amount, U256::from(1_000_000));
    }

    #[test]
    fn test_pad_gas() {
        assert_eq!(pad_gas(100_000, 2_000), 120_000);
        assert_eq!(pad_gas(0, 2_000), 0);
        assert_eq!(pad_gas(u64::MAX, 2_000), u64::MAX);
    }

    #[test]
    fn test_encode_limit_open_call() {
        let draft = LimitOpenBuilder::new(Address::repeat_byte(1), "ETH")
            .long()
            .collateral(U256::from(100_000_000u64))
            .leverage(10)
            .trigger_price(U256::from(345_000_000_000u64))
            .take_profit(U256::from(400_000_000_000u64))
            .expires_at(2_000_000_000)
            .build()
            .unwrap();
        let intent = draft
            .bind(84532, U256::from(7), Address::repeat_byte(9), 1_700_000_000)
            .unwrap();
        let calldata = encode_order_call(&signed(intent));

        assert_eq!(
            &calldata[..4],
            ILimitExecutor::createLimitOpenOrderCall::SELECTOR.as_slice()
        );
        let decoded =
            ILimitExecutor::createLimitOpenOrderCall::abi_decode(&calldata, true).unwrap();
        assert_eq!(decoded.symbol, "ETH");
        assert_eq!(decoded.nonce, U256::from(7));
        assert_eq!(decoded.takeProfit, U256::from(400_000_000_000u64));
        assert_eq!(decoded.stopLoss, U256::ZERO);
        assert_eq!(decoded.signature.len(), 65);
    }

    #[test]
    fn test_encode_close_kinds_use_distinct_selectors() {
        let bind = |draft: gasless_primitives::intents::OrderDraft| {
            draft
                .bind(84532, U256::from(1), Address::repeat_byte(9), 1_700_000_000)
                .unwrap()
        };
        let close = CloseTriggerBuilder::limit_close(Address::repeat_byte(1), U256::from(3))
            .symbol("BTC")
            .trigger_price(U256::from(1))
            .expires_at(2_000_000_000)
            .build()
            .unwrap();
        let stop = CloseTriggerBuilder::stop_loss(Address::repeat_byte(1), U256::from(3))
            .symbol("BTC")
            .trigger_price(U256::from(1))
            .expires_at(2_000_000_000)
            .build()
            .unwrap();
        let close = encode_order_call(&signed(bind(close)));
        let stop = encode_order_call(&signed(bind(stop)));
        assert_eq!(&close[..4], ILimitExecutor::createLimitCloseOrderCall::SELECTOR.as_slice());
        assert_eq!(&stop[..4], ILimitExecutor::createStopLossOrderCall::SELECTOR.as_slice());
    }
}
