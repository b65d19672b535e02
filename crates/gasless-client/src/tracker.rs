//! Polls an order's on-chain status until it reaches a terminal state.

use std::sync::Arc;
use std::time::Duration;

use gasless_primitives::alloy::primitives::U256;
use gasless_primitives::chains::ChainDescriptor;
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainClients, OnchainOrder, OrderStatus};
use crate::error::{ClientError, Result};
use crate::session::Clock;

pub struct OrderStatusTracker {
    chains: Arc<ChainClients>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    timeout: Duration,
}

impl std::fmt::Debug for OrderStatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStatusTracker")
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OrderStatusTracker {
    pub fn new(
        chains: Arc<ChainClients>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            chains,
            clock,
            poll_interval,
            timeout,
        }
    }

    /// one status read; a pending order past its expiry counts as expired
    pub async fn poll_once(&self, chain: &ChainDescriptor, order_id: U256) -> Result<OrderStatus> {
        let client = self.chains.get(chain.chain_id)?;
        let order: OnchainOrder = tokio::time::timeout(
            self.timeout,
            client.order(chain.contracts.limit_executor, order_id),
        )
        .await
        .map_err(|_| ClientError::Timeout("order status read"))??;
        if order.id != order_id {
            return Err(ClientError::MalformedResponse(format!(
                "asked for order {order_id}, chain returned {}",
                order.id
            )));
        }
        if order.status == OrderStatus::Pending && self.clock.now() >= order.expires_at {
            return Ok(OrderStatus::Expired);
        }
        Ok(order.status)
    }

    /// Poll until the order is terminal. Transient read failures are logged and retried on
    /// the next tick; cancelling the token only stops watching.
    pub async fn track_until_terminal(
        &self,
        chain: &ChainDescriptor,
        order_id: U256,
        cancel: CancellationToken,
    ) -> Result<OrderStatus> {
        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::TrackingCancelled),
                polled = self.poll_once(chain, order_id) => polled,
            };
            match polled {
                Ok(status) if status.is_terminal() => {
                    tracing::info!("order {} on {} is {:?}", order_id, chain, status);
                    return Ok(status);
                }
                Ok(_) => tracing::debug!("order {} still pending", order_id),
                Err(e) if e.is_transient() => {
                    tracing::warn!("status read for order {} failed, retrying: {}", order_id, e)
                }
                Err(e) => return Err(e),
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::TrackingCancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
