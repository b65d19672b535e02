use std::fmt;

use crate::chain::OrderStatus;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderState {
    Building,
    Signing,
    Submitting,
    Pending,
    Executed,
    Cancelled,
    Expired,
    Failed,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Executed | OrderState::Cancelled | OrderState::Expired | OrderState::Failed
        )
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<OrderStatus> for OrderState {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => OrderState::Pending,
            OrderStatus::Executed => OrderState::Executed,
            OrderStatus::Cancelled => OrderState::Cancelled,
            OrderStatus::Expired => OrderState::Expired,
        }
    }
}

/// Placing an order, or cancelling one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Order,
    Cancel,
}

impl FlowKind {
    pub fn allows(&self, from: OrderState, to: OrderState) -> bool {
        use OrderState::*;
        match (from, to) {
            (Building, Signing) | (Building, Failed) => true,
            (Signing, Submitting) | (Signing, Failed) => true,
            // stale nonce: rebuild with a fresh read
            (Submitting, Building) | (Submitting, Failed) => true,
            (Submitting, Pending) => *self == FlowKind::Order,
            (Submitting, Cancelled) => *self == FlowKind::Cancel,
            (Pending, Executed) | (Pending, Cancelled) | (Pending, Expired) => {
                *self == FlowKind::Order
            }
            _ => false,
        }
    }
}

/// State of one flow plus every state it went through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFlow {
    kind: FlowKind,
    state: OrderState,
    history: Vec<OrderState>,
}

impl OrderFlow {
    pub fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            state: OrderState::Building,
            history: vec![OrderState::Building],
        }
    }

    pub fn resume(kind: FlowKind, state: OrderState) -> Self {
        Self {
            kind,
            state,
            history: vec![state],
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn history(&self) -> &[OrderState] {
        &self.history
    }

    pub fn transition(&mut self, next: OrderState) -> Result<()> {
        if !self.kind.allows(self.state, next) {
            return Err(ClientError::InvalidTransition(format!(
                "{:?} flow cannot move from {} to {}",
                self.kind, self.state, next
            )));
        }
        tracing::debug!("{:?} flow: {} -> {}", self.kind, self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}
