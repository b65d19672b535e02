//! End-to-end order flows: build, sign, submit, track.
//!
//! Every flow runs as one sequential task. The only shared mutable state is the session
//! store; the chain registry and configuration are read-only.

use std::sync::Arc;
use std::time::Duration;

use gasless_primitives::alloy::primitives::{Address, B256, U256};
use gasless_primitives::chains::{ChainDescriptor, ChainRegistry};
use gasless_primitives::intents::{CancelIntent, OrderDraft, OrderIntent, OrderKind};
use tokio_util::sync::CancellationToken;

use crate::api::RelayService;
use crate::chain::{ChainClients, OrderStatus};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::nonce_manager::NonceSequencer;
use crate::session::{Clock, SessionKey, SessionKeyStore, SessionStorage};
use crate::signer::{IntentSignature, SignerKind, SigningClient, WalletSigner};
use crate::submission::{paymaster_approval_call, RelaySubmissionClient, SubmissionReceipt};
use crate::tracker::OrderStatusTracker;

pub mod state;

pub use state::{FlowKind, OrderFlow, OrderState};

/// Which key signs intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignerPreference {
    SessionOnly,
    #[default]
    SessionOrPrimary,
    PrimaryOnly,
}

/// Why a flow that preferred the session key was signed by the primary wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFallback {
    Expired,
    Missing,
}

/// An order the relay accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    /// unresolved until the creating transaction's receipt is readable; `track` fills it in
    pub order_id: Option<U256>,
    pub intent: OrderIntent,
    pub tx_hash: B256,
    pub chain_id: u64,
    pub status: OrderState,
}

#[derive(Debug, Clone)]
pub struct OrderReport {
    pub pending: PendingOrder,
    pub receipt: SubmissionReceipt,
    pub signer: Address,
    pub session_fallback: Option<SessionFallback>,
    pub nonce_refreshes: u32,
    pub history: Vec<OrderState>,
}

#[derive(Debug, Clone)]
pub struct CancelReport {
    pub order_id: U256,
    pub tx_hash: B256,
    pub signer: Address,
    pub nonce_refreshes: u32,
    pub history: Vec<OrderState>,
}

/// A submission the relay never answered; `reconcile` decides whether it landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSubmission {
    pub kind: FlowKind,
    pub chain_id: u64,
    pub trader: Address,
    pub nonce: U256,
    pub hash: B256,
    /// the order being cancelled, for cancellation flows
    pub order_id: Option<U256>,
}

#[derive(Debug, Clone)]
pub enum FlowOutcome<R> {
    Completed(R),
    /// the submission timed out: show "status unknown" and reconcile before retrying
    StatusUnknown(UnknownSubmission),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// this submission landed: the order was created, or the cancellation took effect
    Landed {
        order_id: U256,
        tx_hash: Option<B256>,
    },
    /// the nonce was consumed by another submission; this one never landed and must be
    /// rebuilt with a fresh nonce
    NonceConsumedElsewhere { current_nonce: U256 },
    /// nothing consumed the nonce, rebuilding is safe
    NotLanded,
}

pub struct OrderLifecycleController {
    registry: Arc<ChainRegistry>,
    nonces: NonceSequencer,
    signing: SigningClient,
    submission: RelaySubmissionClient,
    tracker: OrderStatusTracker,
    clock: Arc<dyn Clock>,
    session_duration: Duration,
    signature_timeout: Duration,
    max_nonce_refreshes: u32,
}

impl std::fmt::Debug for OrderLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycleController")
            .field("chains", &self.registry.chain_ids().collect::<Vec<_>>())
            .field("signing", &self.signing)
            .field("max_nonce_refreshes", &self.max_nonce_refreshes)
            .finish()
    }
}

impl OrderLifecycleController {
    pub fn from_config(
        config: &ClientConfig,
        chains: ChainClients,
        relay: Arc<dyn RelayService>,
        primary: Option<Arc<dyn WalletSigner>>,
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let registry = Arc::new(
            config
                .chain_registry()
                .map_err(|e| ClientError::ConfigError(e.to_string()))?,
        );
        for chain_id in registry.chain_ids() {
            chains.get(chain_id)?;
        }
        let chains = Arc::new(chains);
        let timeout = config.request_timeout();
        let sessions = Arc::new(SessionKeyStore::new(
            storage,
            clock.clone(),
            config.product_name.clone(),
        ));

        Ok(Self {
            registry,
            nonces: NonceSequencer::new(chains.clone(), timeout),
            signing: SigningClient::new(primary, sessions)
                .signature_timeout(config.signature_timeout()),
            submission: RelaySubmissionClient::new(
                relay,
                chains.clone(),
                timeout,
                config.gas_buffer_bps,
            ),
            tracker: OrderStatusTracker::new(
                chains,
                clock.clone(),
                config.poll_interval(),
                timeout,
            ),
            clock,
            session_duration: config.session_duration(),
            signature_timeout: config.signature_timeout(),
            max_nonce_refreshes: config.max_nonce_refreshes,
        })
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn signing(&self) -> &SigningClient {
        &self.signing
    }

    pub fn submission(&self) -> &RelaySubmissionClient {
        &self.submission
    }

    pub fn nonces(&self) -> &NonceSequencer {
        &self.nonces
    }

    /// Ask the primary wallet to delegate a fresh session key for `chain_id`
    pub async fn authorize_session(&self, user: Address, chain_id: u64) -> Result<SessionKey> {
        self.registry.resolve(chain_id)?;
        let primary = self
            .signing
            .primary()
            .ok_or_else(|| ClientError::SignerUnavailable("no primary wallet connected".into()))?;
        let create = self.signing.sessions().create(
            user,
            chain_id,
            self.session_duration,
            primary.as_ref(),
        );
        tokio::time::timeout(self.signature_timeout, create)
            .await
            .map_err(|_| ClientError::Timeout("delegation signature"))?
    }

    async fn sign_for(
        &self,
        trader: Address,
        chain_id: u64,
        hash: B256,
        preference: SignerPreference,
    ) -> Result<(IntentSignature, Option<SessionFallback>)> {
        let session_first = match preference {
            SignerPreference::PrimaryOnly => None,
            SignerPreference::SessionOnly | SignerPreference::SessionOrPrimary => {
                let session = SignerKind::Session {
                    owner: trader,
                    chain_id,
                };
                Some(self.signing.sign(hash, session).await)
            }
        };
        let fallback = match session_first {
            None => None,
            Some(Ok(signature)) => return Ok((signature, None)),
            Some(Err(e)) if preference == SignerPreference::SessionOnly => return Err(e),
            Some(Err(ClientError::SessionExpired(_))) => Some(SessionFallback::Expired),
            Some(Err(ClientError::SignerUnavailable(_))) => Some(SessionFallback::Missing),
            Some(Err(e)) => return Err(e),
        };
        if let Some(reason) = fallback {
            tracing::warn!(
                "session key for chain {} unusable ({:?}), signing with primary wallet",
                chain_id,
                reason
            );
        }

        let signature = self.signing.sign(hash, SignerKind::Primary).await?;
        if signature.signer != trader {
            return Err(ClientError::SignerUnavailable(format!(
                "primary wallet {} is not the trader {trader}",
                signature.signer
            )));
        }
        Ok((signature, fallback))
    }

    /// Bind `draft` to `chain_id` with a freshly read nonce, sign and submit it. A stale
    /// nonce rejection rebuilds from scratch, at most `max_nonce_refreshes` times.
    pub async fn submit_order(
        &self,
        chain_id: u64,
        draft: &OrderDraft,
        preference: SignerPreference,
    ) -> Result<FlowOutcome<OrderReport>> {
        let chain = self.registry.resolve(chain_id)?;
        let trader = draft.trader();
        let mut flow = OrderFlow::new(FlowKind::Order);
        let mut refreshes = 0;

        loop {
            let intent = match self.build_intent(chain, draft).await {
                Ok(intent) => intent,
                Err(e) => return Err(fail(&mut flow, e)),
            };
            let hash = intent.signing_hash();
            let nonce = intent.header().nonce;
            tracing::debug!("built {} intent {} with nonce {}", draft.kind().as_str(), hash, nonce);

            flow.transition(OrderState::Signing)?;
            let (signature, session_fallback) =
                match self.sign_for(trader, chain_id, hash, preference).await {
                    Ok(signed) => signed,
                    Err(e) => return Err(fail(&mut flow, e)),
                };
            let signer = signature.signer;
            let signed = signature.attach(intent, hash);

            flow.transition(OrderState::Submitting)?;
            match self.submission.submit(chain, &signed).await {
                Ok(receipt) => {
                    flow.transition(OrderState::Pending)?;
                    let pending = PendingOrder {
                        order_id: receipt.order_id,
                        intent: signed.intent,
                        tx_hash: receipt.tx_hash,
                        chain_id,
                        status: OrderState::Pending,
                    };
                    return Ok(FlowOutcome::Completed(OrderReport {
                        pending,
                        receipt,
                        signer,
                        session_fallback,
                        nonce_refreshes: refreshes,
                        history: flow.history().to_vec(),
                    }));
                }
                Err(e) if e.is_stale_nonce() && refreshes < self.max_nonce_refreshes => {
                    refreshes += 1;
                    tracing::warn!(
                        "nonce {} for {} is stale, rebuilding (refresh {}/{})",
                        nonce,
                        trader,
                        refreshes,
                        self.max_nonce_refreshes
                    );
                    flow.transition(OrderState::Building)?;
                }
                Err(ClientError::Timeout(what)) => {
                    tracing::warn!("{} timed out for intent {}, status unknown", what, hash);
                    return Ok(FlowOutcome::StatusUnknown(UnknownSubmission {
                        kind: FlowKind::Order,
                        chain_id,
                        trader,
                        nonce,
                        hash,
                        order_id: None,
                    }));
                }
                Err(e) => return Err(fail(&mut flow, e)),
            }
        }
    }

    async fn build_intent(
        &self,
        chain: &ChainDescriptor,
        draft: &OrderDraft,
    ) -> Result<OrderIntent> {
        let nonce = self.nonces.next_nonce(draft.trader(), chain).await?;
        Ok(draft.bind(
            chain.chain_id,
            nonce,
            chain.contracts.limit_executor,
            self.clock.now(),
        )?)
    }

    /// Cancel a pending order with a signed cancellation intent
    pub async fn cancel_order(
        &self,
        chain_id: u64,
        trader: Address,
        order_id: U256,
        preference: SignerPreference,
    ) -> Result<FlowOutcome<CancelReport>> {
        let chain = self.registry.resolve(chain_id)?;
        let mut flow = OrderFlow::new(FlowKind::Cancel);
        let mut refreshes = 0;

        loop {
            let intent = match self.nonces.next_nonce(trader, chain).await.and_then(|nonce| {
                Ok(CancelIntent::new(
                    trader,
                    chain_id,
                    order_id,
                    nonce,
                    chain.contracts.limit_executor,
                )?)
            }) {
                Ok(intent) => intent,
                Err(e) => return Err(fail(&mut flow, e)),
            };
            let hash = intent.signing_hash();
            let nonce = intent.nonce;

            flow.transition(OrderState::Signing)?;
            let (signature, _) = match self.sign_for(trader, chain_id, hash, preference).await {
                Ok(signed) => signed,
                Err(e) => return Err(fail(&mut flow, e)),
            };
            let signer = signature.signer;
            let signed = signature.attach(intent, hash);

            flow.transition(OrderState::Submitting)?;
            match self.submission.submit_cancel(chain, &signed).await {
                Ok(tx_hash) => {
                    flow.transition(OrderState::Cancelled)?;
                    return Ok(FlowOutcome::Completed(CancelReport {
                        order_id,
                        tx_hash,
                        signer,
                        nonce_refreshes: refreshes,
                        history: flow.history().to_vec(),
                    }));
                }
                Err(e) if e.is_stale_nonce() && refreshes < self.max_nonce_refreshes => {
                    refreshes += 1;
                    tracing::warn!("cancel nonce {} is stale, rebuilding", nonce);
                    flow.transition(OrderState::Building)?;
                }
                Err(ClientError::Timeout(what)) => {
                    tracing::warn!("{} timed out for cancel {}, status unknown", what, hash);
                    return Ok(FlowOutcome::StatusUnknown(UnknownSubmission {
                        kind: FlowKind::Cancel,
                        chain_id,
                        trader,
                        nonce,
                        hash,
                        order_id: Some(order_id),
                    }));
                }
                Err(e) => return Err(fail(&mut flow, e)),
            }
        }
    }

    /// market close through the relay, no intent signature involved
    pub async fn close_position_market(
        &self,
        chain_id: u64,
        user: Address,
        position_id: U256,
        symbol: &str,
    ) -> Result<B256> {
        let chain = self.registry.resolve(chain_id)?;
        self.submission
            .close_position(chain, user, position_id, symbol)
            .await
    }

    /// Learn whether a submission the relay never answered landed. A consumed nonce alone
    /// proves nothing, since another flow may have used it: an order only counts as landed
    /// when its `LimitOrderCreated` event is found, a cancellation when the order reads as
    /// cancelled.
    pub async fn reconcile(&self, unknown: &UnknownSubmission) -> Result<Reconciliation> {
        let chain = self.registry.resolve(unknown.chain_id)?;
        let current_nonce = self.nonces.next_nonce(unknown.trader, chain).await?;
        let outcome = if current_nonce <= unknown.nonce {
            Reconciliation::NotLanded
        } else {
            let landed = match (unknown.kind, unknown.order_id) {
                (FlowKind::Order, _) => self
                    .submission
                    .find_created_order(chain, unknown.trader, unknown.nonce)
                    .await?
                    .map(|created| Reconciliation::Landed {
                        order_id: created.order_id,
                        tx_hash: Some(created.tx_hash),
                    }),
                (FlowKind::Cancel, Some(order_id)) => {
                    let status = self.tracker.poll_once(chain, order_id).await?;
                    (status == OrderStatus::Cancelled).then_some(Reconciliation::Landed {
                        order_id,
                        tx_hash: None,
                    })
                }
                (FlowKind::Cancel, None) => None,
            };
            landed.unwrap_or(Reconciliation::NonceConsumedElsewhere { current_nonce })
        };
        tracing::info!("reconciled {} on chain {}: {:?}", unknown.hash, unknown.chain_id, outcome);
        Ok(outcome)
    }

    /// Follow a pending order to its terminal state, updating `pending.status`. An order id
    /// left unresolved at submission is looked up from the transaction receipt first.
    pub async fn track(
        &self,
        pending: &mut PendingOrder,
        cancel: CancellationToken,
    ) -> Result<OrderState> {
        let chain = self.registry.resolve(pending.chain_id)?;
        let order_id = match pending.order_id {
            Some(order_id) => order_id,
            None => {
                let order_id = self.submission.order_id_for_tx(chain, pending.tx_hash).await?;
                pending.order_id = Some(order_id);
                order_id
            }
        };
        let mut flow = OrderFlow::resume(FlowKind::Order, pending.status);
        let status = self
            .tracker
            .track_until_terminal(chain, order_id, cancel)
            .await?;
        flow.transition(status.into())?;
        pending.status = flow.state();
        Ok(pending.status)
    }

    /// Make sure the paymaster may pull `amount` USDC from `owner`, sending an approval
    /// directly to the chain when it may not. Returns the approval tx hash if one was sent.
    pub async fn approve_paymaster(
        &self,
        chain_id: u64,
        owner: Address,
        amount: U256,
    ) -> Result<Option<B256>> {
        let chain = self.registry.resolve(chain_id)?;
        let allowance = self.submission.paymaster_allowance(chain, owner).await?;
        if allowance >= amount {
            tracing::debug!("paymaster allowance {} already covers {}", allowance, amount);
            return Ok(None);
        }
        let call = paymaster_approval_call(chain, owner, amount);
        let tx_hash = self.submission.send_direct(chain, &call).await?;
        tracing::info!("approved paymaster for {} on {} in {}", amount, chain, tx_hash);
        Ok(Some(tx_hash))
    }

    /// relay execution fee quote for an order kind
    pub async fn execution_fee(
        &self,
        kind: OrderKind,
        estimated_gas: u64,
    ) -> Result<crate::api::types::ExecutionFee> {
        self.submission.execution_fee(kind, estimated_gas).await
    }
}

fn fail(flow: &mut OrderFlow, e: ClientError) -> ClientError {
    tracing::warn!("{:?} flow failed in {}: {}", flow.kind(), flow.state(), e);
    if let Err(transition) = flow.transition(OrderState::Failed) {
        tracing::error!("{}", transition);
    }
    e
}
