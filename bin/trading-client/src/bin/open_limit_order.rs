use color_eyre::eyre::{bail, Context};
use color_eyre::Result;
use gasless_client::client::{FlowOutcome, Reconciliation, SignerPreference};
use gasless_primitives::intents::LimitOpenBuilder;
use gasless_primitives::units::{format_price, format_usdc, parse_price, parse_usdc};
use gasless_trading_bin::{controller, env_var, init, trader_signer};
use tokio_util::sync::CancellationToken;

/// Opens a limit order through the relay and follows it until it settles.
///
/// Reads `CHAIN_ID`, `SYMBOL`, `SIDE` (long/short), `COLLATERAL` (USDC), `LEVERAGE`,
/// `TRIGGER_PRICE` and the optional `TAKE_PROFIT`, `STOP_LOSS` and `APPROVE_USDC` (paymaster
/// allowance to top up first) from the environment.
#[tokio::main]
async fn main() -> Result<()> {
    let config = init()?;
    let signer = trader_signer()?;
    let controller = controller(&config, &signer)?;
    let trader = signer.address();

    let chain_id: u64 = env_var("CHAIN_ID")?;
    let symbol: String = env_var("SYMBOL")?;
    let collateral = parse_usdc(&env_var::<String>("COLLATERAL")?)?;
    let trigger_price = parse_price(&env_var::<String>("TRIGGER_PRICE")?)?;
    let leverage: u64 = env_var("LEVERAGE")?;

    let mut builder = LimitOpenBuilder::new(trader, symbol.clone())
        .collateral(collateral)
        .leverage(leverage)
        .trigger_price(trigger_price)
        .expires_at(u64::try_from(chrono::Utc::now().timestamp())? + 30 * 24 * 3600);
    builder = match env_var::<String>("SIDE")?.to_lowercase().as_str() {
        "long" => builder.long(),
        "short" => builder.short(),
        other => bail!("SIDE must be long or short, got {other}"),
    };
    if let Ok(tp) = std::env::var("TAKE_PROFIT") {
        builder = builder.take_profit(parse_price(&tp)?);
    }
    if let Ok(sl) = std::env::var("STOP_LOSS") {
        builder = builder.stop_loss(parse_price(&sl)?);
    }
    let draft = builder.build()?;

    if let Ok(amount) = std::env::var("APPROVE_USDC") {
        let amount = parse_usdc(&amount)?;
        if let Some(tx) = controller.approve_paymaster(chain_id, trader, amount).await? {
            tracing::info!("Paymaster approval sent in {}", tx);
        }
    }

    if !controller.signing().sessions().is_valid(trader, chain_id) {
        tracing::info!("No live session key for chain {}, requesting one", chain_id);
        controller
            .authorize_session(trader, chain_id)
            .await
            .context("Session authorization failed")?;
    }

    tracing::info!(
        "Opening {} limit on {} with {} USDC at trigger {}",
        symbol,
        chain_id,
        format_usdc(collateral),
        format_price(trigger_price)
    );
    let report = match controller
        .submit_order(chain_id, &draft, SignerPreference::SessionOrPrimary)
        .await
    {
        Ok(FlowOutcome::Completed(report)) => report,
        Ok(FlowOutcome::StatusUnknown(unknown)) => {
            tracing::warn!("status unknown, checking…");
            match controller.reconcile(&unknown).await? {
                Reconciliation::Landed { order_id, tx_hash } => {
                    tracing::info!("Order {} landed in tx {:?}", order_id, tx_hash)
                }
                Reconciliation::NonceConsumedElsewhere { current_nonce } => tracing::warn!(
                    "Order did not land, another submission used its nonce (now {})",
                    current_nonce
                ),
                Reconciliation::NotLanded => {
                    tracing::warn!("Order did not land, it is safe to submit again")
                }
            }
            return Ok(());
        }
        Err(e) => {
            tracing::error!("{}", e.user_message());
            return Err(e.into());
        }
    };

    if let Some(fallback) = report.session_fallback {
        tracing::warn!("Signed with the primary wallet ({:?} session key)", fallback);
    }
    tracing::info!(
        "Order {:?} pending in tx {} (signer {})",
        report.pending.order_id,
        report.pending.tx_hash,
        report.signer
    );

    let token = CancellationToken::new();
    let stop = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.cancel();
        }
    });

    let mut pending = report.pending;
    match controller.track(&mut pending, token).await {
        Ok(state) => tracing::info!("Order {:?} finished as {}", pending.order_id, state),
        Err(e) => tracing::warn!("{}", e.user_message()),
    }
    Ok(())
}
