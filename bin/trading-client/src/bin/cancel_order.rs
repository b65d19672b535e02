use color_eyre::Result;
use gasless_client::client::{FlowOutcome, SignerPreference};
use gasless_primitives::alloy::primitives::U256;
use gasless_trading_bin::{controller, env_var, init, trader_signer};

/// Cancels a pending limit order by id (`CHAIN_ID`, `ORDER_ID`)
#[tokio::main]
async fn main() -> Result<()> {
    let config = init()?;
    let signer = trader_signer()?;
    let controller = controller(&config, &signer)?;

    let chain_id: u64 = env_var("CHAIN_ID")?;
    let order_id: U256 = env_var("ORDER_ID")?;

    match controller
        .cancel_order(chain_id, signer.address(), order_id, SignerPreference::SessionOrPrimary)
        .await
    {
        Ok(FlowOutcome::Completed(report)) => {
            tracing::info!("Order {} cancelled in tx {}", report.order_id, report.tx_hash)
        }
        Ok(FlowOutcome::StatusUnknown(unknown)) => {
            tracing::warn!("status unknown, checking…");
            let outcome = controller.reconcile(&unknown).await?;
            tracing::info!("Cancellation of {} reconciled: {:?}", order_id, outcome);
        }
        Err(e) => {
            tracing::error!("{}", e.user_message());
            return Err(e.into());
        }
    }
    Ok(())
}
