//! Shared setup for the trading client executables.

use std::sync::Arc;

use color_eyre::eyre::Context;
use color_eyre::Result;
use gasless_client::api::RelayApiClient;
use gasless_client::chain::ChainClients;
use gasless_client::config::ClientConfig;
use gasless_client::session::{FileSessionStorage, SystemClock};
use gasless_client::signer::WalletSigner;
use gasless_client::OrderLifecycleController;
use gasless_primitives::alloy::network::EthereumWallet;
use gasless_primitives::alloy::signers::PrivateKeySigner;
use tracing_subscriber::EnvFilter;

/// Install error reporting, load `.env` and the config file, and set up tracing
pub fn init() -> Result<ClientConfig> {
    color_eyre::install()?;
    dotenv::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string());
    let config = ClientConfig::from_file(&config_path).context("Failed to load config")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(config.log_level()?)
        .init();
    Ok(config)
}

/// Controller wired to the configured chains and relay, with `signer` as primary wallet
pub fn controller(
    config: &ClientConfig,
    signer: &PrivateKeySigner,
) -> Result<OrderLifecycleController> {
    let registry = config.chain_registry()?;
    tracing::info!("Connecting to {} chains", registry.len());
    let chains = ChainClients::connect(&registry, Some(EthereumWallet::from(signer.clone())))?;
    let relay = RelayApiClient::from_env(config.relay_url()?, config.request_timeout())?;

    let session_dir = std::env::var("SESSION_DIR").unwrap_or_else(|_| ".sessions".to_string());
    let storage = FileSessionStorage::new(session_dir, config.origin.clone())?;
    let primary: Arc<dyn WalletSigner> = Arc::new(signer.clone());

    let controller = OrderLifecycleController::from_config(
        config,
        chains,
        Arc::new(relay),
        Some(primary),
        Arc::new(storage),
        Arc::new(SystemClock),
    )?;
    Ok(controller)
}

/// Read the trader key from `TRADER_PRIVATE_KEY`
pub fn trader_signer() -> Result<PrivateKeySigner> {
    let key = std::env::var("TRADER_PRIVATE_KEY").context("TRADER_PRIVATE_KEY is not set")?;
    key.parse::<PrivateKeySigner>()
        .context("TRADER_PRIVATE_KEY is not a valid private key")
}

pub fn env_var<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(name)
        .with_context(|| format!("{name} is not set"))?
        .parse::<T>()
        .with_context(|| format!("{name} is invalid"))
}
