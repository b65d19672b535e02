use gasless_client::config::ClientConfig;
use gasless_primitives::alloy::primitives::{Address, U256};
use gasless_primitives::alloy::signers::PrivateKeySigner;
use gasless_primitives::intents::{CloseTriggerBuilder, LimitOpenBuilder, OrderDraft};
use rstest::fixture;

pub const PRODUCT: &str = "Gasless Perps";
pub const T0: u64 = 1_700_000_000;
pub const BASE_SEPOLIA: u64 = 84532;
pub const ARBITRUM_SEPOLIA: u64 = 421614;
pub const SESSION_SECONDS: u64 = 1800;

pub fn executor(chain_id: u64) -> Address {
    match chain_id {
        BASE_SEPOLIA => Address::repeat_byte(0x22),
        _ => Address::repeat_byte(0x77),
    }
}

pub fn config_json(relay_url: &str) -> String {
    format!(
        r#"{{
        "relayUrl": "{relay_url}",
        "productName": "{PRODUCT}",
        "sessionDurationSeconds": {SESSION_SECONDS},
        "requestTimeoutSeconds": 5,
        "pollIntervalSeconds": 1,
        "maxNonceRefreshes": 3,
        "origin": "https://trade.example",
        "chains": [
            {{
                "chainId": {BASE_SEPOLIA},
                "name": "base-sepolia",
                "relayChain": "base",
                "rpcUrl": "https://sepolia.base.org",
                "contracts": {{
                    "positionManager": "0x1111111111111111111111111111111111111111",
                    "limitExecutor": "{base_executor}",
                    "tapToTradeExecutor": "0x3333333333333333333333333333333333333333",
                    "oneTapProfit": "0x4444444444444444444444444444444444444444",
                    "usdc": "0x5555555555555555555555555555555555555555",
                    "paymaster": "0x6666666666666666666666666666666666666666"
                }}
            }},
            {{
                "chainId": {ARBITRUM_SEPOLIA},
                "name": "arbitrum-sepolia",
                "relayChain": "arbitrum",
                "rpcUrl": "https://sepolia-rollup.arbitrum.io/rpc",
                "contracts": {{
                    "positionManager": "0x8888888888888888888888888888888888888888",
                    "limitExecutor": "{arb_executor}",
                    "tapToTradeExecutor": "0x9999999999999999999999999999999999999999",
                    "oneTapProfit": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                    "usdc": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
                    "paymaster": "0xcccccccccccccccccccccccccccccccccccccccc"
                }}
            }}
        ]
    }}"#,
        base_executor = executor(BASE_SEPOLIA),
        arb_executor = executor(ARBITRUM_SEPOLIA),
    )
}

#[fixture]
pub fn config() -> ClientConfig {
    ClientConfig::from_json(&config_json("http://localhost:3001")).unwrap()
}

#[fixture]
pub fn wallet() -> PrivateKeySigner {
    PrivateKeySigner::random()
}

/// 100 USDC at 10x, long ETH triggering at 3450
pub fn limit_open_draft(trader: Address) -> OrderDraft {
    LimitOpenBuilder::new(trader, "ETH")
        .long()
        .collateral(U256::from(100_000_000u64))
        .leverage(10)
        .trigger_price(U256::from(345_000_000_000u64))
        .expires_at(T0 + 30 * 24 * 3600)
        .build()
        .unwrap()
}

pub fn stop_loss_draft(trader: Address, position_id: u64) -> OrderDraft {
    CloseTriggerBuilder::stop_loss(trader, U256::from(position_id))
        .symbol("ETH")
        .trigger_price(U256::from(300_000_000_000u64))
        .expires_at(T0 + 24 * 3600)
        .build()
        .unwrap()
}
