pub mod erc20;
pub mod limit_executor;
