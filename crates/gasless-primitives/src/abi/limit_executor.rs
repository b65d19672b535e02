use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILimitExecutor {
        struct LimitOrder {
            uint256 id;
            address trader;
            uint8 orderType;
            uint8 status;
            uint256 positionId;
            uint256 triggerPrice;
            uint256 expiresAt;
        }

        event LimitOrderCreated(
            uint256 indexed orderId,
            address indexed trader,
            uint8 orderType,
            uint256 nonce
        );

        function getUserNonce(address user) external view returns (uint256 nonce);

        function getOrder(uint256 orderId) external view returns (LimitOrder memory order);

        function createLimitOpenOrder(
            address trader,
            string calldata symbol,
            bool isLong,
            uint256 collateral,
            uint256 leverage,
            uint256 triggerPrice,
            uint256 takeProfit,
            uint256 stopLoss,
            uint256 nonce,
            uint256 expiresAt,
            bytes calldata signature
        ) external returns (uint256 orderId);

        function createLimitCloseOrder(
            address trader,
            uint256 positionId,
            uint256 triggerPrice,
            uint256 nonce,
            uint256 expiresAt,
            bytes calldata signature
        ) external returns (uint256 orderId);

        function createStopLossOrder(
            address trader,
            uint256 positionId,
            uint256 triggerPrice,
            uint256 nonce,
            uint256 expiresAt,
            bytes calldata signature
        ) external returns (uint256 orderId);
    }
}

/// on-chain order status codes as stored by the executor
pub mod order_status {
    pub const PENDING: u8 = 0;
    pub const EXECUTED: u8 = 1;
    pub const CANCELLED: u8 = 2;
    pub const EXPIRED: u8 = 3;
}
