use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function allowance(address owner, address spender)
            external
            view
            returns (uint256 remaining);
        function approve(address spender, uint256 amount) external returns (bool ok);
    }
}
