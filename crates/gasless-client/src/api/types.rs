//! JSON bodies of the relay's HTTP surface. Everything is camelCase and every response
//! carries `success` plus a machine-readable `error` on failure.

use gasless_primitives::alloy::primitives::{Address, Bytes, B256, U256};
use gasless_primitives::intents::OrderKind;
use gasless_primitives::session::SessionAuthorization;
use serde::{Deserialize, Serialize};

/// Proof that the intent signer is a delegated session key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKeyPayload {
    pub address: Address,
    pub expires_at: u64,
    pub auth_signature: Bytes,
}

impl From<&SessionAuthorization> for SessionKeyPayload {
    fn from(authorization: &SessionAuthorization) -> Self {
        Self {
            address: authorization.session_address,
            expires_at: authorization.expires_at,
            auth_signature: Bytes::from(authorization.signature.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTransactionRequest {
    pub to: Address,
    pub data: Bytes,
    pub user_address: Address,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "u256_serde::serialize_opt"
    )]
    pub value: Option<U256>,
    pub chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<SessionKeyPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTransactionResponse {
    pub tx_hash: B256,
    #[serde(default, deserialize_with = "u256_serde::deserialize_opt")]
    pub gas_used: Option<U256>,
    /// USDC base units charged for gas
    #[serde(default, deserialize_with = "u256_serde::deserialize_opt")]
    pub usdc_charged: Option<U256>,
    /// present when the relay decoded the executor's return value itself
    #[serde(default, deserialize_with = "u256_serde::deserialize_opt")]
    pub order_id: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionRequest {
    pub user_address: Address,
    #[serde(serialize_with = "u256_serde::serialize")]
    pub position_id: U256,
    pub symbol: String,
    pub chain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub user_address: Address,
    #[serde(serialize_with = "u256_serde::serialize")]
    pub order_id: U256,
    pub signature: Bytes,
    pub chain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxHashResponse {
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFeeQuery {
    pub order_type: OrderKind,
    pub estimated_gas: u64,
    pub buffer_bps: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFee {
    #[serde(deserialize_with = "u256_serde::deserialize")]
    pub gas_estimate: U256,
    #[serde(deserialize_with = "u256_serde::deserialize")]
    pub base_cost: U256,
    #[serde(deserialize_with = "u256_serde::deserialize")]
    pub recommended_max_execution_fee: U256,
    pub buffer_bps: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositBalance {
    /// USDC base units
    #[serde(deserialize_with = "u256_serde::deserialize")]
    pub deposit: U256,
}

/// The relay writes integers as JSON numbers, decimal strings or hex strings; we always
/// send decimal strings.
pub(crate) mod u256_serde {
    use std::str::FromStr;

    use gasless_primitives::alloy::primitives::U256;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn serialize_opt<S: Serializer>(
        value: &Option<U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    fn from_value<E: Error>(value: &Value) -> Result<U256, E> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(U256::from)
                .ok_or_else(|| E::custom(format!("{n} is not an unsigned integer"))),
            Value::String(s) => U256::from_str(s.trim())
                .map_err(|e| E::custom(format!("invalid integer {s:?}: {e}"))),
            other => Err(E::custom(format!("expected integer, got {other}"))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let value = Value::deserialize(deserializer)?;
        from_value(&value)
    }

    pub fn deserialize_opt<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => from_value(&value).map(Some),
        }
    }
}
