use std::time::Duration;

use async_trait::async_trait;
use gasless_primitives::alloy::primitives::Address;
use gasless_primitives::env::Environment;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{ClientError, RejectionReason, Result};

pub mod types;

use types::{
    CancelOrderRequest, ClosePositionRequest, DepositBalance, ExecutionFee, ExecutionFeeQuery,
    RelayTransactionRequest, RelayTransactionResponse, TxHashResponse,
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_ENV_VAR: &str = "RELAY_API_KEY";

/// HTTP surface of the relay/keeper
#[async_trait]
pub trait RelayService: Send + Sync {
    async fn relay_transaction(
        &self,
        request: &RelayTransactionRequest,
    ) -> Result<RelayTransactionResponse>;

    async fn close_position(&self, request: &ClosePositionRequest) -> Result<TxHashResponse>;

    async fn cancel_order(&self, request: &CancelOrderRequest) -> Result<TxHashResponse>;

    async fn execution_fee(&self, query: &ExecutionFeeQuery) -> Result<ExecutionFee>;

    async fn deposit_balance(&self, address: Address) -> Result<DepositBalance>;
}

#[derive(Debug, Clone)]
pub struct RelayApiClient {
    client: Client,
    relay_url: Url,
}

impl RelayApiClient {
    pub fn new(relay_url: Url, timeout: Duration, api_key: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        if let Some(api_key) = api_key {
            let value = HeaderValue::from_str(&api_key)
                .map_err(|e| ClientError::ConfigError(format!("invalid api key: {e}")))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ConfigError(format!("failed to build http client: {e}")))?;

        Ok(Self { client, relay_url })
    }

    /// the api key is only required when `ENV=production`
    pub fn from_env(relay_url: Url, timeout: Duration) -> Result<Self> {
        let api_key = match Environment::from_env_var() {
            Environment::Production => Some(std::env::var(API_KEY_ENV_VAR).map_err(|_| {
                ClientError::ConfigError(format!("{API_KEY_ENV_VAR} env variable is not set"))
            })?),
            Environment::Development => std::env::var(API_KEY_ENV_VAR).ok(),
        };
        Self::new(relay_url, timeout, api_key)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.relay_url
            .join(path)
            .map_err(|e| ClientError::RelayUrlParsingError(e.to_string()))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        parse_response(response).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&ExecutionFeeQuery>,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!("GET {}", url);
        let mut request = self.client.get(url);
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.send().await.map_err(request_error)?;
        parse_response(response).await
    }
}

fn request_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout("relay request")
    } else {
        ClientError::RelayUnreachable(e.to_string())
    }
}

/// Turn a relay response into `T`, or into a structured rejection when `success` is false
async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await.map_err(request_error)?;
    let body: Value = match serde_json::from_str(&text) {
        Ok(body) => body,
        Err(_) if status.is_server_error() => {
            return Err(ClientError::RelayUnreachable(format!("relay returned {status}")))
        }
        Err(e) => {
            return Err(ClientError::MalformedResponse(format!(
                "relay returned {status} with non-json body: {e}"
            )))
        }
    };

    let success = body
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or_else(|| status.is_success());
    if !success || !status.is_success() {
        return match body.get("error").and_then(Value::as_str) {
            Some(code) => {
                let reason = RejectionReason::from_code(code);
                tracing::warn!("relay rejected request ({}): {}", status, reason);
                Err(ClientError::RelayRejected { reason })
            }
            None if status.is_server_error() => {
                Err(ClientError::RelayUnreachable(format!("relay returned {status}")))
            }
            None => Err(ClientError::MalformedResponse(format!(
                "relay failure ({status}) without an error code"
            ))),
        };
    }

    serde_json::from_value(body).map_err(|e| ClientError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl RelayService for RelayApiClient {
    async fn relay_transaction(
        &self,
        request: &RelayTransactionRequest,
    ) -> Result<RelayTransactionResponse> {
        self.post("/relay/transaction", request).await
    }

    async fn close_position(&self, request: &ClosePositionRequest) -> Result<TxHashResponse> {
        self.post("/relay/close-position", request).await
    }

    async fn cancel_order(&self, request: &CancelOrderRequest) -> Result<TxHashResponse> {
        self.post("/relay/cancel-order", request).await
    }

    async fn execution_fee(&self, query: &ExecutionFeeQuery) -> Result<ExecutionFee> {
        self.get("/relay/limit/execution-fee", Some(query)).await
    }

    async fn deposit_balance(&self, address: Address) -> Result<DepositBalance> {
        self.get(&format!("/relay/balance/{address}"), None).await
    }
}
