//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::{Address, B256};
use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// The subset of a transaction receipt needed to confirm a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    /// `0x1` on success, `0x0` when execution reverted.
    pub status: Option<String>,
    pub contract_address: Option<Address>,
    pub block_number: Option<String>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status
            .as_deref()
            .is_none_or(|status| status.trim_start_matches("0x").trim_start_matches('0') == "1")
    }
}

/// Fetch a receipt; `Ok(None)` while the transaction is still pending.
pub async fn get_transaction_receipt(
    client: &reqwest::Client,
    url: &str,
    tx_hash: B256,
) -> Result<Option<TransactionReceipt>, anyhow::Error> {
    json_rpc_call(
        client,
        url,
        "eth_getTransactionReceipt",
        vec![Value::String(format!("{tx_hash:#x}"))],
    )
    .await
}

/// Fetch the chain id the endpoint reports.
pub async fn get_chain_id(client: &reqwest::Client, url: &str) -> Result<u64, anyhow::Error> {
    let reported: String = json_rpc_call(client, url, "eth_chainId", vec![]).await?;
    parse_quantity(&reported)
}

/// Parse a hex-encoded JSON-RPC quantity such as `0x89`.
pub fn parse_quantity(quantity: &str) -> Result<u64, anyhow::Error> {
    let digits = quantity
        .strip_prefix("0x")
        .with_context(|| format!("`{quantity}` is not a hex quantity"))?;
    u64::from_str_radix(digits, 16).with_context(|| format!("`{quantity}` is not a hex quantity"))
}

/// Wait for a service to be ready by repeatedly calling a check function.
///
/// # Arguments
/// * `name` - Name of the service (for error messages)
/// * `timeout` - Maximum time to wait
/// * `poll_interval` - Delay between two checks
/// * `check_fn` - Function that returns Ok(()) when the service is ready
///
/// # Returns
/// Ok(()) when the service is ready, or an error after timeout.
pub async fn wait_until_ready<F, Fut>(
    name: &str,
    timeout: Duration,
    poll_interval: Duration,
    check_fn: F,
) -> Result<(), anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<(), anyhow::Error>>,
{
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            anyhow::bail!("Timeout waiting for {} to be ready", name);
        }

        match check_fn().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::trace!(error = %e, service = %name, "Readiness check failed, retrying...");
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}
