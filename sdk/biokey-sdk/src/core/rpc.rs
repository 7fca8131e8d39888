use super::connection::{ChainConnection, ConnectionError, TransactionReceipt, TransactionRequest};
use crate::config::SdkConfig;
use alloy_primitives::{Address, Bytes, B256, U64};
use async_trait::async_trait;
use biokey_interface::revert::decode_revert_reason;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct Endpoints {
    rpc: String,
    paymaster: Option<String>,
}

/// [`ChainConnection`] over Ethereum JSON-RPC, one endpoint per configured chain.
///
/// Transactions go through `eth_sendTransaction`, so the node (or the wallet
/// bridge behind it) owns the sending account. Sponsored transactions are
/// sent to the chain's paymaster endpoint instead of its RPC endpoint.
pub struct JsonRpcConnection {
    client: reqwest::Client,
    endpoints: HashMap<u64, Endpoints>,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcError {
    fn reason(&self) -> String {
        self.data
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|data| hex::decode(data.trim_start_matches("0x")).ok())
            .and_then(|data| decode_revert_reason(&data))
            .unwrap_or_else(|| format!("{} (code {})", self.message, self.code))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    block_number: Option<U64>,
}

impl From<RpcReceipt> for TransactionReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            success: receipt.status == Some(U64::from(1u64)),
            block_number: receipt.block_number.map(|n| n.to::<u64>()).unwrap_or_default(),
            revert_reason: None,
        }
    }
}

impl JsonRpcConnection {
    /// Build a connection for every chain in `config` that has an `rpc_url`.
    pub fn from_config(config: &SdkConfig) -> Self {
        let endpoints = config
            .chains
            .iter()
            .filter_map(|chain| {
                chain.rpc_url.as_ref().map(|rpc| {
                    (
                        chain.chain_id,
                        Endpoints {
                            rpc: rpc.clone(),
                            paymaster: chain.paymaster_url.clone(),
                        },
                    )
                })
            })
            .collect();

        Self {
            client: reqwest::Client::new(),
            endpoints,
            next_id: AtomicU64::new(1),
        }
    }

    fn endpoints(&self, chain_id: u64) -> Result<&Endpoints, ConnectionError> {
        self.endpoints
            .get(&chain_id)
            .ok_or_else(|| format!("no RPC endpoint configured for chain {chain_id}").into())
    }

    async fn request<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> Result<T, ConnectionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, params);
        tracing::trace!(%url, method, id, "json-rpc request");

        let response: RpcResponse = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(format!("{method} failed: {}", error.reason()).into());
        }
        Ok(serde_json::from_value(response.result.unwrap_or(Value::Null))?)
    }
}

fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

fn transaction_params(tx: &TransactionRequest) -> Value {
    let mut object = json!({
        "to": tx.to,
        "value": tx.value,
        "data": tx.data,
    });
    if let Some(from) = tx.from {
        object["from"] = json!(from);
    }
    json!([object])
}

#[async_trait]
impl ChainConnection for JsonRpcConnection {
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes, ConnectionError> {
        let endpoints = self.endpoints(chain_id)?;
        self.request(
            &endpoints.rpc,
            "eth_call",
            json!([{ "to": to, "data": data }, "latest"]),
        )
        .await
    }

    async fn get_code(&self, chain_id: u64, address: Address) -> Result<Bytes, ConnectionError> {
        let endpoints = self.endpoints(chain_id)?;
        self.request(&endpoints.rpc, "eth_getCode", json!([address, "latest"]))
            .await
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ConnectionError> {
        let endpoints = self.endpoints(tx.chain_id)?;
        let url = if tx.sponsored {
            endpoints.paymaster.as_deref().ok_or_else(|| {
                format!(
                    "gas sponsorship requested but chain {} has no paymaster",
                    tx.chain_id
                )
            })?
        } else {
            endpoints.rpc.as_str()
        };
        self.request(url, "eth_sendTransaction", transaction_params(tx))
            .await
    }

    async fn get_transaction_receipt(
        &self,
        chain_id: u64,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ConnectionError> {
        let endpoints = self.endpoints(chain_id)?;
        let receipt: Option<RpcReceipt> = self
            .request(&endpoints.rpc, "eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(receipt.map(Into::into))
    }
}
