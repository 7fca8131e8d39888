use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::error::Error;
use std::time::Duration;
use thiserror::Error;

pub type ConnectionError = Box<dyn Error + Send + Sync>;

/// A state-changing call submitted on behalf of the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub chain_id: u64,
    /// Sender; `None` lets the connection pick its default account or relayer
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    /// Route through the chain's gas-sponsorship endpoint
    pub sponsored: bool,
}

impl TransactionRequest {
    pub fn new(chain_id: u64, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            chain_id,
            from: None,
            to,
            value: U256::ZERO,
            data: data.into(),
            sponsored: false,
        }
    }

    pub fn from_account(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn sponsored(mut self, sponsored: bool) -> Self {
        self.sponsored = sponsored;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub success: bool,
    pub block_number: u64,
    /// Decoded revert reason when `success` is false and the node reported one
    pub revert_reason: Option<String>,
}

/// Abstraction over the chain RPC.
/// This allows the SDK to work with:
/// 1. JSON-RPC nodes (see [`crate::core::rpc::JsonRpcConnection`])
/// 2. Injected browser wallets bridged into the host application
/// 3. In-memory chains in tests
#[async_trait]
pub trait ChainConnection: Send + Sync {
    /// Read-only contract call against the latest block.
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes, ConnectionError>;

    async fn get_code(&self, chain_id: u64, address: Address) -> Result<Bytes, ConnectionError>;

    /// Submit a transaction and return its hash without waiting for inclusion.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ConnectionError>;

    async fn get_transaction_receipt(
        &self,
        chain_id: u64,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ConnectionError>;
}

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("transaction {0} not confirmed within {1:?}")]
    TimedOut(B256, Duration),

    #[error("{0}")]
    Connection(String),
}

/// Encode `call`, run it read-only against `to` and decode the return value.
pub async fn call_contract<C: SolCall>(
    connection: &(impl ChainConnection + ?Sized),
    chain_id: u64,
    to: Address,
    call: &C,
) -> Result<C::Return, String> {
    let output = connection
        .call(chain_id, to, Bytes::from(call.abi_encode()))
        .await
        .map_err(|e| e.to_string())?;
    C::abi_decode_returns(&output, true).map_err(|e| format!("malformed return data: {e}"))
}

/// Poll for the receipt of `hash` until it appears or `timeout` elapses.
pub async fn wait_for_confirmation(
    connection: &(impl ChainConnection + ?Sized),
    chain_id: u64,
    hash: B256,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TransactionReceipt, ConfirmationError> {
    let poll = async {
        loop {
            match connection.get_transaction_receipt(chain_id, hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => tokio::time::sleep(poll_interval).await,
                Err(e) => return Err(ConfirmationError::Connection(e.to_string())),
            }
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| ConfirmationError::TimedOut(hash, timeout))?
}

/// Submit `tx` and block until it is confirmed, returning the receipt.
pub async fn send_and_confirm(
    connection: &(impl ChainConnection + ?Sized),
    tx: &TransactionRequest,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TransactionReceipt, String> {
    let hash = connection
        .send_transaction(tx)
        .await
        .map_err(|e| e.to_string())?;
    tracing::debug!(chain_id = tx.chain_id, %hash, to = %tx.to, "transaction submitted");
    wait_for_confirmation(connection, tx.chain_id, hash, timeout, poll_interval)
        .await
        .map_err(|e| e.to_string())
}
