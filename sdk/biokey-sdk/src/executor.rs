use crate::config::SdkConfig;
use crate::context::SdkContext;
use crate::core::connection::{send_and_confirm, ChainConnection, TransactionReceipt, TransactionRequest};
use crate::error::{Result, SdkError};
use crate::signing::{ActionDescriptor, SignedAction, SigningCoordinator};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use biokey_interface::revert::is_nonce_rejection;
use biokey_interface::ISmartAccount;
use std::sync::Arc;

/// Submits biometric authorizations through the smart account's `execute`.
#[derive(Clone)]
pub struct Executor {
    coordinator: SigningCoordinator,
    config: Arc<SdkConfig>,
    connection: Arc<dyn ChainConnection>,
}

impl Executor {
    pub fn new(ctx: &SdkContext, coordinator: SigningCoordinator) -> Self {
        Self {
            coordinator,
            config: ctx.config.clone(),
            connection: ctx.connection.clone(),
        }
    }

    pub fn coordinator(&self) -> &SigningCoordinator {
        &self.coordinator
    }

    /// Build the `execute` transaction for a signed action.
    pub fn build_transaction(
        &self,
        action: &ActionDescriptor,
        signed: &SignedAction,
        relayer: Option<Address>,
        sponsored: bool,
    ) -> TransactionRequest {
        let call = ISmartAccount::executeCall {
            to: action.contract,
            value: U256::ZERO,
            data: action.payload.clone(),
            r: signed.r_word(),
            s: signed.s_word(),
            publicKeyX: signed.public_key.x_word(),
            publicKeyY: signed.public_key.y_word(),
            nonce: signed.nonce,
        };
        let mut tx = TransactionRequest::new(action.chain_id, signed.account, call.abi_encode())
            .sponsored(sponsored);
        tx.from = relayer;
        tx
    }

    /// Submit an already signed action and wait for it to confirm.
    pub async fn submit(
        &self,
        action: &ActionDescriptor,
        signed: &SignedAction,
        relayer: Option<Address>,
        sponsored: bool,
    ) -> Result<TransactionReceipt> {
        let tx = self.build_transaction(action, signed, relayer, sponsored);
        let receipt = send_and_confirm(
            self.connection.as_ref(),
            &tx,
            self.config.deployment_timeout(),
            self.config.poll_interval(),
        )
        .await
        .map_err(|reason| {
            if is_nonce_rejection(&reason) || reason.contains("revert") {
                SdkError::ExecutionReverted { reason }
            } else {
                SdkError::Connection(reason)
            }
        })?;

        if !receipt.success {
            let reason = receipt
                .revert_reason
                .clone()
                .unwrap_or_else(|| "execute reverted".into());
            tracing::warn!(tag = %action.action_tag, nonce = %signed.nonce, %reason, "signed action rejected");
            return Err(SdkError::ExecutionReverted { reason });
        }

        tracing::info!(tag = %action.action_tag, tx = %receipt.transaction_hash, "signed action executed");
        Ok(receipt)
    }

    /// Sign and submit while holding the key, so the next signature sees the
    /// consumed nonce. A signing failure returns before any transaction exists.
    pub async fn sign_and_submit(
        &self,
        action: &ActionDescriptor,
        relayer: Option<Address>,
        sponsored: bool,
    ) -> Result<(SignedAction, TransactionReceipt)> {
        let _guard = self.coordinator.lock_key(&action.public_key).await;
        let signed = self.coordinator.sign_unlocked(action).await?;
        let receipt = self.submit(action, &signed, relayer, sponsored).await?;
        Ok((signed, receipt))
    }
}
