use crate::account::address::AddressDeriver;
use crate::config::SdkConfig;
use crate::context::SdkContext;
use crate::core::connection::{send_and_confirm, ChainConnection, TransactionRequest};
use crate::core::constants::DEFAULT_SALT;
use crate::error::{Result, SdkError};
use crate::types::PublicKey;
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use biokey_interface::IAccountFactory;
use std::sync::Arc;

/// Puts the smart account on chain when it is not there yet.
#[derive(Clone)]
pub struct Deployer {
    deriver: AddressDeriver,
    config: Arc<SdkConfig>,
    connection: Arc<dyn ChainConnection>,
}

impl Deployer {
    pub fn new(ctx: &SdkContext) -> Self {
        Self {
            deriver: AddressDeriver::new(ctx),
            config: ctx.config.clone(),
            connection: ctx.connection.clone(),
        }
    }

    /// True iff the address carries contract code.
    pub async fn is_deployed(&self, address: Address, chain_id: u64) -> Result<bool> {
        let code = self
            .connection
            .get_code(chain_id, address)
            .await
            .map_err(|e| SdkError::Connection(e.to_string()))?;
        Ok(!code.is_empty())
    }

    /// Deploy the account for `public_key`, returning its address.
    ///
    /// Idempotent: an account that already has code is returned without a
    /// transaction. Otherwise blocks until the factory call is confirmed.
    pub async fn deploy(
        &self,
        public_key: &PublicKey,
        chain_id: u64,
        sponsored: bool,
    ) -> Result<Address> {
        let address = self.deriver.compute_address(public_key, chain_id).await?;

        if self
            .is_deployed(address, chain_id)
            .await
            .map_err(|e| SdkError::DeploymentFailed(e.to_string()))?
        {
            tracing::info!(chain_id, %address, "smart account already deployed");
            return Ok(address);
        }

        let factory = self.deriver.factory(chain_id)?;
        let call = IAccountFactory::createAccountCall {
            publicKeyX: public_key.x_word(),
            publicKeyY: public_key.y_word(),
            salt: DEFAULT_SALT,
        };
        let tx = TransactionRequest::new(chain_id, factory, call.abi_encode()).sponsored(sponsored);

        tracing::info!(chain_id, %address, sponsored, "deploying smart account");
        let receipt = send_and_confirm(
            self.connection.as_ref(),
            &tx,
            self.config.deployment_timeout(),
            self.config.poll_interval(),
        )
        .await
        .map_err(SdkError::DeploymentFailed)?;

        let deployed = self
            .is_deployed(address, chain_id)
            .await
            .map_err(|e| SdkError::DeploymentFailed(e.to_string()))?;

        if !receipt.success {
            // Someone else may have deployed the same account first.
            if deployed {
                tracing::info!(chain_id, %address, "deployment raced; account already present");
                return Ok(address);
            }
            return Err(SdkError::DeploymentFailed(
                receipt
                    .revert_reason
                    .unwrap_or_else(|| format!("transaction {} reverted", receipt.transaction_hash)),
            ));
        }

        if !deployed {
            return Err(SdkError::DeploymentFailed(format!(
                "transaction {} confirmed but {} has no code",
                receipt.transaction_hash, address
            )));
        }

        tracing::info!(chain_id, %address, tx = %receipt.transaction_hash, "smart account deployed");
        Ok(address)
    }
}
