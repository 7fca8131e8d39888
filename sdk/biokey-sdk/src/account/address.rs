use crate::config::SdkConfig;
use crate::context::SdkContext;
use crate::core::connection::{call_contract, ChainConnection};
use crate::core::constants::DEFAULT_SALT;
use crate::error::{Result, SdkError};
use crate::types::PublicKey;
use alloy_primitives::{Address, U256};
use biokey_interface::IAccountFactory;
use std::sync::Arc;

/// Computes counterfactual smart-account addresses through the chain's factory.
#[derive(Clone)]
pub struct AddressDeriver {
    config: Arc<SdkConfig>,
    connection: Arc<dyn ChainConnection>,
}

impl AddressDeriver {
    pub fn new(ctx: &SdkContext) -> Self {
        Self {
            config: ctx.config.clone(),
            connection: ctx.connection.clone(),
        }
    }

    /// Address of the account for `public_key` on `chain_id`, deployed or not.
    pub async fn compute_address(&self, public_key: &PublicKey, chain_id: u64) -> Result<Address> {
        self.compute_address_with_salt(public_key, chain_id, DEFAULT_SALT)
            .await
    }

    pub async fn compute_address_with_salt(
        &self,
        public_key: &PublicKey,
        chain_id: u64,
        salt: U256,
    ) -> Result<Address> {
        let factory = self.factory(chain_id)?;
        let call = IAccountFactory::getAddressCall {
            publicKeyX: public_key.x_word(),
            publicKeyY: public_key.y_word(),
            salt,
        };

        let account = call_contract(self.connection.as_ref(), chain_id, factory, &call)
            .await
            .map_err(SdkError::AddressComputationFailed)?
            .account;

        if account == Address::ZERO {
            return Err(SdkError::AddressComputationFailed(
                "factory returned the zero address".into(),
            ));
        }

        tracing::debug!(chain_id, key = %public_key, %account, "smart account address computed");
        Ok(account)
    }

    pub fn factory(&self, chain_id: u64) -> Result<Address> {
        self.config
            .factory(chain_id)
            .ok_or(SdkError::FactoryNotConfigured(chain_id))
    }
}
