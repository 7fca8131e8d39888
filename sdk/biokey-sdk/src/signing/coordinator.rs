use crate::account::AddressDeriver;
use crate::context::SdkContext;
use crate::core::authenticator::PlatformAuthenticator;
use crate::core::connection::{call_contract, ChainConnection};
use crate::error::{Result, SdkError};
use crate::signing::message::ActionDescriptor;
use crate::signing::signature::{coerce_signature, split_components};
use crate::store::CredentialStore;
use crate::types::{CredentialRecord, PublicKey};
use alloy_primitives::{Address, B256, U256};
use biokey_interface::ISmartAccount;
use p256::ecdsa::signature::Verifier;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A biometric authorization ready to be submitted through `execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAction {
    pub r: B256,
    pub s: B256,
    pub public_key: PublicKey,
    /// Nonce the signature commits to; submit exactly this value
    pub nonce: U256,
    pub message_hash: B256,
    /// Smart account the signature is valid for
    pub account: Address,
}

impl SignedAction {
    pub fn r_word(&self) -> U256 {
        U256::from_be_bytes(self.r.0)
    }

    pub fn s_word(&self) -> U256 {
        U256::from_be_bytes(self.s.0)
    }
}

/// Held while a key is signing (and, for the executor, submitting).
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Produces biometric signatures over canonical action messages.
///
/// There is no non-biometric path: every failure of the platform prompt is
/// returned to the caller as-is.
#[derive(Clone)]
pub struct SigningCoordinator {
    deriver: AddressDeriver,
    connection: Arc<dyn ChainConnection>,
    authenticator: Arc<dyn PlatformAuthenticator>,
    store: Arc<dyn CredentialStore>,
    key_locks: Arc<Mutex<HashMap<B256, Arc<AsyncMutex<()>>>>>,
}

impl SigningCoordinator {
    pub fn new(ctx: &SdkContext) -> Self {
        Self {
            deriver: AddressDeriver::new(ctx),
            connection: ctx.connection.clone(),
            authenticator: ctx.authenticator.clone(),
            store: ctx.store.clone(),
            key_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait until no other signature for `public_key` is in flight.
    pub async fn lock_key(&self, public_key: &PublicKey) -> KeyGuard {
        let lock = {
            let mut locks = self
                .key_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry(public_key.key_hash())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        KeyGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Sign `action` with the enrolled device key.
    ///
    /// Calls for the same key are serialized so two signatures never commit
    /// to the same nonce.
    pub async fn sign(&self, action: &ActionDescriptor) -> Result<SignedAction> {
        let _guard = self.lock_key(&action.public_key).await;
        self.sign_unlocked(action).await
    }

    /// Current on-chain nonce of `public_key` in `account`.
    pub async fn fetch_nonce(
        &self,
        chain_id: u64,
        account: Address,
        public_key: &PublicKey,
    ) -> Result<U256> {
        let call = ISmartAccount::getNonceCall {
            publicKeyHash: public_key.key_hash(),
        };
        call_contract(self.connection.as_ref(), chain_id, account, &call)
            .await
            .map(|ret| ret.nonce)
            .map_err(SdkError::NonceFetchFailed)
    }

    pub(crate) async fn sign_unlocked(&self, action: &ActionDescriptor) -> Result<SignedAction> {
        let record = self.enrolled_record(&action.public_key).await?;
        let account = self
            .deriver
            .compute_address(&action.public_key, action.chain_id)
            .await?;

        // Fresh on every call; a cached nonce would allow replays.
        let nonce = self
            .fetch_nonce(action.chain_id, account, &action.public_key)
            .await?;
        let message_hash = action.message_hash(nonce);
        tracing::debug!(
            tag = %action.action_tag,
            chain_id = action.chain_id,
            %account,
            %nonce,
            "requesting biometric signature"
        );

        let assertion = self
            .authenticator
            .get_assertion(&record.credential_id, &message_hash.0)
            .await?;

        let signature = coerce_signature(&assertion.signature)?;
        action
            .public_key
            .verifying_key()?
            .verify(message_hash.as_slice(), &signature)
            .map_err(|_| {
                SdkError::SignatureFormatInvalid(
                    "signature does not verify against the enrolled key".into(),
                )
            })?;

        let (r, s) = split_components(&signature);
        tracing::info!(tag = %action.action_tag, %account, %nonce, "action signed");
        Ok(SignedAction {
            r: B256::from(r),
            s: B256::from(s),
            public_key: action.public_key,
            nonce,
            message_hash,
            account,
        })
    }

    async fn enrolled_record(&self, public_key: &PublicKey) -> Result<CredentialRecord> {
        match self.store.get().await? {
            Some(record) if record.public_key == *public_key => Ok(record),
            _ => Err(SdkError::NotRegistered),
        }
    }
}
