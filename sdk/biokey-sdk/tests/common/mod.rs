#![allow(dead_code)]

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use biokey_interface::{IAccountFactory, IFaucet, IGuestbook, ISmartAccount, IVoting, IWalletRegistry};
use biokey_sdk::core::authenticator::{
    Assertion, AuthenticatorError, BiometricMethod, CredentialCreation, NewCredential,
    PlatformAuthenticator, PlatformProbe, Platform,
};
use biokey_sdk::core::connection::{
    ChainConnection, ConnectionError, TransactionReceipt, TransactionRequest,
};
use biokey_sdk::signing::action_message_hash;
use biokey_sdk::{
    ChainConfig, ContractRef, MemoryCredentialStore, PublicKey, SdkConfig, SdkContext,
};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey};
use rand::rngs::OsRng;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CHAIN_ID: u64 = 8453;
pub const TESTNET_CHAIN_ID: u64 = 84532;

pub fn factory_address(chain_id: u64) -> Address {
    match chain_id {
        CHAIN_ID => Address::repeat_byte(0xFA),
        _ => Address::repeat_byte(0xFB),
    }
}

pub const VOTING: Address = Address::new([0xA1; 20]);
pub const GUESTBOOK: Address = Address::new([0xA2; 20]);
pub const FAUCET: Address = Address::new([0xA3; 20]);
pub const RELAYER: Address = Address::new([0xEE; 20]);

pub fn registry_address(index: usize) -> Address {
    Address::repeat_byte(0x10 + index as u8)
}

pub fn owner_address() -> Address {
    Address::repeat_byte(0x0E)
}

#[derive(Default)]
struct SmartAccountState {
    public_key: (U256, U256),
    nonces: HashMap<B256, U256>,
}

#[derive(Default)]
struct RegistryState {
    wallets: HashMap<Address, Address>,
    reject_with: Option<String>,
}

/// How the factory misbehaves on `createAccount`.
#[derive(Debug, Clone)]
pub enum DeployFault {
    /// The transaction reverts with this reason
    Revert(String),
    /// The transaction is accepted but never mined
    WithholdReceipt,
    /// Another deployment of the same account lands first, so ours reverts
    Raced,
    /// The receipt reports success but no code is written
    NoCode,
}

#[derive(Default)]
struct ChainState {
    deploy_fault: Option<DeployFault>,
    code: HashMap<Address, Bytes>,
    accounts: HashMap<Address, SmartAccountState>,
    registries: HashMap<Address, RegistryState>,
    receipts: HashMap<B256, TransactionReceipt>,
    sent: Vec<TransactionRequest>,
    executed: Vec<(Address, Address, Bytes)>,
}

/// In-memory EVM stand-in: a CREATE2-style factory, P-256 smart accounts with
/// per-key nonces, and wallet registries.
pub struct MockChain {
    chain_id: u64,
    factory: Address,
    paymaster: bool,
    action_tags: HashMap<[u8; 4], &'static str>,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        let action_tags = HashMap::from([
            (IVoting::voteCall::SELECTOR, "vote"),
            (IGuestbook::signGuestbookCall::SELECTOR, "guestbook"),
            (IFaucet::claimCall::SELECTOR, "faucet.claim"),
        ]);
        Self {
            chain_id,
            factory: factory_address(chain_id),
            paymaster: true,
            action_tags,
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn without_paymaster(mut self) -> Self {
        self.paymaster = false;
        self
    }

    pub fn with_registries(self, registries: impl IntoIterator<Item = Address>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for registry in registries {
                state.code.insert(registry, Bytes::from_static(&[0x60]));
                state.registries.insert(registry, RegistryState::default());
            }
        }
        self
    }

    pub fn fail_deployments(&self, fault: DeployFault) {
        self.state.lock().unwrap().deploy_fault = Some(fault);
    }

    pub fn reject_registration(&self, registry: Address, reason: &str) {
        let mut state = self.state.lock().unwrap();
        state.registries.entry(registry).or_default().reject_with = Some(reason.to_string());
    }

    pub fn accept_registration(&self, registry: Address) {
        let mut state = self.state.lock().unwrap();
        state.registries.entry(registry).or_default().reject_with = None;
    }

    pub fn registered_user(&self, registry: Address, wallet: Address) -> Option<Address> {
        let state = self.state.lock().unwrap();
        state.registries.get(&registry)?.wallets.get(&wallet).copied()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn sent_to(&self, to: Address) -> usize {
        self.state.lock().unwrap().sent.iter().filter(|tx| tx.to == to).count()
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Inner calls the smart accounts performed: (account, target, calldata)
    pub fn executed(&self) -> Vec<(Address, Address, Bytes)> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn nonce_of(&self, account: Address, public_key: &PublicKey) -> U256 {
        let state = self.state.lock().unwrap();
        state
            .accounts
            .get(&account)
            .and_then(|a| a.nonces.get(&public_key.key_hash()).copied())
            .unwrap_or(U256::ZERO)
    }

    pub fn counterfactual_address(&self, x: U256, y: U256, salt: U256) -> Address {
        let mut preimage = Vec::with_capacity(20 + 96);
        preimage.extend_from_slice(self.factory.as_slice());
        preimage.extend_from_slice(&x.to_be_bytes::<32>());
        preimage.extend_from_slice(&y.to_be_bytes::<32>());
        preimage.extend_from_slice(&salt.to_be_bytes::<32>());
        Address::from_slice(&keccak256(&preimage)[12..])
    }

    fn read(&self, to: Address, data: &[u8]) -> Result<Bytes, String> {
        let state = self.state.lock().unwrap();
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or("execution reverted: empty calldata")?;

        if to == self.factory && selector == IAccountFactory::getAddressCall::SELECTOR {
            let call = IAccountFactory::getAddressCall::abi_decode(data, true)
                .map_err(|e| e.to_string())?;
            let account = self.counterfactual_address(call.publicKeyX, call.publicKeyY, call.salt);
            return Ok(account.abi_encode().into());
        }
        if selector == ISmartAccount::getNonceCall::SELECTOR {
            let account = state
                .accounts
                .get(&to)
                .ok_or("execution reverted: account not deployed")?;
            let call =
                ISmartAccount::getNonceCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            let nonce = account
                .nonces
                .get(&call.publicKeyHash)
                .copied()
                .unwrap_or(U256::ZERO);
            return Ok(nonce.abi_encode().into());
        }
        if selector == IWalletRegistry::walletToUserCall::SELECTOR {
            let registry = state
                .registries
                .get(&to)
                .ok_or("execution reverted: not a registry")?;
            let call = IWalletRegistry::walletToUserCall::abi_decode(data, true)
                .map_err(|e| e.to_string())?;
            let user = registry.wallets.get(&call.wallet).copied().unwrap_or(Address::ZERO);
            return Ok(user.abi_encode().into());
        }
        Err(format!("execution reverted: unknown call on {to}"))
    }

    /// Apply `tx`, returning `Err(reason)` when it reverts.
    fn apply(&self, state: &mut ChainState, tx: &TransactionRequest) -> Result<(), String> {
        let data = tx.data.as_ref();
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or("empty calldata")?;

        if tx.to == self.factory && selector == IAccountFactory::createAccountCall::SELECTOR {
            let call = IAccountFactory::createAccountCall::abi_decode(data, true)
                .map_err(|e| e.to_string())?;
            let account = self.counterfactual_address(call.publicKeyX, call.publicKeyY, call.salt);
            match state.deploy_fault.clone() {
                Some(DeployFault::Revert(reason)) => return Err(reason),
                Some(DeployFault::NoCode) => return Ok(()),
                Some(DeployFault::Raced) => {
                    install_account(state, account, call.publicKeyX, call.publicKeyY);
                },
                Some(DeployFault::WithholdReceipt) | None => {},
            }
            if state.code.contains_key(&account) {
                return Err("account already exists".into());
            }
            install_account(state, account, call.publicKeyX, call.publicKeyY);
            return Ok(());
        }

        if selector == ISmartAccount::executeCall::SELECTOR {
            let call =
                ISmartAccount::executeCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            let account = state
                .accounts
                .get_mut(&tx.to)
                .ok_or("account not deployed")?;
            if account.public_key != (call.publicKeyX, call.publicKeyY) {
                return Err("unknown signer".into());
            }
            let public_key = PublicKey::from_coordinates(
                call.publicKeyX.to_be_bytes(),
                call.publicKeyY.to_be_bytes(),
            )
            .map_err(|e| e.to_string())?;
            let key_hash = public_key.key_hash();
            let expected = account.nonces.get(&key_hash).copied().unwrap_or(U256::ZERO);
            if call.nonce != expected {
                return Err(format!(
                    "nonce mismatch: expected {expected}, provided {}",
                    call.nonce
                ));
            }

            let inner_selector: [u8; 4] = call
                .data
                .get(..4)
                .and_then(|s| s.try_into().ok())
                .ok_or("empty inner calldata")?;
            let tag = self
                .action_tags
                .get(&inner_selector)
                .ok_or("unsupported action")?;
            let message = action_message_hash(
                tag,
                self.chain_id,
                call.to,
                keccak256(&call.data),
                call.nonce,
            );
            let signature = Signature::from_scalars(
                call.r.to_be_bytes::<32>(),
                call.s.to_be_bytes::<32>(),
            )
            .map_err(|_| "malformed signature".to_string())?;
            if signature.normalize_s().is_some() {
                return Err("high-s signature".into());
            }
            public_key
                .verifying_key()
                .map_err(|e| e.to_string())?
                .verify(message.as_slice(), &signature)
                .map_err(|_| "invalid signature".to_string())?;

            account.nonces.insert(key_hash, expected + U256::from(1));
            state.executed.push((tx.to, call.to, call.data.clone()));
            return Ok(());
        }

        if selector == IWalletRegistry::registerWalletCall::SELECTOR {
            let call = IWalletRegistry::registerWalletCall::abi_decode(data, true)
                .map_err(|e| e.to_string())?;
            let user = tx.from.ok_or("registration needs a sender")?;
            let registry = state.registries.get_mut(&tx.to).ok_or("not a registry")?;
            if let Some(reason) = &registry.reject_with {
                return Err(reason.clone());
            }
            match registry.wallets.get(&call.wallet) {
                Some(existing) if *existing != user => {
                    return Err(format!("wallet already registered to {existing}"));
                },
                _ => {
                    registry.wallets.insert(call.wallet, user);
                },
            }
            return Ok(());
        }

        Err(format!("unknown call on {}", tx.to))
    }
}

fn install_account(state: &mut ChainState, account: Address, x: U256, y: U256) {
    state.code.insert(account, Bytes::from_static(&[0x60, 0x80]));
    state.accounts.insert(
        account,
        SmartAccountState {
            public_key: (x, y),
            nonces: HashMap::new(),
        },
    );
}

#[async_trait]
impl ChainConnection for MockChain {
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes, ConnectionError> {
        if chain_id != self.chain_id {
            return Err(format!("wrong chain {chain_id}").into());
        }
        self.read(to, &data).map_err(Into::into)
    }

    async fn get_code(&self, _chain_id: u64, address: Address) -> Result<Bytes, ConnectionError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ConnectionError> {
        if tx.sponsored && !self.paymaster {
            return Err("no paymaster configured".into());
        }
        let mut state = self.state.lock().unwrap();
        state.sent.push(tx.clone());
        let block_number = state.sent.len() as u64;
        let transaction_hash = keccak256(block_number.to_be_bytes());

        if tx.to == self.factory && matches!(state.deploy_fault, Some(DeployFault::WithholdReceipt)) {
            return Ok(transaction_hash);
        }
        let outcome = self.apply(&mut state, tx);
        let receipt = TransactionReceipt {
            transaction_hash,
            success: outcome.is_ok(),
            block_number,
            revert_reason: outcome.err(),
        };
        state.receipts.insert(transaction_hash, receipt);
        Ok(transaction_hash)
    }

    async fn get_transaction_receipt(
        &self,
        _chain_id: u64,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ConnectionError> {
        Ok(self.state.lock().unwrap().receipts.get(&hash).cloned())
    }
}

/// Routes each chain id to its own mock chain.
pub struct MultiChain {
    chains: HashMap<u64, Arc<MockChain>>,
}

impl MultiChain {
    pub fn new(chains: impl IntoIterator<Item = Arc<MockChain>>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.chain_id, c)).collect(),
        }
    }

    fn chain(&self, chain_id: u64) -> Result<&Arc<MockChain>, ConnectionError> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| format!("no chain {chain_id}").into())
    }
}

#[async_trait]
impl ChainConnection for MultiChain {
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes, ConnectionError> {
        self.chain(chain_id)?.call(chain_id, to, data).await
    }

    async fn get_code(&self, chain_id: u64, address: Address) -> Result<Bytes, ConnectionError> {
        self.chain(chain_id)?.get_code(chain_id, address).await
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ConnectionError> {
        self.chain(tx.chain_id)?.send_transaction(tx).await
    }

    async fn get_transaction_receipt(
        &self,
        chain_id: u64,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ConnectionError> {
        self.chain(chain_id)?.get_transaction_receipt(chain_id, hash).await
    }
}

/// How the authenticator corrupts the signatures it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFault {
    /// Well-formed signature from a key other than the enrolled one
    WrongKey,
    /// Signature by the enrolled key over `authenticator_data || challenge`
    /// instead of the challenge itself, as a WebAuthn assertion would produce
    WrappedChallenge,
    /// Bytes that are neither DER nor raw `r || s`
    Garbage,
}

/// P-256 authenticator holding keys in process memory.
pub struct SoftwareAuthenticator {
    probe: PlatformProbe,
    keys: Mutex<HashMap<Vec<u8>, SigningKey>>,
    cancel_prompts: AtomicBool,
    raw_signatures: AtomicBool,
    prompt_delay: Mutex<Option<Duration>>,
    prompts: AtomicUsize,
    signature_fault: Mutex<Option<SignatureFault>>,
}

impl SoftwareAuthenticator {
    pub fn new() -> Self {
        Self::with_probe(PlatformProbe {
            platform: Platform::MacOs,
            has_secure_enclave: true,
            user_verifying_available: true,
            methods: BTreeSet::from([BiometricMethod::Fingerprint]),
        })
    }

    pub fn without_enclave() -> Self {
        Self::with_probe(PlatformProbe {
            platform: Platform::Linux,
            has_secure_enclave: false,
            user_verifying_available: false,
            methods: BTreeSet::new(),
        })
    }

    pub fn with_probe(probe: PlatformProbe) -> Self {
        Self {
            probe,
            keys: Mutex::new(HashMap::new()),
            cancel_prompts: AtomicBool::new(false),
            raw_signatures: AtomicBool::new(false),
            prompt_delay: Mutex::new(None),
            prompts: AtomicUsize::new(0),
            signature_fault: Mutex::new(None),
        }
    }

    /// Every following prompt is dismissed by the user.
    pub fn cancel_prompts(&self, cancel: bool) {
        self.cancel_prompts.store(cancel, Ordering::SeqCst);
    }

    /// Return raw `r || s` instead of DER.
    pub fn raw_signatures(&self, raw: bool) {
        self.raw_signatures.store(raw, Ordering::SeqCst);
    }

    pub fn corrupt_signatures(&self, fault: Option<SignatureFault>) {
        *self.signature_fault.lock().unwrap() = fault;
    }

    pub fn delay_prompts(&self, delay: Duration) {
        *self.prompt_delay.lock().unwrap() = Some(delay);
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    async fn prompt(&self) -> Result<(), AuthenticatorError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.prompt_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.cancel_prompts.load(Ordering::SeqCst) {
            return Err(AuthenticatorError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformAuthenticator for SoftwareAuthenticator {
    async fn probe(&self) -> Result<PlatformProbe, AuthenticatorError> {
        Ok(self.probe.clone())
    }

    async fn create_credential(
        &self,
        options: &CredentialCreation,
    ) -> Result<NewCredential, AuthenticatorError> {
        if !self.probe.has_secure_enclave {
            return Err(AuthenticatorError::NotSupported("no secure enclave".into()));
        }
        self.prompt().await?;

        let key = SigningKey::random(&mut OsRng);
        let public_key_sec1 = key.verifying_key().to_encoded_point(false).as_bytes().to_vec();
        let mut credential_id = options.user_id.clone();
        credential_id.extend_from_slice(&rand::random::<[u8; 16]>());
        self.keys.lock().unwrap().insert(credential_id.clone(), key);

        Ok(NewCredential {
            credential_id,
            public_key_sec1,
        })
    }

    async fn get_assertion(
        &self,
        credential_id: &[u8],
        challenge: &[u8; 32],
    ) -> Result<Assertion, AuthenticatorError> {
        self.prompt().await?;
        let key = self
            .keys
            .lock()
            .unwrap()
            .get(credential_id)
            .cloned()
            .ok_or_else(|| AuthenticatorError::Platform("unknown credential".into()))?;

        let fault = *self.signature_fault.lock().unwrap();
        let signature: Signature = match fault {
            None => key.sign(challenge),
            Some(SignatureFault::WrongKey) => SigningKey::random(&mut OsRng).sign(challenge),
            Some(SignatureFault::WrappedChallenge) => {
                let mut payload = vec![0x49; 37];
                payload.extend_from_slice(challenge);
                key.sign(&payload)
            },
            Some(SignatureFault::Garbage) => {
                return Ok(Assertion::new(vec![0x30, 0x02, 0xde, 0xad, 0xbe, 0xef]));
            },
        };
        let bytes = if self.raw_signatures.load(Ordering::SeqCst) {
            signature.to_bytes().to_vec()
        } else {
            signature.to_der().as_bytes().to_vec()
        };
        Ok(Assertion::new(bytes))
    }
}

pub struct TestContext {
    pub chain: Arc<MockChain>,
    pub authenticator: Arc<SoftwareAuthenticator>,
    pub store: Arc<MemoryCredentialStore>,
    pub ctx: SdkContext,
}

pub fn test_config(registries: &[ContractRef]) -> SdkConfig {
    let mut chain = ChainConfig::new(CHAIN_ID, "base").with_factory(factory_address(CHAIN_ID));
    for registry in registries {
        chain = chain.with_contract(registry.clone());
    }
    let mut config = SdkConfig::new("portfolio.example", "Portfolio")
        .with_chain(chain)
        .with_chain(ChainConfig::new(1, "mainnet"));
    config.deployment_timeout_secs = 5;
    config.confirmation_poll_interval_ms = 1;
    config
}

pub fn registry_refs(count: usize) -> Vec<ContractRef> {
    (0..count)
        .map(|i| ContractRef::new(format!("registry-{}", i + 1), registry_address(i)))
        .collect()
}

pub fn setup_with(
    registries: Vec<ContractRef>,
    authenticator: SoftwareAuthenticator,
) -> TestContext {
    let config = test_config(&registries);
    setup_with_config(registries, authenticator, config)
}

pub fn setup_with_config(
    registries: Vec<ContractRef>,
    authenticator: SoftwareAuthenticator,
    config: SdkConfig,
) -> TestContext {
    biokey_sdk::logging::init_logging();
    let chain = Arc::new(
        MockChain::new(CHAIN_ID).with_registries(registries.iter().map(|r| r.address)),
    );
    let authenticator = Arc::new(authenticator);
    let store = Arc::new(MemoryCredentialStore::new());
    let ctx = SdkContext::new(
        config,
        chain.clone(),
        authenticator.clone(),
        store.clone(),
    );
    TestContext {
        chain,
        authenticator,
        store,
        ctx,
    }
}

pub fn setup_test_context() -> TestContext {
    setup_with(registry_refs(5), SoftwareAuthenticator::new())
}
