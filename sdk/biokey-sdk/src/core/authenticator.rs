use crate::error::SdkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BiometricMethod {
    Face,
    Fingerprint,
    /// Device PIN or an unidentified user-verification method
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Ios,
    MacOs,
    Android,
    Windows,
    Linux,
    Unknown,
}

/// Raw answer of the host when asked what its authenticator can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProbe {
    pub platform: Platform,
    pub has_secure_enclave: bool,
    /// A user-verifying platform authenticator is reachable right now
    pub user_verifying_available: bool,
    pub methods: BTreeSet<BiometricMethod>,
}

/// Parameters for generating a new enclave-bound key.
#[derive(Debug, Clone)]
pub struct CredentialCreation {
    pub relying_party_id: String,
    pub relying_party_name: String,
    pub user_id: Vec<u8>,
    pub user_display_name: String,
    pub challenge: [u8; 32],
}

/// Public output of a key generation. The private scalar stays in the enclave.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub credential_id: Vec<u8>,
    /// SEC1-encoded public key
    pub public_key_sec1: Vec<u8>,
}

/// Signature blob in whatever format the platform produces (DER or raw `r || s`).
///
/// The signed message is the 32-byte challenge itself. A WebAuthn bridge has
/// to sign the raw challenge; a signature over `authenticatorData ||
/// sha256(clientDataJSON)` fails local verification.
#[derive(Debug, Clone, Default)]
pub struct Assertion {
    pub signature: Vec<u8>,
}

impl Assertion {
    pub fn new(signature: Vec<u8>) -> Self {
        Self { signature }
    }
}

#[derive(Debug, Error)]
pub enum AuthenticatorError {
    #[error("prompt dismissed")]
    Cancelled,

    #[error("prompt timed out")]
    TimedOut,

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Platform(String),
}

impl From<AuthenticatorError> for SdkError {
    fn from(e: AuthenticatorError) -> Self {
        match e {
            AuthenticatorError::Cancelled | AuthenticatorError::TimedOut => SdkError::UserCancelled,
            AuthenticatorError::NotSupported(reason) => SdkError::CapabilityUnavailable(reason),
            AuthenticatorError::Platform(reason) => SdkError::PlatformError(reason),
        }
    }
}

/// Abstraction for the device's secure-enclave authenticator.
/// Every key operation is gated by a biometric prompt on the host; a dismissed
/// prompt must resolve promptly with [`AuthenticatorError::Cancelled`].
#[async_trait]
pub trait PlatformAuthenticator: Send + Sync {
    async fn probe(&self) -> Result<PlatformProbe, AuthenticatorError>;

    /// Generate a non-extractable P-256 key pair.
    async fn create_credential(
        &self,
        options: &CredentialCreation,
    ) -> Result<NewCredential, AuthenticatorError>;

    /// Sign `challenge` as-is (ECDSA over SHA-256) with the key behind
    /// `credential_id`.
    async fn get_assertion(
        &self,
        credential_id: &[u8],
        challenge: &[u8; 32],
    ) -> Result<Assertion, AuthenticatorError>;
}
