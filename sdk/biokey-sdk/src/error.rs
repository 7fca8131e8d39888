use crate::registrar::RegistrationReport;
use alloy_primitives::Address;
use thiserror::Error;

/// SDK-specific error types for biokey operations
#[derive(Debug, Error)]
pub enum SdkError {
    /// The device has no usable platform authenticator
    #[error("Platform authenticator unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The biometric prompt was dismissed or timed out
    #[error("Biometric prompt cancelled by the user")]
    UserCancelled,

    /// Enclave or operating-system failure
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// No account factory known for the chain
    #[error("No account factory configured for chain {0}")]
    FactoryNotConfigured(u64),

    /// Factory call failed or returned the zero address
    #[error("Address computation failed: {0}")]
    AddressComputationFailed(String),

    /// Deployment reverted or was not confirmed in time
    #[error("Deployment failed: {0}")]
    DeploymentFailed(String),

    /// Reading the account nonce failed
    #[error("Nonce fetch failed: {0}")]
    NonceFetchFailed(String),

    /// The authenticator returned a signature we cannot coerce into (r, s)
    #[error("Invalid signature format: {0}")]
    SignatureFormatInvalid(String),

    /// The public key has no enrolled credential on this device
    #[error("Public key is not registered on this device")]
    NotRegistered,

    /// Registration failed on one or more contracts
    #[error("Registration failed on {} of {} contracts", .0.failed(), .0.entries.len())]
    PartialRegistrationFailure(RegistrationReport),

    /// Registration failed on a single contract
    #[error("Registration on {contract} failed: {reason}")]
    RegistrationFailed { contract: Address, reason: String },

    /// A signed action was rejected on submission
    #[error("Execution reverted: {reason}")]
    ExecutionReverted { reason: String },

    /// Setup was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Transport failure outside the named steps
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Setup was driven out of order, e.g. started twice
    #[error(transparent)]
    InvalidTransition(#[from] crate::setup::InvalidTransition),
}

/// Copyable discriminant of [`SdkError`], used in reports and for UI messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CapabilityUnavailable,
    UserCancelled,
    PlatformError,
    FactoryNotConfigured,
    AddressComputationFailed,
    DeploymentFailed,
    NonceFetchFailed,
    SignatureFormatInvalid,
    NotRegistered,
    PartialRegistrationFailure,
    RegistrationFailed,
    ExecutionReverted,
    Cancelled,
    Connection,
    Config,
    InvalidTransition,
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            Self::UserCancelled => ErrorKind::UserCancelled,
            Self::PlatformError(_) => ErrorKind::PlatformError,
            Self::FactoryNotConfigured(_) => ErrorKind::FactoryNotConfigured,
            Self::AddressComputationFailed(_) => ErrorKind::AddressComputationFailed,
            Self::DeploymentFailed(_) => ErrorKind::DeploymentFailed,
            Self::NonceFetchFailed(_) => ErrorKind::NonceFetchFailed,
            Self::SignatureFormatInvalid(_) => ErrorKind::SignatureFormatInvalid,
            Self::NotRegistered => ErrorKind::NotRegistered,
            Self::PartialRegistrationFailure(_) => ErrorKind::PartialRegistrationFailure,
            Self::RegistrationFailed { .. } => ErrorKind::RegistrationFailed,
            Self::ExecutionReverted { .. } => ErrorKind::ExecutionReverted,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidTransition(_) => ErrorKind::InvalidTransition,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }
}

impl ErrorKind {
    /// Whether the caller may retry the same operation without changing anything.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::UserCancelled
                | Self::NonceFetchFailed
                | Self::SignatureFormatInvalid
                | Self::DeploymentFailed
                | Self::PartialRegistrationFailure
                | Self::RegistrationFailed
                | Self::Connection
                | Self::Cancelled
        )
    }

    /// Suggested remediation to show next to the error.
    pub fn remediation(self) -> &'static str {
        match self {
            Self::CapabilityUnavailable => {
                "Use a device with a biometric authenticator (Face ID, Touch ID or Windows Hello)."
            },
            Self::UserCancelled => "Confirm the biometric prompt to continue.",
            Self::PlatformError => "Restart the browser or device and try again.",
            Self::FactoryNotConfigured => "Switch to a supported network.",
            Self::AddressComputationFailed => "Check the network connection and try again.",
            Self::DeploymentFailed => "Retry the deployment; nothing was deployed.",
            Self::NonceFetchFailed => "Check the network connection and try again.",
            Self::SignatureFormatInvalid => "Try signing again.",
            Self::NotRegistered => "Set up biometric signing on this device first.",
            Self::PartialRegistrationFailure => "Retry registration for the failed contracts.",
            Self::RegistrationFailed => "Retry registration for this contract.",
            Self::ExecutionReverted => "Sign the action again with a fresh nonce.",
            Self::Cancelled => "Start setup again when ready.",
            Self::Connection => "Check the network connection and try again.",
            Self::Config => "Fix the application configuration.",
            Self::InvalidTransition => "Wait for the current setup to finish.",
        }
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
