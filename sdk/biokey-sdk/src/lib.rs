pub mod account;
pub mod actions;
pub mod capability;
pub mod config;
pub mod context;
pub mod core;
pub mod enrollment;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metadata;
pub mod registrar;
pub mod setup;
pub mod signing;
pub mod store;
pub mod types;

pub use crate::account::{AddressDeriver, Deployer};
pub use crate::actions::{Action, FaucetClaim, GuestbookEntry, RawCall, Vote};
pub use crate::capability::{Capability, CapabilityDetector};
pub use crate::config::{ChainConfig, ContractRef, SdkConfig};
pub use crate::context::SdkContext;
pub use crate::core::authenticator::PlatformAuthenticator;
pub use crate::core::connection::ChainConnection;
pub use crate::core::rpc::JsonRpcConnection;
pub use crate::enrollment::KeyEnrollment;
pub use crate::error::{ErrorKind, Result, SdkError};
pub use crate::executor::Executor;
pub use crate::registrar::{Registrar, RegistrationReport};
pub use crate::setup::{SetupOptions, SetupOrchestrator, SetupState};
pub use crate::signing::{ActionDescriptor, SignedAction, SigningCoordinator};
pub use crate::store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use crate::types::{CredentialRecord, PublicKey};

pub mod interface {
    pub use biokey_interface::{
        IAccountFactory, IFaucet, IGuestbook, ISmartAccount, IVoting, IWalletRegistry,
    };
}
