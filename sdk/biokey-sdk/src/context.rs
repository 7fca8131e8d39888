use crate::config::SdkConfig;
use crate::core::authenticator::PlatformAuthenticator;
use crate::core::connection::ChainConnection;
use crate::core::rpc::JsonRpcConnection;
use crate::store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use std::sync::Arc;

/// Shared handles every component is built from.
///
/// Created once at application start and cloned into each component; there is
/// no process-global client.
#[derive(Clone)]
pub struct SdkContext {
    pub config: Arc<SdkConfig>,
    pub connection: Arc<dyn ChainConnection>,
    pub authenticator: Arc<dyn PlatformAuthenticator>,
    pub store: Arc<dyn CredentialStore>,
}

impl SdkContext {
    pub fn new(
        config: SdkConfig,
        connection: Arc<dyn ChainConnection>,
        authenticator: Arc<dyn PlatformAuthenticator>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            connection,
            authenticator,
            store,
        }
    }

    /// Wire up JSON-RPC and the store selected by `config.storage_dir`.
    pub fn from_config(config: SdkConfig, authenticator: Arc<dyn PlatformAuthenticator>) -> Self {
        let connection = Arc::new(JsonRpcConnection::from_config(&config));
        let store: Arc<dyn CredentialStore> = match &config.storage_dir {
            Some(dir) => Arc::new(FileCredentialStore::new(dir, &config.relying_party.id)),
            None => Arc::new(MemoryCredentialStore::new()),
        };
        Self::new(config, connection, authenticator, store)
    }
}
