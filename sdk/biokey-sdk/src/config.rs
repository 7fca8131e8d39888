use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Chain {0} is configured more than once")]
    DuplicateChain(u64),

    #[error("Contract {address} is listed more than once on chain {chain_id}")]
    DuplicateContract { chain_id: u64, address: Address },

    #[error("Chain {0} is not configured")]
    UnknownChain(u64),
}

/// The contents of the biokey config.yaml file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SdkConfig {
    pub relying_party: RelyingPartyConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    /// How long to wait for a deployment or registration to confirm.
    #[serde(default = "default_deployment_timeout_secs")]
    pub deployment_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub confirmation_poll_interval_ms: u64,
    /// Directory for the durable credential store. In-memory when unset.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

/// WebAuthn relying party the credential is scoped to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelyingPartyConfig {
    /// Origin host, e.g. `portfolio.example`. Also scopes the credential store.
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Endpoint accepting gas-sponsored transactions
    #[serde(default)]
    pub paymaster_url: Option<String>,
    /// Account factory. Chains without one cannot host smart accounts.
    #[serde(default)]
    pub factory: Option<Address>,
    /// Feature contracts the smart account is registered with during setup
    #[serde(default)]
    pub contracts: Vec<ContractRef>,
}

/// A feature contract exposing `walletToUser` / `registerWallet`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractRef {
    pub name: String,
    pub address: Address,
    /// Setup is only ready when every required contract registered.
    #[serde(default)]
    pub required: bool,
}

impl ContractRef {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

fn default_deployment_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl SdkConfig {
    pub fn new(relying_party_id: impl Into<String>, relying_party_name: impl Into<String>) -> Self {
        Self {
            relying_party: RelyingPartyConfig {
                id: relying_party_id.into(),
                name: relying_party_name.into(),
            },
            chains: Vec::new(),
            deployment_timeout_secs: default_deployment_timeout_secs(),
            confirmation_poll_interval_ms: default_poll_interval_ms(),
            storage_dir: None,
        }
    }

    pub fn with_chain(mut self, chain: ChainConfig) -> Self {
        self.chains.push(chain);
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&file)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut chain_ids = HashSet::new();
        for chain in &self.chains {
            if !chain_ids.insert(chain.chain_id) {
                return Err(ConfigError::DuplicateChain(chain.chain_id));
            }
            let mut addresses = HashSet::new();
            for contract in &chain.contracts {
                if !addresses.insert(contract.address) {
                    return Err(ConfigError::DuplicateContract {
                        chain_id: chain.chain_id,
                        address: contract.address,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Factory address for `chain_id`, if the chain is known and has one
    pub fn factory(&self, chain_id: u64) -> Option<Address> {
        self.chain(chain_id).and_then(|c| c.factory)
    }

    /// Registration targets for `chain_id`
    pub fn contracts(&self, chain_id: u64) -> Result<&[ContractRef], ConfigError> {
        self.chain(chain_id)
            .map(|c| c.contracts.as_slice())
            .ok_or(ConfigError::UnknownChain(chain_id))
    }

    pub fn deployment_timeout(&self) -> Duration {
        Duration::from_secs(self.deployment_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms)
    }
}

impl ChainConfig {
    pub fn new(chain_id: u64, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
            rpc_url: None,
            paymaster_url: None,
            factory: None,
            contracts: Vec::new(),
        }
    }

    pub fn with_factory(mut self, factory: Address) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_contract(mut self, contract: ContractRef) -> Self {
        self.contracts.push(contract);
        self
    }
}
