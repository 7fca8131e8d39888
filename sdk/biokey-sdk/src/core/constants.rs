use alloy_primitives::U256;

/// CREATE2 salt used for every account: one account per key per chain
pub const DEFAULT_SALT: U256 = U256::ZERO;

/// Preimage of the version-1 domain tag mixed into every signed action
pub const DOMAIN_TAG_V1: &[u8] = b"biokey.action.v1";

/// Version byte leading the on-disk credential record
pub const CREDENTIAL_FORMAT_VERSION: u8 = 1;

pub const CREDENTIAL_FILE_EXTENSION: &str = "credential";
