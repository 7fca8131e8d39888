//! Canonical action message
//!
//! Version 1 hashes
//! `abi.encode(DOMAIN_TAG_V1, keccak256(tag), chainId, contract, keccak256(payload), nonce)`
//! with keccak256, so a signature is bound to one action, chain, contract,
//! call and nonce.

use crate::actions::Action;
use crate::core::constants::DOMAIN_TAG_V1;
use crate::types::PublicKey;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;

/// What the user is authorizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub action_tag: String,
    pub chain_id: u64,
    /// Contract the smart account will call
    pub contract: Address,
    /// ABI-encoded call on `contract`
    pub payload: Bytes,
    pub public_key: PublicKey,
}

impl ActionDescriptor {
    pub fn new(
        action: &impl Action,
        chain_id: u64,
        contract: Address,
        public_key: PublicKey,
    ) -> Self {
        Self {
            action_tag: action.tag().to_string(),
            chain_id,
            contract,
            payload: action.calldata(),
            public_key,
        }
    }

    pub fn payload_hash(&self) -> B256 {
        keccak256(&self.payload)
    }

    /// Hash the authenticator signs for this action at `nonce`
    pub fn message_hash(&self, nonce: U256) -> B256 {
        action_message_hash(
            &self.action_tag,
            self.chain_id,
            self.contract,
            self.payload_hash(),
            nonce,
        )
    }
}

pub fn domain_tag_v1() -> B256 {
    keccak256(DOMAIN_TAG_V1)
}

pub fn action_message_hash(
    action_tag: &str,
    chain_id: u64,
    contract: Address,
    payload_hash: B256,
    nonce: U256,
) -> B256 {
    let encoded = (
        domain_tag_v1(),
        keccak256(action_tag.as_bytes()),
        U256::from(chain_id),
        contract,
        payload_hash,
        nonce,
    )
        .abi_encode();
    keccak256(encoded)
}
