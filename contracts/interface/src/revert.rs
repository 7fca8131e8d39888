//! Revert data decoding
//!
//! Turns the raw return data of a failed call into a readable reason. Standard
//! `Error(string)` and `Panic(uint256)` payloads are handled alongside the
//! custom errors declared by the account and registry contracts.

use crate::{NonceMismatch, WalletAlreadyRegistered};
use alloy_sol_types::{Panic, Revert, SolError};

/// Decode revert data into a human-readable reason.
///
/// Returns `None` for empty data or for selectors this crate does not know.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }

    if let Ok(revert) = Revert::abi_decode(data, true) {
        return Some(revert.reason);
    }

    if let Ok(panic) = Panic::abi_decode(data, true) {
        return Some(format!("panic code {}", panic.code));
    }

    if let Ok(err) = NonceMismatch::abi_decode(data, true) {
        return Some(format!(
            "nonce mismatch: expected {}, provided {}",
            err.expected, err.provided
        ));
    }

    if let Ok(err) = WalletAlreadyRegistered::abi_decode(data, true) {
        return Some(format!(
            "wallet {} already registered to {}",
            err.wallet, err.user
        ));
    }

    None
}

/// Whether a decoded reason indicates a replayed or stale nonce.
pub fn is_nonce_rejection(reason: &str) -> bool {
    reason.to_ascii_lowercase().contains("nonce")
}
