//! Typed feature actions
//!
//! Each action knows its tag (the first field of the signed message) and the
//! calldata the smart account forwards to the feature contract.

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::SolCall;
use biokey_interface::{IFaucet, IGuestbook, IVoting};

pub trait Action {
    fn tag(&self) -> &str;
    fn calldata(&self) -> Bytes;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub proposal_id: U256,
    pub support: bool,
}

impl Action for Vote {
    fn tag(&self) -> &str {
        "vote"
    }

    fn calldata(&self) -> Bytes {
        IVoting::voteCall {
            proposalId: self.proposal_id,
            support: self.support,
        }
        .abi_encode()
        .into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestbookEntry {
    pub message: String,
}

impl Action for GuestbookEntry {
    fn tag(&self) -> &str {
        "guestbook"
    }

    fn calldata(&self) -> Bytes {
        IGuestbook::signGuestbookCall {
            message: self.message.clone(),
        }
        .abi_encode()
        .into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaucetClaim;

impl Action for FaucetClaim {
    fn tag(&self) -> &str {
        "faucet.claim"
    }

    fn calldata(&self) -> Bytes {
        IFaucet::claimCall {}.abi_encode().into()
    }
}

/// Escape hatch for contracts without a typed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCall {
    pub tag: String,
    pub calldata: Bytes,
}

impl Action for RawCall {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn calldata(&self) -> Bytes {
        self.calldata.clone()
    }
}
