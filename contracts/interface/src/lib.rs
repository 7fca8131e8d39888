//! Biokey contract interface
//!
//! Solidity call surface of the contracts the SDK talks to: the counterfactual
//! account factory, the P-256 smart account, the per-feature wallet registries
//! and the feature actions themselves. The contracts are deployed and
//! maintained separately; nothing here performs I/O.

pub mod revert;

use alloy_sol_types::sol;

pub use alloy_sol_types::{SolCall, SolError, SolValue};

sol! {
    /// Deploys P-256 smart accounts at CREATE2 addresses keyed on the public key.
    interface IAccountFactory {
        function getAddress(uint256 publicKeyX, uint256 publicKeyY, uint256 salt) external view returns (address account);
        function createAccount(uint256 publicKeyX, uint256 publicKeyY, uint256 salt) external returns (address account);
    }

    /// Smart account verifying secp256r1 signatures over the canonical action hash.
    interface ISmartAccount {
        function getNonce(bytes32 publicKeyHash) external view returns (uint256 nonce);
        function execute(
            address to,
            uint256 value,
            bytes data,
            uint256 r,
            uint256 s,
            uint256 publicKeyX,
            uint256 publicKeyY,
            uint256 nonce
        ) external;
    }

    /// Links a smart account to the externally-owned address it acts for.
    interface IWalletRegistry {
        function walletToUser(address wallet) external view returns (address user);
        function registerWallet(address wallet) external;
    }

    interface IVoting {
        function vote(uint256 proposalId, bool support) external;
    }

    interface IGuestbook {
        function signGuestbook(string message) external;
    }

    interface IFaucet {
        function claim() external;
    }

    /// Raised by the smart account when the submitted nonce is not the current one.
    error NonceMismatch(uint256 expected, uint256 provided);

    /// Raised by a registry when the wallet is already bound to another user.
    error WalletAlreadyRegistered(address wallet, address user);
}
