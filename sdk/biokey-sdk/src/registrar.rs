//! Per-contract wallet registration
//!
//! Links the smart account to the user's externally-owned address on every
//! feature contract. Contracts are independent: each attempt produces its own
//! `Result`, and one contract's failure never stops the others.

use crate::config::{ContractRef, SdkConfig};
use crate::context::SdkContext;
use crate::core::connection::{call_contract, send_and_confirm, ChainConnection, TransactionRequest};
use crate::error::ErrorKind;
use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use biokey_interface::IWalletRegistry;
use futures::future::join_all;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSuccess {
    /// The registry already mapped the account to this owner; nothing was sent
    pub already_registered: bool,
    pub transaction_hash: Option<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub kind: ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEntry {
    pub contract: ContractRef,
    pub outcome: Result<RegistrationSuccess, RegistrationFailure>,
}

impl RegistrationEntry {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(|f| f.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub chain_id: u64,
    pub account: Address,
    pub owner: Address,
    pub entries: Vec<RegistrationEntry>,
}

impl RegistrationReport {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &RegistrationEntry> {
        self.entries.iter().filter(|e| !e.succeeded())
    }

    /// Enough registered to proceed: every required contract succeeded and at
    /// least one contract did. An empty target list is trivially usable.
    pub fn is_usable(&self) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        self.succeeded() > 0
            && self
                .entries
                .iter()
                .filter(|e| e.contract.required)
                .all(RegistrationEntry::succeeded)
    }

    /// True when every contract in `required` has a successful entry.
    pub fn satisfies(&self, required: &[Address]) -> bool {
        required.iter().all(|address| {
            self.entries
                .iter()
                .any(|e| e.contract.address == *address && e.succeeded())
        })
    }

    /// Replace entries with the outcome of a later attempt on the same contract.
    pub fn merge(&mut self, retry: RegistrationReport) {
        for update in retry.entries {
            match self
                .entries
                .iter_mut()
                .find(|e| e.contract.address == update.contract.address)
            {
                Some(entry) => *entry = update,
                None => self.entries.push(update),
            }
        }
    }
}

#[derive(Clone)]
pub struct Registrar {
    config: Arc<SdkConfig>,
    connection: Arc<dyn ChainConnection>,
}

impl Registrar {
    pub fn new(ctx: &SdkContext) -> Self {
        Self {
            config: ctx.config.clone(),
            connection: ctx.connection.clone(),
        }
    }

    /// Register `account` as acting for `owner` on every target.
    ///
    /// Attempts run concurrently and all of them finish; the report carries
    /// one entry per target in input order.
    pub async fn register_all(
        &self,
        chain_id: u64,
        account: Address,
        owner: Address,
        targets: &[ContractRef],
    ) -> RegistrationReport {
        let outcomes = join_all(
            targets
                .iter()
                .map(|contract| self.register_one(chain_id, account, owner, contract)),
        )
        .await;

        let entries = targets
            .iter()
            .cloned()
            .zip(outcomes)
            .map(|(contract, outcome)| RegistrationEntry { contract, outcome })
            .collect();

        let report = RegistrationReport {
            chain_id,
            account,
            owner,
            entries,
        };
        tracing::info!(
            chain_id,
            %account,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "wallet registration finished"
        );
        report
    }

    /// Re-attempt only the failed entries of `report`, returning the merged report.
    pub async fn retry_failed(&self, report: &RegistrationReport) -> RegistrationReport {
        let failed: Vec<ContractRef> = report.failures().map(|e| e.contract.clone()).collect();
        let mut merged = report.clone();
        if failed.is_empty() {
            return merged;
        }
        let retry = self
            .register_all(report.chain_id, report.account, report.owner, &failed)
            .await;
        merged.merge(retry);
        merged
    }

    /// Address the registry currently maps `account` to (zero when unmapped)
    pub async fn registered_user(
        &self,
        chain_id: u64,
        contract: Address,
        account: Address,
    ) -> Result<Address, String> {
        let call = IWalletRegistry::walletToUserCall { wallet: account };
        call_contract(self.connection.as_ref(), chain_id, contract, &call)
            .await
            .map(|ret| ret.user)
    }

    async fn register_one(
        &self,
        chain_id: u64,
        account: Address,
        owner: Address,
        contract: &ContractRef,
    ) -> Result<RegistrationSuccess, RegistrationFailure> {
        match self.registered_user(chain_id, contract.address, account).await {
            Ok(user) if user == owner => {
                tracing::debug!(contract = %contract.name, %account, "already registered");
                return Ok(RegistrationSuccess {
                    already_registered: true,
                    transaction_hash: None,
                });
            },
            Ok(_) => {},
            Err(e) => {
                tracing::debug!(contract = %contract.name, error = %e, "registration lookup failed; submitting anyway");
            },
        }

        let call = IWalletRegistry::registerWalletCall { wallet: account };
        let tx = TransactionRequest::new(chain_id, contract.address, call.abi_encode())
            .from_account(owner);

        let failure = |reason: String| {
            tracing::warn!(contract = %contract.name, address = %contract.address, %reason, "registration failed");
            RegistrationFailure {
                kind: ErrorKind::RegistrationFailed,
                reason,
            }
        };

        let receipt = send_and_confirm(
            self.connection.as_ref(),
            &tx,
            self.config.deployment_timeout(),
            self.config.poll_interval(),
        )
        .await
        .map_err(failure)?;

        if !receipt.success {
            return Err(failure(
                receipt
                    .revert_reason
                    .unwrap_or_else(|| "registerWallet reverted".into()),
            ));
        }

        tracing::info!(contract = %contract.name, %account, %owner, "wallet registered");
        Ok(RegistrationSuccess {
            already_registered: false,
            transaction_hash: Some(receipt.transaction_hash),
        })
    }
}
