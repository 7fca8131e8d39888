use super::state::{InvalidTransition, SetupEvent, SetupState, StateMachine};
use crate::account::{AddressDeriver, Deployer};
use crate::config::SdkConfig;
use crate::context::SdkContext;
use crate::enrollment::KeyEnrollment;
use crate::error::{ErrorKind, Result, SdkError};
use crate::registrar::{RegistrationReport, Registrar};
use crate::types::PublicKey;
use alloy_primitives::Address;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SetupOptions {
    pub user_identifier: String,
    pub display_name: String,
    pub chain_id: u64,
    /// Externally-owned address the smart account is registered against
    pub owner: Address,
    /// Ask the paymaster to cover the deployment fee. Registration is always
    /// sent from `owner`, which pays for it.
    pub sponsored: bool,
    /// Create a new device key even when one is already enrolled
    pub force_reenroll: bool,
}

impl SetupOptions {
    pub fn new(user_identifier: impl Into<String>, chain_id: u64, owner: Address) -> Self {
        let user_identifier = user_identifier.into();
        Self {
            display_name: user_identifier.clone(),
            user_identifier,
            chain_id,
            owner,
            sponsored: false,
            force_reenroll: false,
        }
    }

    pub fn sponsored(mut self, sponsored: bool) -> Self {
        self.sponsored = sponsored;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SetupOutcome {
    pub public_key: PublicKey,
    pub account: Address,
    pub deployed_now: bool,
    pub report: RegistrationReport,
}

/// Drives enrollment, address derivation, deployment and registration as
/// one observable flow.
pub struct SetupOrchestrator {
    machine: StateMachine,
    config: Arc<SdkConfig>,
    enrollment: KeyEnrollment,
    deriver: AddressDeriver,
    deployer: Deployer,
    registrar: Registrar,
    last_report: Mutex<Option<RegistrationReport>>,
    last_error: Mutex<Option<ErrorKind>>,
}

impl SetupOrchestrator {
    pub fn new(ctx: &SdkContext) -> Self {
        Self {
            machine: StateMachine::new(),
            config: ctx.config.clone(),
            enrollment: KeyEnrollment::new(ctx),
            deriver: AddressDeriver::new(ctx),
            deployer: Deployer::new(ctx),
            registrar: Registrar::new(ctx),
            last_report: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn current_state(&self) -> SetupState {
        self.machine.current_state()
    }

    pub fn progress_label(&self) -> &'static str {
        self.current_state().label()
    }

    pub fn subscribe(&self) -> watch::Receiver<SetupState> {
        self.machine.subscribe()
    }

    pub fn last_report(&self) -> Option<RegistrationReport> {
        lock(&self.last_report).clone()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        *lock(&self.last_error)
    }

    /// Run the whole setup flow.
    ///
    /// A dismissed biometric prompt or a cancelled `cancel` token returns the
    /// machine to `Idle`; any other error leaves it in `Failed`. Cancelling
    /// mid-deployment stops waiting but cannot recall a transaction already
    /// sent; a later run finds the deployed code and skips ahead.
    pub async fn run(
        &self,
        options: &SetupOptions,
        cancel: &CancellationToken,
    ) -> Result<SetupOutcome> {
        self.machine.transition(SetupEvent::Start)?;
        *lock(&self.last_error) = None;
        // A report only describes the run that produced it.
        *lock(&self.last_report) = None;

        match self.drive(options, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.settle(err)),
        }
    }

    /// Re-attempt the failed entries of the last registration report.
    ///
    /// Only the most recent run's report is eligible; a run that stopped
    /// before registering leaves nothing to retry.
    pub async fn retry_registration(&self, cancel: &CancellationToken) -> Result<RegistrationReport> {
        let Some(previous) = self.last_report() else {
            return Err(InvalidTransition {
                from: self.current_state(),
                event: SetupEvent::RetryRegistration,
            }
            .into());
        };
        self.machine.transition(SetupEvent::RetryRegistration)?;

        let report = match step(cancel, async { Ok(self.registrar.retry_failed(&previous).await) }).await
        {
            Ok(report) => report,
            Err(err) => return Err(self.settle(err)),
        };
        self.finish_registration(report)
            .map_err(|err| self.settle(err))
    }

    async fn drive(&self, options: &SetupOptions, cancel: &CancellationToken) -> Result<SetupOutcome> {
        let chain_id = options.chain_id;
        // Fail before prompting when the chain cannot be served.
        self.deriver.factory(chain_id)?;

        let public_key = step(cancel, self.obtain_key(options)).await?;
        let account = step(cancel, self.deriver.compute_address(&public_key, chain_id)).await?;
        self.machine.transition(SetupEvent::AddressComputed)?;
        tracing::info!(chain_id, %account, "smart account address computed");

        let deployed = step(cancel, self.deployer.is_deployed(account, chain_id))
            .await
            .map_err(|e| match e {
                SdkError::Connection(reason) => SdkError::DeploymentFailed(reason),
                other => other,
            })?;

        let deployed_now = if deployed {
            self.machine.transition(SetupEvent::AlreadyDeployed)?;
            false
        } else {
            self.machine.transition(SetupEvent::DeploymentStarted)?;
            let address = step(
                cancel,
                self.deployer.deploy(&public_key, chain_id, options.sponsored),
            )
            .await?;
            if address != account {
                return Err(SdkError::DeploymentFailed(format!(
                    "factory deployed {address}, expected {account}"
                )));
            }
            self.machine.transition(SetupEvent::DeploymentConfirmed)?;
            true
        };

        let targets = self.config.contracts(chain_id)?;
        let report = step(cancel, async {
            Ok(self
                .registrar
                .register_all(chain_id, account, options.owner, targets)
                .await)
        })
        .await?;
        let report = self.finish_registration(report)?;

        Ok(SetupOutcome {
            public_key,
            account,
            deployed_now,
            report,
        })
    }

    /// Reuse the enrolled key unless a fresh one was asked for; a new key
    /// derives a different account.
    async fn obtain_key(&self, options: &SetupOptions) -> Result<PublicKey> {
        if !options.force_reenroll {
            if let Some(record) = self.enrollment.current().await? {
                tracing::info!(key = %record.public_key, "reusing enrolled device key");
                return Ok(record.public_key);
            }
        }
        self.enrollment
            .enroll(&options.user_identifier, &options.display_name)
            .await
    }

    fn finish_registration(&self, report: RegistrationReport) -> Result<RegistrationReport> {
        *lock(&self.last_report) = Some(report.clone());

        if !report.is_usable() {
            return Err(SdkError::PartialRegistrationFailure(report));
        }
        for entry in report.failures() {
            tracing::warn!(
                contract = %entry.contract.name,
                address = %entry.contract.address,
                error = ?entry.error(),
                "optional contract registration failed"
            );
        }
        self.machine.transition(SetupEvent::RegistrationSucceeded)?;
        Ok(report)
    }

    fn settle(&self, err: SdkError) -> SdkError {
        let event = match err {
            SdkError::UserCancelled | SdkError::Cancelled => SetupEvent::Cancel,
            // Out-of-order driving never moved the machine
            SdkError::InvalidTransition(_) => return err,
            _ => SetupEvent::FatalError,
        };
        if let Err(invalid) = self.machine.transition(event) {
            tracing::error!(error = %invalid, "could not settle setup state");
        }
        *lock(&self.last_error) = Some(err.kind());
        tracing::warn!(error = %err, state = ?self.current_state(), "setup stopped");
        err
    }
}

async fn step<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SdkError::Cancelled),
        result = fut => result,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
