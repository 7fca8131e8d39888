use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SetupState {
    Idle,
    Enrolling,
    AddressComputed,
    Deploying,
    Registering,
    Ready,
    Failed,
}

impl SetupState {
    /// Progress text for the UI
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Not set up",
            Self::Enrolling => "Waiting for biometric confirmation",
            Self::AddressComputed => "Smart account address ready",
            Self::Deploying => "Deploying smart account",
            Self::Registering => "Linking smart account to your wallet",
            Self::Ready => "Biometric signing ready",
            Self::Failed => "Setup failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    fn in_progress(&self) -> bool {
        matches!(
            self,
            Self::Enrolling | Self::AddressComputed | Self::Deploying | Self::Registering
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupEvent {
    Start,
    /// Key available and its account address computed
    AddressComputed,
    AlreadyDeployed,
    DeploymentStarted,
    DeploymentConfirmed,
    /// Registration met the ready policy
    RegistrationSucceeded,
    /// Re-attempt failed registrations of a finished setup
    RetryRegistration,
    FatalError,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid setup transition from {from:?} on {event:?}")]
pub struct InvalidTransition {
    pub from: SetupState,
    pub event: SetupEvent,
}

/// Pure transition table
pub fn next_state(from: SetupState, event: SetupEvent) -> Option<SetupState> {
    use SetupEvent as E;
    use SetupState as S;

    match (from, event) {
        (S::Idle | S::Failed, E::Start) => Some(S::Enrolling),
        (S::Enrolling, E::AddressComputed) => Some(S::AddressComputed),
        (S::AddressComputed, E::AlreadyDeployed) => Some(S::Registering),
        (S::AddressComputed, E::DeploymentStarted) => Some(S::Deploying),
        (S::Deploying, E::DeploymentConfirmed) => Some(S::Registering),
        (S::Registering, E::RegistrationSucceeded) => Some(S::Ready),
        (S::Ready | S::Failed, E::RetryRegistration) => Some(S::Registering),
        (s, E::FatalError) if s.in_progress() => Some(S::Failed),
        (s, E::Cancel) if s.in_progress() || s == S::Idle => Some(S::Idle),
        _ => None,
    }
}

/// Observable setup state, decoupled from any UI framework.
///
/// Observers either poll [`StateMachine::current_state`] or hold a
/// [`watch::Receiver`] from [`StateMachine::subscribe`].
pub struct StateMachine {
    state: watch::Sender<SetupState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SetupState::Idle);
        Self { state }
    }

    pub fn current_state(&self) -> SetupState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SetupState> {
        self.state.subscribe()
    }

    pub fn transition(&self, event: SetupEvent) -> Result<SetupState, InvalidTransition> {
        let from = self.current_state();
        let to = next_state(from, event).ok_or(InvalidTransition { from, event })?;
        self.state.send_replace(to);
        tracing::info!(?from, ?to, ?event, "setup state changed");
        Ok(to)
    }
}
