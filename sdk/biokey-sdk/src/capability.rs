//! Capability detection
//!
//! Asks the host which user-verifying authenticator it has. Absence of support
//! is a normal outcome, reported as an unavailable [`Capability`], never as an
//! error. Nothing is cached: device configuration can change between sessions.

use crate::core::authenticator::{BiometricMethod, Platform, PlatformAuthenticator};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Snapshot of what the device can do, exposed to the application UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub is_available: bool,
    pub has_secure_enclave: bool,
    pub methods: BTreeSet<BiometricMethod>,
    pub platform: Platform,
    /// Why the capability is unavailable, when it is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Capability {
    pub fn unavailable(platform: Platform, reason: impl Into<String>) -> Self {
        Self {
            is_available: false,
            has_secure_enclave: false,
            methods: BTreeSet::new(),
            platform,
            reason: Some(reason.into()),
        }
    }

    /// The strongest biometric modality, for prompt copy ("Use Face ID")
    pub fn primary_method(&self) -> Option<BiometricMethod> {
        self.methods.iter().next().copied()
    }
}

#[derive(Clone)]
pub struct CapabilityDetector {
    authenticator: Arc<dyn PlatformAuthenticator>,
}

impl CapabilityDetector {
    pub fn new(authenticator: Arc<dyn PlatformAuthenticator>) -> Self {
        Self { authenticator }
    }

    pub async fn detect(&self) -> Capability {
        let probe = match self.authenticator.probe().await {
            Ok(probe) => probe,
            Err(e) => {
                tracing::info!(error = %e, "platform authenticator probe failed");
                return Capability::unavailable(Platform::Unknown, e.to_string());
            },
        };

        if !probe.has_secure_enclave {
            return Capability::unavailable(probe.platform, "no secure enclave on this device");
        }
        if !probe.user_verifying_available {
            return Capability {
                has_secure_enclave: true,
                ..Capability::unavailable(
                    probe.platform,
                    "no user-verifying authenticator is enrolled",
                )
            };
        }

        let mut methods = probe.methods;
        if methods.is_empty() {
            methods.insert(BiometricMethod::Generic);
        }

        let capability = Capability {
            is_available: true,
            has_secure_enclave: true,
            methods,
            platform: probe.platform,
            reason: None,
        };
        tracing::debug!(?capability, "platform capability detected");
        capability
    }
}
