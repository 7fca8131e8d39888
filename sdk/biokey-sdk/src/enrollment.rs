use crate::capability::CapabilityDetector;
use crate::context::SdkContext;
use crate::core::authenticator::{CredentialCreation, PlatformAuthenticator};
use crate::error::{Result, SdkError};
use crate::store::CredentialStore;
use crate::types::{CredentialRecord, PublicKey};
use std::sync::Arc;

/// Creates the device key inside the platform authenticator and records its
/// public half.
#[derive(Clone)]
pub struct KeyEnrollment {
    detector: CapabilityDetector,
    authenticator: Arc<dyn PlatformAuthenticator>,
    store: Arc<dyn CredentialStore>,
    relying_party_id: String,
    relying_party_name: String,
}

impl KeyEnrollment {
    pub fn new(ctx: &SdkContext) -> Self {
        Self {
            detector: CapabilityDetector::new(ctx.authenticator.clone()),
            authenticator: ctx.authenticator.clone(),
            store: ctx.store.clone(),
            relying_party_id: ctx.config.relying_party.id.clone(),
            relying_party_name: ctx.config.relying_party.name.clone(),
        }
    }

    /// Generate a new key pair and persist its record.
    ///
    /// The capability check runs first, so an unsupported device fails with
    /// `CapabilityUnavailable` without ever showing a prompt. Enrolling over an
    /// existing record replaces it; registrations made with the old key are
    /// left pointing at an account this device can no longer sign for.
    pub async fn enroll(&self, user_identifier: &str, display_name: &str) -> Result<PublicKey> {
        let capability = self.detector.detect().await;
        if !capability.is_available {
            return Err(SdkError::CapabilityUnavailable(
                capability
                    .reason
                    .unwrap_or_else(|| "platform authenticator unavailable".into()),
            ));
        }

        let options = CredentialCreation {
            relying_party_id: self.relying_party_id.clone(),
            relying_party_name: self.relying_party_name.clone(),
            user_id: user_identifier.as_bytes().to_vec(),
            user_display_name: display_name.to_string(),
            challenge: rand::random(),
        };

        tracing::info!(user = user_identifier, "requesting new platform credential");
        let credential = self.authenticator.create_credential(&options).await?;
        if credential.credential_id.is_empty() {
            return Err(SdkError::PlatformError(
                "authenticator returned an empty credential id".into(),
            ));
        }
        let public_key = PublicKey::from_sec1(&credential.public_key_sec1)?;

        if let Some(previous) = self.store.get().await? {
            if previous.public_key != public_key {
                tracing::warn!(
                    old_key = %previous.public_key,
                    new_key = %public_key,
                    "re-enrolling replaces the device key; registrations made with the old key are orphaned"
                );
            }
        }

        self.store
            .set(&CredentialRecord::new(credential.credential_id, public_key))
            .await?;
        tracing::info!(key = %public_key, "platform credential enrolled");
        Ok(public_key)
    }

    /// Stored record, if any
    pub async fn current(&self) -> Result<Option<CredentialRecord>> {
        self.store.get().await
    }

    /// Forget the device credential (user-initiated disable).
    pub async fn disable(&self) -> Result<()> {
        tracing::info!("clearing enrolled credential");
        self.store.clear().await
    }
}
