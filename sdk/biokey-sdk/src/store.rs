//! Credential persistence
//!
//! Holds the credential handle and public-key coordinates produced at
//! enrollment. An empty store answers `Ok(None)`; only genuine I/O or
//! corruption is an error.

use crate::core::constants::{CREDENTIAL_FILE_EXTENSION, CREDENTIAL_FORMAT_VERSION};
use crate::error::{Result, SdkError};
use crate::types::CredentialRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing is enrolled on this device
    async fn get(&self) -> Result<Option<CredentialRecord>>;

    /// Replace the stored record. Last write wins.
    async fn set(&self, record: &CredentialRecord) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Store that lives for the process only.
#[derive(Default)]
pub struct MemoryCredentialStore {
    record: RwLock<Option<CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<CredentialRecord>> {
        Ok(self.record.read().await.clone())
    }

    async fn set(&self, record: &CredentialRecord) -> Result<()> {
        *self.record.write().await = Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.record.write().await = None;
        Ok(())
    }
}

/// Durable store scoped to one relying-party origin.
///
/// The record is a version byte followed by its borsh encoding, written to
/// `<dir>/<origin>.credential` through a temporary file and a rename.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl AsRef<Path>, origin: &str) -> Self {
        let file_name = format!("{}.{}", sanitize_origin(origin), CREDENTIAL_FILE_EXTENSION);
        Self {
            path: dir.as_ref().join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sanitize_origin(origin: &str) -> String {
    origin
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' => c,
            _ => '_',
        })
        .collect()
}

fn storage_error(context: &str, e: impl std::fmt::Display) -> SdkError {
    SdkError::PlatformError(format!("credential store {context}: {e}"))
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Option<CredentialRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("read failed", e)),
        };

        match bytes.split_first() {
            Some((&CREDENTIAL_FORMAT_VERSION, body)) => borsh::from_slice(body)
                .map(Some)
                .map_err(|e| storage_error("record is corrupt", e)),
            Some((version, _)) => Err(storage_error(
                "unsupported record version",
                version,
            )),
            None => Err(storage_error("record is corrupt", "empty file")),
        }
    }

    async fn set(&self, record: &CredentialRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create dir failed", e))?;
        }

        let mut bytes = vec![CREDENTIAL_FORMAT_VERSION];
        bytes.extend(borsh::to_vec(record).map_err(|e| storage_error("encode failed", e))?);

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| storage_error("write failed", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error("rename failed", e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove failed", e)),
        }
    }
}
