//! Token metadata as fetched from IPFS.
//!
//! Parsing is strict: unknown top-level fields, attribute values that are
//! not text, number or boolean, and image URIs outside `ipfs://` and
//! `https://` are rejected instead of being coerced.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Malformed metadata: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported image URI scheme: {0}")]
    UnsupportedImageUri(String),

    #[error("Empty IPFS path in {0}")]
    EmptyIpfsPath(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub image: String,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Attribute {
    pub trait_type: String,
    pub value: AttributeValue,
    #[serde(default)]
    pub display_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl TokenMetadata {
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let metadata: Self = serde_json::from_str(json)?;
        check_image_uri(&metadata.image)?;
        Ok(metadata)
    }

    /// HTTP URL for the image, rewriting `ipfs://` through `gateway`.
    pub fn image_url(&self, gateway: &str) -> Result<String, MetadataError> {
        resolve_uri(&self.image, gateway)
    }

    pub fn attribute(&self, trait_type: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.trait_type == trait_type)
            .map(|a| &a.value)
    }
}

fn check_image_uri(uri: &str) -> Result<(), MetadataError> {
    if uri.starts_with("https://") {
        return Ok(());
    }
    match uri.strip_prefix("ipfs://") {
        Some(path) if path.trim_start_matches("ipfs/").is_empty() => {
            Err(MetadataError::EmptyIpfsPath(uri.to_string()))
        },
        Some(_) => Ok(()),
        None => Err(MetadataError::UnsupportedImageUri(uri.to_string())),
    }
}

/// Resolve an `ipfs://` or `https://` URI to a fetchable URL.
pub fn resolve_uri(uri: &str, gateway: &str) -> Result<String, MetadataError> {
    check_image_uri(uri)?;
    match uri.strip_prefix("ipfs://") {
        Some(path) => {
            let path = path.trim_start_matches("ipfs/");
            Ok(format!("{}/{}", gateway.trim_end_matches('/'), path))
        },
        None => Ok(uri.to_string()),
    }
}
