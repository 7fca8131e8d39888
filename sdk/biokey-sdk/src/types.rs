use crate::error::{Result, SdkError};
use alloy_primitives::{keccak256, B256, U256};
use borsh::{BorshDeserialize, BorshSerialize};
use p256::ecdsa::VerifyingKey;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{EncodedPoint, FieldBytes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

/// Affine coordinates of an enrolled secp256r1 public key.
///
/// Constructed only through validating constructors, so every value is a
/// point on the P-256 curve. Borsh and serde decoding check the point too.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, Serialize, Deserialize)]
#[serde(try_from = "Coordinates")]
pub struct PublicKey {
    x: [u8; 32],
    y: [u8; 32],
}

#[derive(Deserialize)]
struct Coordinates {
    x: [u8; 32],
    y: [u8; 32],
}

impl TryFrom<Coordinates> for PublicKey {
    type Error = SdkError;

    fn try_from(raw: Coordinates) -> Result<Self> {
        Self::from_coordinates(raw.x, raw.y)
    }
}

impl BorshDeserialize for PublicKey {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let x = <[u8; 32]>::deserialize_reader(reader)?;
        let y = <[u8; 32]>::deserialize_reader(reader)?;
        Self::from_coordinates(x, y)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}

impl PublicKey {
    /// Parse a SEC1-encoded point (uncompressed or compressed)
    pub fn from_sec1(bytes: &[u8]) -> Result<Self> {
        let key = p256::PublicKey::from_sec1_bytes(bytes).map_err(|_| {
            SdkError::PlatformError("authenticator returned an invalid P-256 public key".into())
        })?;
        let point = key.to_encoded_point(false);
        match (point.x(), point.y()) {
            (Some(x), Some(y)) => {
                let mut out = Self {
                    x: [0u8; 32],
                    y: [0u8; 32],
                };
                out.x.copy_from_slice(x);
                out.y.copy_from_slice(y);
                Ok(out)
            },
            _ => Err(SdkError::PlatformError(
                "authenticator returned the identity point".into(),
            )),
        }
    }

    /// Build from raw big-endian coordinates, checking the point is on the curve
    pub fn from_coordinates(x: [u8; 32], y: [u8; 32]) -> Result<Self> {
        let point = EncodedPoint::from_affine_coordinates(
            &FieldBytes::from(x),
            &FieldBytes::from(y),
            false,
        );
        let valid: Option<p256::PublicKey> = p256::PublicKey::from_encoded_point(&point).into();
        match valid {
            Some(_) => Ok(Self { x, y }),
            None => Err(SdkError::PlatformError(
                "coordinates are not a point on P-256".into(),
            )),
        }
    }

    pub fn x(&self) -> B256 {
        B256::from(self.x)
    }

    pub fn y(&self) -> B256 {
        B256::from(self.y)
    }

    /// X coordinate as the `uint256` the contracts take
    pub fn x_word(&self) -> U256 {
        U256::from_be_bytes(self.x)
    }

    /// Y coordinate as the `uint256` the contracts take
    pub fn y_word(&self) -> U256 {
        U256::from_be_bytes(self.y)
    }

    /// `keccak256(x || y)`, the key identifier used by `getNonce`
    pub fn key_hash(&self) -> B256 {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&self.x);
        buf[32..].copy_from_slice(&self.y);
        keccak256(buf)
    }

    /// Uncompressed SEC1 encoding (`0x04 || x || y`)
    pub fn to_sec1_uncompressed(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&self.x);
        out[33..].copy_from_slice(&self.y);
        out
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_sec1_bytes(&self.to_sec1_uncompressed())
            .map_err(|e| SdkError::PlatformError(format!("stored public key is invalid: {e}")))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(0x{}..)", hex::encode(&self.x[..8]))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.x))
    }
}

/// Everything persisted about the device credential.
///
/// `credential_id` is the authenticator's opaque handle, never key material.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CredentialRecord {
    pub credential_id: Vec<u8>,
    pub public_key: PublicKey,
    /// Unix time in milliseconds
    pub created_at: u64,
}

impl CredentialRecord {
    pub fn new(credential_id: Vec<u8>, public_key: PublicKey) -> Self {
        Self {
            credential_id,
            public_key,
            created_at: unix_millis(),
        }
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
