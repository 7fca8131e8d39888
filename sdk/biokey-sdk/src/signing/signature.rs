use crate::error::{Result, SdkError};
use p256::ecdsa::Signature;

const DER_SEQUENCE_TAG: u8 = 0x30;
const RAW_SIGNATURE_LEN: usize = 64;

/// Coerce an authenticator signature blob into a fixed-width P-256 signature.
///
/// Accepts DER (what WebAuthn and the Secure Enclave emit) and raw `r || s`.
/// Anything else is rejected rather than padded or truncated. `s` is folded
/// into the lower half of the curve order.
pub fn coerce_signature(blob: &[u8]) -> Result<Signature> {
    let signature = if blob.first() == Some(&DER_SEQUENCE_TAG) {
        match Signature::from_der(blob) {
            Ok(signature) => signature,
            Err(_) if blob.len() == RAW_SIGNATURE_LEN => from_raw(blob)?,
            Err(e) => {
                return Err(SdkError::SignatureFormatInvalid(format!(
                    "malformed DER signature: {e}"
                )))
            },
        }
    } else if blob.len() == RAW_SIGNATURE_LEN {
        from_raw(blob)?
    } else {
        return Err(SdkError::SignatureFormatInvalid(format!(
            "unexpected {}-byte signature",
            blob.len()
        )));
    };

    Ok(signature.normalize_s().unwrap_or(signature))
}

fn from_raw(blob: &[u8]) -> Result<Signature> {
    Signature::from_slice(blob).map_err(|e| {
        SdkError::SignatureFormatInvalid(format!("raw signature out of range: {e}"))
    })
}

/// Big-endian `(r, s)`, each exactly 32 bytes
pub fn split_components(signature: &Signature) -> ([u8; 32], [u8; 32]) {
    let (r_bytes, s_bytes) = signature.split_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&r_bytes);
    s.copy_from_slice(&s_bytes);
    (r, s)
}
