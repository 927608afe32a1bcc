//! EIP-191 personal-message signature recovery.
//!
//! Wallets sign DNS claims with `personal_sign` (EIP-191 version 0x45):
//! the message is prefixed with `"\x19Ethereum Signed Message:\n" + len`,
//! Keccak-256 hashed, then ECDSA-signed over secp256k1. Recovery inverts
//! that: given the message and a 65-byte `r || s || v` signature, derive
//! the 20-byte address that produced it.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use sha3::{Digest, Keccak256};

use super::{CryptoError, CryptoResult};

/// Recoverable ECDSA signature size in bytes (`r || s || v`)
pub const SIGNATURE_SIZE: usize = 65;

/// Keccak-256 digest of a message under the EIP-191 personal-sign prefix.
///
/// The prefix length is the byte length of the message, matching what
/// `personal_sign` wallets hash. Returned as an unfinalized digest so it
/// can feed `k256` recovery directly.
#[must_use]
pub fn personal_message_digest(message: &str) -> Keccak256 {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher
}

/// Recover the signing address from a personal-signed message.
///
/// `signature_hex` is the hex encoding of `r || s || v` (65 bytes), with
/// or without a `0x` prefix; `v` may be `0`/`1` or the legacy `27`/`28`.
/// The returned address is `0x`-prefixed lowercase hex. The caller
/// performs any comparison against a claimed address.
///
/// # Errors
/// Returns [`CryptoError`] when the signature cannot be decoded or no
/// public key can be recovered from it.
pub fn recover_signer(message: &str, signature_hex: &str) -> CryptoResult<String> {
    let hex_body = signature_hex
        .strip_prefix("0x")
        .or_else(|| signature_hex.strip_prefix("0X"))
        .unwrap_or(signature_hex);
    let bytes = hex::decode(hex_body)
        .map_err(|e| CryptoError::InvalidEncoding(format!("bad hex: {e}")))?;
    if bytes.len() != SIGNATURE_SIZE {
        return Err(CryptoError::InvalidEncoding(format!(
            "expected {} bytes, got {}",
            SIGNATURE_SIZE,
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        v @ 0..=1 => v,
        v @ 27..=28 => v - 27,
        v => {
            return Err(CryptoError::InvalidEncoding(format!(
                "unsupported recovery id {v}"
            )))
        }
    };
    let mut recovery_id = RecoveryId::from_byte(v).ok_or(CryptoError::RecoveryFailed)?;

    let mut signature = EcdsaSignature::from_slice(&bytes[..64])
        .map_err(|e| CryptoError::InvalidEncoding(format!("bad r/s: {e}")))?;
    // Wallets may emit high-s signatures; k256 recovery requires low-s.
    // Replacing s with n - s flips the parity of the recovered point's
    // y coordinate, so the recovery id must flip with it.
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id =
            RecoveryId::from_byte(recovery_id.to_byte() ^ 1).ok_or(CryptoError::RecoveryFailed)?;
    }

    let verifying_key = VerifyingKey::recover_from_digest(
        personal_message_digest(message),
        &signature,
        recovery_id,
    )
    .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_verifying_key(&verifying_key))
}

/// Derive the Ethereum address for a secp256k1 public key:
/// the last 20 bytes of the Keccak-256 of the uncompressed point
/// (SEC1 prefix byte excluded), as `0x`-prefixed lowercase hex.
#[must_use]
pub fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}
