//! Cryptographic primitives for DNS claim verification.
//!
//! - EIP-191 personal-message signature recovery (secp256k1 via `k256`)
//! - Keccak-256 address derivation (`sha3`)
//!
//! Signature creation lives wallet-side and is out of scope here; this
//! module only recovers the signing address from a published claim.

mod eip191;

pub use eip191::{
    address_from_verifying_key, personal_message_digest, recover_signer, SIGNATURE_SIZE,
};

#[cfg(test)]
pub(crate) use eip191::testutil;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature bytes could not be decoded (bad hex, wrong length,
    /// unsupported recovery id)
    #[error("invalid signature encoding: {0}")]
    InvalidEncoding(String),
    /// Signature decoded but no public key could be recovered
    #[error("signature recovery failed")]
    RecoveryFailed,
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
