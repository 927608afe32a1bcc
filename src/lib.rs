//! # dnsclaim
//!
//! Trustless DNS domain-ownership proof verification.
//!
//! A domain controller publishes a wallet-signed claim as a TXT record at
//! `aqua._<lookupKey>.<domain>`; this crate proves (or disproves) that
//! the controller of the DNS zone also controls the private key behind
//! the claimed wallet address — with no server-side trust.
//!
//! ## Pipeline
//!
//! One [`ClaimVerifier::verify`] call chains, fail-fast:
//! 1. DNS existence + DNSSEC status (DoH, plain-DNS fallback)
//! 2. Record format (current vs legacy schema)
//! 3. Field parsing
//! 4. Canonical message reconstruction
//! 5. Timestamp validity (clock-skew defense)
//! 6. Expiration validity
//! 7. EIP-191 signature recovery and signer comparison
//! 8. Domain-binding consistency
//!
//! Every run yields an ordered, severity-typed audit trail plus an
//! explicit verdict; no error ever crosses the `verify` boundary.
//! Attempts are rate limited per domain.

#![forbid(unsafe_code)]
#![deny(clippy::all, rust_2018_idioms)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    // Unix timestamps and day counts are bounded
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod config;
pub mod crypto;
pub mod pipeline;
pub mod ratelimit;
pub mod record;
pub mod report;
pub mod resolver;

pub use config::VerifierConfig;
pub use pipeline::{record_hostname, ClaimVerifier, VerifyFailure, TOTAL_TESTS};
pub use ratelimit::{MemoryRateLimitStore, RateLimitStore};
pub use record::{RecordFormat, WalletClaim};
pub use report::{LogEntry, LogLevel, VerificationReport};
pub use resolver::{DohResolver, SystemTxtResolver, TxtLookup, TxtResolver};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lookup key used by wallet-address claims
pub const DEFAULT_LOOKUP_KEY: &str = "wallet";
