//! The 8-step claim validation pipeline.
//!
//! One call to [`ClaimVerifier::verify`] runs a strictly ordered,
//! fail-fast sequence: rate-limit gate, DNS resolution, record selection,
//! field parsing, message reconstruction, timestamp and expiration
//! windows, EIP-191 signature recovery, and a final domain-binding check.
//! Each step either appends `success`/`info` entries to the audit trail
//! and falls through, or appends an `error` entry and halts the run.
//!
//! No failure ever crosses the `verify` boundary as an `Err` — the trail
//! plus the explicit verdict in [`VerificationReport`] is the complete
//! diagnostic record, which makes the pipeline safe to call straight from
//! UI code.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::VerifierConfig;
use crate::crypto::{self, CryptoError};
use crate::ratelimit::{MemoryRateLimitStore, RateLimitStore};
use crate::record::{
    canonical_message, parse_record, select_record, RecordError, RecordFormat, WalletClaim,
};
use crate::report::{Trail, VerificationReport};
use crate::resolver::{DohResolver, ResolverError, SystemTxtResolver, TxtLookup, TxtResolver};

/// Fixed number of verification steps per run. Runs halted early (or
/// rate-limited before step 1) still report out of this total so pass
/// rates stay comparable across failure points.
pub const TOTAL_TESTS: u32 = 8;

const RECORD_PREVIEW_CHARS: usize = 80;
const SIG_PREVIEW_CHARS: usize = 20;
const SECS_PER_DAY: i64 = 86_400;

/// Everything that can halt a verification run. Never returned to the
/// caller — each kind is converted into a terminal `error` trail entry at
/// its origin. Kept as a typed enum for tracing and for component tests.
#[derive(Debug, Error)]
pub enum VerifyFailure {
    /// Attempt denied before any step ran
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    /// DNS resolution failed on both the DoH and fallback paths
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    /// No TXT record at the queried name matched either claim schema
    #[error("no matching claim record")]
    NoMatchingRecord,
    /// Record matched but required fields were empty after parsing
    #[error("missing fields: {0}")]
    MissingFields(String),
    /// Timestamp is not a positive integer
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    /// Timestamp beyond the forward-clock tolerance
    #[error("timestamp is in the future")]
    FutureTimestamp,
    /// Expiration is not a positive integer
    #[error("invalid expiration: {0:?}")]
    InvalidExpiration(String),
    /// Expiration not after the creation timestamp
    #[error("expiration predates creation")]
    BackdatedExpiration,
    /// Claim expiry has passed
    #[error("signature has expired")]
    ExpiredSignature,
    /// Signature bytes were malformed or recovery failed
    #[error(transparent)]
    Signature(#[from] CryptoError),
    /// Recovered signer differs from the claimed wallet
    #[error("recovered signer {recovered} does not match claimed wallet {claimed}")]
    SignerMismatch {
        /// Wallet address the record claims
        claimed: String,
        /// Address actually recovered from the signature
        recovered: String,
    },
    /// Signed message does not have the part count its format implies
    #[error("signed message has {found} parts, expected {expected}")]
    MessageShapeMismatch {
        /// Parts implied by the record format
        expected: usize,
        /// Parts actually found
        found: usize,
    },
    /// Domain inside the signed message differs from the queried domain
    #[error("signed domain {signed} does not match queried domain {queried}")]
    DomainMismatch {
        /// Domain the caller asked about
        queried: String,
        /// Domain embedded in the signed message
        signed: String,
    },
}

impl From<RecordError> for VerifyFailure {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NoMatchingRecord => Self::NoMatchingRecord,
            RecordError::MissingFields(fields) => Self::MissingFields(fields),
        }
    }
}

/// A step either falls through (`Ok`) with its facts logged, or halts the
/// run (`Err`) with its error logged.
type StepOutcome<T = ()> = Result<T, VerifyFailure>;

/// The hostname holding the claim TXT record for a domain/lookup-key pair.
#[must_use]
pub fn record_hostname(domain: &str, lookup_key: &str) -> String {
    format!("aqua._{lookup_key}.{domain}")
}

/// Mutable state of one verification run: trail, counters, and the names
/// every step logs against.
struct Run<'a> {
    domain: &'a str,
    record_name: String,
    trail: Trail,
    tests_passed: u32,
}

impl<'a> Run<'a> {
    fn new(domain: &'a str, lookup_key: &str) -> Self {
        Self {
            domain,
            record_name: record_hostname(domain, lookup_key),
            trail: Trail::new(),
            tests_passed: 0,
        }
    }

    fn pass(&mut self) {
        self.tests_passed += 1;
    }

    fn into_report(self) -> VerificationReport {
        let tests_passed = self.tests_passed;
        VerificationReport {
            tests_passed,
            total_tests: TOTAL_TESTS,
            success: tests_passed == TOTAL_TESTS,
            logs: self.trail.into_entries(),
        }
    }
}

/// Verifies wallet-ownership claims published in DNS.
///
/// Holds the resolver seam, the rate-limit gate, and the tunables; one
/// instance serves any number of concurrent `verify` calls.
pub struct ClaimVerifier {
    resolver: Arc<dyn TxtResolver>,
    fallback: Option<Arc<dyn TxtResolver>>,
    rate_limiter: Arc<dyn RateLimitStore>,
    config: VerifierConfig,
}

impl ClaimVerifier {
    /// Build a verifier from config: DoH primary, system-DNS fallback,
    /// in-memory rate limiting.
    ///
    /// # Errors
    /// Returns [`ResolverError`] when the DoH client cannot be built.
    pub fn new(config: VerifierConfig) -> Result<Self, ResolverError> {
        let resolver = Arc::new(DohResolver::new(
            config.doh_endpoint.clone(),
            config.doh_timeout(),
        )?);
        let rate_limiter = Arc::new(MemoryRateLimitStore::new(
            config.rate_limit_max,
            config.rate_limit_window(),
        ));
        Ok(Self {
            resolver,
            fallback: Some(Arc::new(SystemTxtResolver)),
            rate_limiter,
            config,
        })
    }

    /// Build a verifier from explicit parts. This is the injection seam:
    /// tests pass canned resolvers and tight rate limits here.
    #[must_use]
    pub fn with_parts(
        resolver: Arc<dyn TxtResolver>,
        fallback: Option<Arc<dyn TxtResolver>>,
        rate_limiter: Arc<dyn RateLimitStore>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            resolver,
            fallback,
            rate_limiter,
            config,
        }
    }

    /// Run the full pipeline for `domain`, reading the claim from
    /// `aqua._<lookup_key>.<domain>`.
    ///
    /// Always returns a report; failures surface as `error` trail entries
    /// and a false `success`, never as a Rust error.
    pub async fn verify(&self, domain: &str, lookup_key: &str) -> VerificationReport {
        let mut run = Run::new(domain, lookup_key);

        if !self.rate_limiter.allow(domain) {
            warn!(domain, failure = %VerifyFailure::RateLimitExceeded, "verification denied");
            run.trail.error(format!(
                "Rate limit exceeded. Please try again later. Maximum {} verifications per minute per domain.",
                self.config.rate_limit_max
            ));
            return run.into_report();
        }

        run.trail
            .info(format!("Starting verification tests for domain {domain}"));

        match self.run_steps(&mut run).await {
            Ok(summary) => {
                run.trail.success(format!(
                    "VERIFICATION COMPLETE: {}/{} tests passed",
                    run.tests_passed, TOTAL_TESTS
                ));
                run.trail
                    .success("All verification tests passed successfully");
                run.trail.success(format!(
                    "Wallet {} is cryptographically linked to domain {}",
                    summary.wallet, domain
                ));
                run.trail
                    .info(format!("Valid until: {}", format_unix(summary.expiration)));
                if !summary.dnssec_validated {
                    run.trail
                        .warning("Note: DNSSEC was not validated for this query");
                }
            }
            Err(failure) => {
                debug!(domain, %failure, "verification halted");
                run.trail.error(format!(
                    "VERIFICATION FAILED: {}/{} tests passed",
                    run.tests_passed, TOTAL_TESTS
                ));
            }
        }

        run.into_report()
    }

    /// The ordered step runner. Data flows forward only; the first `Err`
    /// halts everything downstream.
    async fn run_steps(&self, run: &mut Run<'_>) -> StepOutcome<RunSummary> {
        let lookup = self.step_dns_existence(run).await?;
        let (record, format) = self.step_record_format(run, &lookup.records)?;
        let claim = self.step_field_parsing(run, &record, format)?;
        let message = self.step_message_reconstruction(run, &claim, format);
        let timestamp = self.step_timestamp_validity(run, &claim)?;
        let expiration = self.step_expiration_validity(run, &claim, timestamp)?;
        self.step_signature_verification(run, &message, &claim)?;
        self.step_domain_consistency(run, &message, format)?;

        Ok(RunSummary {
            wallet: claim.wallet,
            expiration,
            dnssec_validated: lookup.dnssec_validated,
        })
    }

    /// Step 1: the record name resolves, with DNSSEC status surfaced.
    /// A DoH failure downgrades to the plain fallback resolver (logged as
    /// a warning, never silently); only both paths failing halts the run.
    async fn step_dns_existence(&self, run: &mut Run<'_>) -> StepOutcome<TxtLookup> {
        run.trail
            .info("Test 1/8: DNS Record Existence & DNSSEC Validation");
        run.trail.info(format!("Querying: {}", run.record_name));

        let lookup = match self.resolver.resolve_txt(&run.record_name).await {
            Ok(lookup) => lookup,
            Err(primary_err) => {
                warn!(error = %primary_err, record_name = %run.record_name, "doh resolution failed");
                let fallback = match &self.fallback {
                    Some(fallback) => {
                        run.trail.warning(
                            "DNSSEC validation not available, falling back to standard DNS",
                        );
                        fallback.resolve_txt(&run.record_name).await
                    }
                    None => Err(primary_err),
                };
                match fallback {
                    Ok(mut lookup) => {
                        // The fallback path carries no DNSSEC claim
                        lookup.dnssec_validated = false;
                        lookup
                    }
                    Err(err) => {
                        run.trail.error("FAIL: DNS lookup error");
                        run.trail.info(format!("Error: {err}"));
                        return Err(VerifyFailure::Resolver(err));
                    }
                }
            }
        };

        run.trail.success(format!(
            "PASS: Found {} TXT record(s)",
            lookup.records.len()
        ));
        if lookup.dnssec_validated {
            run.trail.success("DNSSEC: validated");
        } else {
            run.trail
                .warning("DNSSEC: not validated (DNS responses may be spoofed)");
        }
        run.pass();
        Ok(lookup)
    }

    /// Step 2: one of the TXT records matches the claim schema, current
    /// format preferred over legacy.
    fn step_record_format(
        &self,
        run: &mut Run<'_>,
        records: &[String],
    ) -> StepOutcome<(String, RecordFormat)> {
        run.trail.info("Test 2/8: Wallet Record Format");

        match select_record(records) {
            Ok((record, format)) => {
                if format == RecordFormat::Legacy {
                    run.trail
                        .warning("Legacy format detected (no expiration field)");
                    run.trail
                        .info("Please regenerate your signature for enhanced security");
                }
                run.trail.success("PASS: Valid wallet record format found");
                run.trail
                    .info(format!("Record: {}", preview(record, RECORD_PREVIEW_CHARS)));
                run.pass();
                Ok((record.to_string(), format))
            }
            Err(err) => {
                run.trail
                    .error("FAIL: No wallet record with required format found");
                run.trail
                    .info("Expected: wallet=...&timestamp=...&expiration=...&sig=...");
                run.trail.info(format!("Found: {}", records.join(", ")));
                Err(err.into())
            }
        }
    }

    /// Step 3: all four claim fields are present; legacy records get
    /// their synthesized validity window here.
    fn step_field_parsing(
        &self,
        run: &mut Run<'_>,
        record: &str,
        format: RecordFormat,
    ) -> StepOutcome<WalletClaim> {
        run.trail.info("Test 3/8: Field Parsing");

        if format == RecordFormat::Legacy {
            run.trail.info(format!(
                "Legacy format: using default {}-day expiration",
                self.config.legacy_validity_days
            ));
        }

        match parse_record(record, format, self.config.legacy_validity_secs()) {
            Ok(claim) => {
                run.trail
                    .success("PASS: All required fields parsed successfully");
                run.trail.info(format!("Wallet: {}", claim.wallet));
                run.trail.info(format!("Timestamp: {}", claim.timestamp));
                run.trail.info(format!("Expiration: {}", claim.expiration));
                run.trail.info(format!(
                    "Signature: {}",
                    preview(&claim.sig, SIG_PREVIEW_CHARS)
                ));
                run.pass();
                Ok(claim)
            }
            Err(err) => {
                run.trail.error("FAIL: Missing required fields after parsing");
                run.trail
                    .info("Required: wallet, timestamp, expiration, sig");
                run.trail.info(format!("Error: {err}"));
                Err(err.into())
            }
        }
    }

    /// Step 4: rebuild the exact signed message. Pure construction that
    /// cannot fail, kept as an explicit logged stage for auditability.
    fn step_message_reconstruction(
        &self,
        run: &mut Run<'_>,
        claim: &WalletClaim,
        format: RecordFormat,
    ) -> String {
        run.trail
            .info("Test 4/8: Message Format & EIP-191 Preparation");

        let message = canonical_message(claim, run.domain, format);
        let shape = match format {
            RecordFormat::Current => "timestamp|domain|expiration",
            RecordFormat::Legacy => "timestamp|domain",
        };
        run.trail.info(format!("Expected format: \"{shape}\""));
        run.trail
            .info(format!("Message to verify: \"{message}\""));
        run.trail.success("PASS: Message prepared for verification");
        run.pass();
        message
    }

    /// Step 5: timestamp is a positive integer no further than the skew
    /// tolerance into the future.
    fn step_timestamp_validity(&self, run: &mut Run<'_>, claim: &WalletClaim) -> StepOutcome<i64> {
        run.trail.info("Test 5/8: Timestamp Validity");

        let Ok(timestamp) = claim.timestamp.parse::<i64>() else {
            return Err(self.fail_invalid_timestamp(run, claim));
        };
        if timestamp <= 0 {
            return Err(self.fail_invalid_timestamp(run, claim));
        }

        let now = Utc::now().timestamp();
        if timestamp > now + self.config.clock_skew_tolerance_secs {
            run.trail.error("FAIL: Timestamp is in the future");
            run.trail.warning("Possible clock manipulation attack");
            return Err(VerifyFailure::FutureTimestamp);
        }

        run.trail.success("PASS: Valid timestamp format");
        run.trail
            .info(format!("Signature created: {}", format_unix(timestamp)));
        run.trail
            .info(format!("Age: {} days", (now - timestamp).max(0) / SECS_PER_DAY));
        run.pass();
        Ok(timestamp)
    }

    fn fail_invalid_timestamp(&self, run: &mut Run<'_>, claim: &WalletClaim) -> VerifyFailure {
        run.trail.error("FAIL: Invalid timestamp format");
        run.trail.info("Expected: Valid unix timestamp");
        run.trail.info(format!("Found: {}", claim.timestamp));
        VerifyFailure::InvalidTimestamp(claim.timestamp.clone())
    }

    /// Step 6: expiration is a positive integer, after creation, and not
    /// yet passed. Three distinct halting conditions.
    fn step_expiration_validity(
        &self,
        run: &mut Run<'_>,
        claim: &WalletClaim,
        timestamp: i64,
    ) -> StepOutcome<i64> {
        run.trail.info("Test 6/8: Expiration Date Validation");

        let expiration = match claim.expiration.parse::<i64>() {
            Ok(expiration) if expiration > 0 => expiration,
            _ => {
                run.trail.error("FAIL: Invalid expiration format");
                run.trail.info("Expected: Valid unix timestamp");
                run.trail.info(format!("Found: {}", claim.expiration));
                return Err(VerifyFailure::InvalidExpiration(claim.expiration.clone()));
            }
        };

        if expiration <= timestamp {
            run.trail
                .error("FAIL: Expiration date is before creation date");
            run.trail
                .info(format!("Created: {}", format_unix(timestamp)));
            run.trail
                .info(format!("Expires: {}", format_unix(expiration)));
            return Err(VerifyFailure::BackdatedExpiration);
        }

        let now = Utc::now().timestamp();
        if expiration < now {
            run.trail.error("FAIL: Signature has expired");
            run.trail
                .info(format!("Expired on: {}", format_unix(expiration)));
            run.trail
                .info(format!("Current time: {}", format_unix(now)));
            run.trail.info("Please generate a new signature");
            return Err(VerifyFailure::ExpiredSignature);
        }

        run.trail.success("PASS: Signature is not expired");
        run.trail
            .info(format!("Expires: {}", format_unix(expiration)));
        run.trail.info(format!(
            "Valid for: {} more days",
            (expiration - now) / SECS_PER_DAY
        ));
        run.pass();
        Ok(expiration)
    }

    /// Step 7: recover the signer from the EIP-191 signature and compare
    /// case-insensitively against the claimed wallet. Recovery errors are
    /// caught here and logged, never propagated.
    fn step_signature_verification(
        &self,
        run: &mut Run<'_>,
        message: &str,
        claim: &WalletClaim,
    ) -> StepOutcome {
        run.trail
            .info("Test 7/8: Cryptographic Signature Verification (EIP-191 Compliant)");
        run.trail
            .info(format!("Verifying EIP-191 signature for: \"{message}\""));

        let recovered = match crypto::recover_signer(message, &claim.sig) {
            Ok(recovered) => recovered,
            Err(err) => {
                run.trail.error("FAIL: Signature verification error");
                run.trail.info(format!("Error: {err}"));
                return Err(err.into());
            }
        };

        run.trail
            .info(format!("Expected wallet: {}", claim.wallet));
        run.trail
            .info(format!("Recovered address: {recovered}"));

        if recovered.eq_ignore_ascii_case(&claim.wallet) {
            run.trail.success("PASS: Signature verification successful");
            run.trail
                .success("The signature was created by the claimed wallet address");
            run.pass();
            Ok(())
        } else {
            run.trail.error("FAIL: Signature verification failed");
            run.trail
                .error("The signature was NOT created by the claimed wallet address");
            run.trail.info(format!(
                "Address mismatch: expected {}, got {recovered}",
                claim.wallet
            ));
            Err(VerifyFailure::SignerMismatch {
                claimed: claim.wallet.clone(),
                recovered,
            })
        }
    }

    /// Step 8: the verified message binds to the queried domain — right
    /// part count for its format, domain segment equal case-sensitively.
    fn step_domain_consistency(
        &self,
        run: &mut Run<'_>,
        message: &str,
        format: RecordFormat,
    ) -> StepOutcome {
        run.trail.info("Test 8/8: Domain Consistency Check");
        run.trail
            .info("Verifying the signed domain matches the queried domain");

        let parts: Vec<&str> = message.split('|').collect();
        let expected = format.message_parts();
        if parts.len() != expected {
            run.trail.error("FAIL: Invalid message format");
            let shape = match format {
                RecordFormat::Current => "timestamp|domain|expiration",
                RecordFormat::Legacy => "timestamp|domain",
            };
            run.trail.info(format!("Expected: {shape}"));
            run.trail.info(format!("Found: {} parts", parts.len()));
            return Err(VerifyFailure::MessageShapeMismatch {
                expected,
                found: parts.len(),
            });
        }

        let signed_domain = parts[1];
        run.trail
            .info(format!("Domain being queried: {}", run.domain));
        run.trail
            .info(format!("Domain in signed message: {signed_domain}"));
        run.trail
            .info(format!("DNS record location: {}", run.record_name));

        if signed_domain != run.domain {
            run.trail.error("FAIL: Domain mismatch!");
            run.trail
                .warning("The signature is valid but was created for a different domain");
            run.trail
                .info("This could indicate the DNS record was copied from another domain");
            return Err(VerifyFailure::DomainMismatch {
                queried: run.domain.to_string(),
                signed: signed_domain.to_string(),
            });
        }

        run.trail.success("PASS: Domain consistency verified");
        run.trail
            .success("The signature was specifically created for this domain");
        run.pass();
        Ok(())
    }
}

/// Facts carried out of a fully passed run for the summary block.
struct RunSummary {
    wallet: String,
    expiration: i64,
    dnssec_validated: bool,
}

fn format_unix(unix_secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix_secs, 0)
        .map_or_else(|| format!("unix {unix_secs}"), |dt| dt.to_rfc3339())
}

fn preview(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(limit).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testutil::{address_for_seed, sign_personal};
    use crate::report::LogLevel;
    use crate::resolver::testutil::{FailingResolver, StaticResolver};
    use std::time::Duration;

    const SEED: [u8; 32] = [11u8; 32];
    const OTHER_SEED: [u8; 32] = [22u8; 32];
    const DOMAIN: &str = "example.com";

    fn verifier_with(records: Vec<String>, dnssec: bool) -> ClaimVerifier {
        ClaimVerifier::with_parts(
            Arc::new(StaticResolver {
                records,
                dnssec_validated: dnssec,
            }),
            None,
            Arc::new(MemoryRateLimitStore::new(1000, Duration::from_secs(60))),
            VerifierConfig::default(),
        )
    }

    /// Current-format record signed by `seed` over the canonical message
    /// for `domain`.
    fn signed_record(seed: &[u8; 32], domain: &str, timestamp: i64, expiration: i64) -> String {
        let message = format!("{timestamp}|{domain}|{expiration}");
        let sig = sign_personal(seed, &message);
        format!(
            "wallet={}&timestamp={timestamp}&expiration={expiration}&sig={sig}",
            address_for_seed(seed)
        )
    }

    fn legacy_record(seed: &[u8; 32], domain: &str, timestamp: i64) -> String {
        let message = format!("{timestamp}|{domain}");
        let sig = sign_personal(seed, &message);
        format!(
            "wallet={}&timestamp={timestamp}&sig={sig}",
            address_for_seed(seed)
        )
    }

    fn fresh_times() -> (i64, i64) {
        let now = Utc::now().timestamp();
        (now - 3600, now + 30 * SECS_PER_DAY)
    }

    #[tokio::test]
    async fn valid_claim_passes_all_eight_steps() {
        let (ts, exp) = fresh_times();
        let verifier = verifier_with(vec![signed_record(&SEED, DOMAIN, ts, exp)], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(report.success);
        assert_eq!(report.tests_passed, 8);
        assert_eq!(report.total_tests, 8);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("8/8 tests passed")));
        // DNSSEC validated: no trailing warning
        assert_ne!(report.logs.last().unwrap().level, LogLevel::Warning);
    }

    #[tokio::test]
    async fn legacy_claim_passes_with_warnings() {
        let now = Utc::now().timestamp();
        let verifier = verifier_with(vec![legacy_record(&SEED, DOMAIN, now - 3600)], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(report.success, "trail: {:#?}", report.logs);
        assert!(report
            .logs
            .iter()
            .any(|l| l.level == LogLevel::Warning && l.content.contains("Legacy format")));
    }

    #[tokio::test]
    async fn missing_dnssec_adds_trailing_warning_on_success() {
        let (ts, exp) = fresh_times();
        let verifier = verifier_with(vec![signed_record(&SEED, DOMAIN, ts, exp)], false);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(report.success);
        let last = report.logs.last().unwrap();
        assert_eq!(last.level, LogLevel::Warning);
        assert!(last.content.contains("DNSSEC"));
    }

    #[tokio::test]
    async fn rate_limit_denies_before_any_step() {
        let (ts, exp) = fresh_times();
        let verifier = ClaimVerifier::with_parts(
            Arc::new(StaticResolver {
                records: vec![signed_record(&SEED, DOMAIN, ts, exp)],
                dnssec_validated: true,
            }),
            None,
            Arc::new(MemoryRateLimitStore::new(1, Duration::from_secs(60))),
            VerifierConfig::default(),
        );

        assert!(verifier.verify(DOMAIN, "wallet").await.success);

        let denied = verifier.verify(DOMAIN, "wallet").await;
        assert!(!denied.success);
        assert_eq!(denied.tests_passed, 0);
        assert_eq!(denied.total_tests, 8);
        assert_eq!(denied.logs.len(), 1);
        assert_eq!(denied.logs[0].level, LogLevel::Error);
        assert!(denied.logs[0].content.contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn eleventh_call_within_window_is_denied() {
        let (ts, exp) = fresh_times();
        let verifier = ClaimVerifier::with_parts(
            Arc::new(StaticResolver {
                records: vec![signed_record(&SEED, DOMAIN, ts, exp)],
                dnssec_validated: true,
            }),
            None,
            Arc::new(MemoryRateLimitStore::default()),
            VerifierConfig::default(),
        );

        for _ in 0..10 {
            assert!(verifier.verify(DOMAIN, "wallet").await.success);
        }
        let denied = verifier.verify(DOMAIN, "wallet").await;
        assert_eq!(denied.tests_passed, 0);
        assert!(!denied.success);
    }

    #[tokio::test]
    async fn no_matching_record_halts_step_two() {
        let verifier = verifier_with(
            vec!["v=spf1 -all".into(), "google-site-verification=x".into()],
            true,
        );

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 1);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("No wallet record")));
    }

    #[tokio::test]
    async fn empty_sig_field_halts_step_three() {
        let verifier = verifier_with(
            vec!["wallet=0xabc&timestamp=1700000000&expiration=1800000000&sig=".into()],
            true,
        );

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 2);
    }

    #[tokio::test]
    async fn unparseable_timestamp_halts_step_five() {
        let verifier = verifier_with(
            vec!["wallet=0xabc&timestamp=soon&expiration=1800000000&sig=0xdd".into()],
            true,
        );

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 4);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("Invalid timestamp format")));
    }

    #[tokio::test]
    async fn future_timestamp_halts_step_five() {
        let now = Utc::now().timestamp();
        let ts = now + 3600;
        let exp = now + 30 * SECS_PER_DAY;
        let verifier = verifier_with(vec![signed_record(&SEED, DOMAIN, ts, exp)], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 4);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("clock manipulation")));
    }

    #[tokio::test]
    async fn expired_claim_halts_step_six() {
        let now = Utc::now().timestamp();
        let ts = now - 100 * SECS_PER_DAY;
        let exp = now - SECS_PER_DAY;
        let verifier = verifier_with(vec![signed_record(&SEED, DOMAIN, ts, exp)], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 5);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("Signature has expired")));
    }

    #[tokio::test]
    async fn backdated_expiration_halts_step_six() {
        let now = Utc::now().timestamp();
        let ts = now - 3600;
        let exp = ts - 1;
        let verifier = verifier_with(vec![signed_record(&SEED, DOMAIN, ts, exp)], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert_eq!(report.tests_passed, 5);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("before creation date")));
    }

    #[tokio::test]
    async fn non_numeric_expiration_halts_step_six() {
        let now = Utc::now().timestamp();
        let record = format!(
            "wallet={}&timestamp={}&expiration=never&sig=0xdd",
            address_for_seed(&SEED),
            now - 3600
        );
        let verifier = verifier_with(vec![record], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 5);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("Invalid expiration format")));
    }

    #[tokio::test]
    async fn malformed_signature_halts_step_seven() {
        let (ts, exp) = fresh_times();
        let record = format!(
            "wallet={}&timestamp={ts}&expiration={exp}&sig=0xnothex",
            address_for_seed(&SEED)
        );
        let verifier = verifier_with(vec![record], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 6);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("Signature verification error")));
    }

    #[tokio::test]
    async fn wrong_signer_halts_step_seven() {
        let (ts, exp) = fresh_times();
        // Signed by OTHER_SEED but claiming SEED's address
        let message = format!("{ts}|{DOMAIN}|{exp}");
        let record = format!(
            "wallet={}&timestamp={ts}&expiration={exp}&sig={}",
            address_for_seed(&SEED),
            sign_personal(&OTHER_SEED, &message)
        );
        let verifier = verifier_with(vec![record], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 6);
        let mismatch = report
            .logs
            .iter()
            .find(|l| l.content.contains("Address mismatch"))
            .unwrap();
        assert!(mismatch.content.contains(&address_for_seed(&SEED)));
        assert!(!address_for_seed(&OTHER_SEED).eq_ignore_ascii_case(&address_for_seed(&SEED)));
    }

    #[tokio::test]
    async fn signer_comparison_is_case_insensitive() {
        let (ts, exp) = fresh_times();
        let message = format!("{ts}|{DOMAIN}|{exp}");
        let record = format!(
            "wallet={}&timestamp={ts}&expiration={exp}&sig={}",
            address_for_seed(&SEED).to_uppercase().replace("0X", "0x"),
            sign_personal(&SEED, &message)
        );
        let verifier = verifier_with(vec![record], true);

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(report.success, "trail: {:#?}", report.logs);
    }

    #[tokio::test]
    async fn doh_failure_downgrades_to_fallback_with_warning() {
        let (ts, exp) = fresh_times();
        let verifier = ClaimVerifier::with_parts(
            Arc::new(FailingResolver),
            Some(Arc::new(StaticResolver {
                records: vec![signed_record(&SEED, DOMAIN, ts, exp)],
                // Even if the fallback claimed DNSSEC it is downgraded
                dnssec_validated: true,
            })),
            Arc::new(MemoryRateLimitStore::default()),
            VerifierConfig::default(),
        );

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(report.success);
        assert!(report
            .logs
            .iter()
            .any(|l| l.level == LogLevel::Warning
                && l.content.contains("falling back to standard DNS")));
        assert_eq!(report.logs.last().unwrap().level, LogLevel::Warning);
    }

    #[tokio::test]
    async fn doh_failure_without_fallback_halts_step_one() {
        let verifier = ClaimVerifier::with_parts(
            Arc::new(FailingResolver),
            None,
            Arc::new(MemoryRateLimitStore::default()),
            VerifierConfig::default(),
        );

        let report = verifier.verify(DOMAIN, "wallet").await;
        assert!(!report.success);
        assert_eq!(report.tests_passed, 0);
        assert!(report
            .logs
            .iter()
            .any(|l| l.content.contains("DNS lookup error")));
        // No fallback is configured, so none may be announced
        assert!(!report
            .logs
            .iter()
            .any(|l| l.content.contains("falling back")));
    }

    #[tokio::test]
    async fn repeated_runs_yield_identical_log_level_sequences() {
        let (ts, exp) = fresh_times();
        let verifier = verifier_with(vec![signed_record(&SEED, DOMAIN, ts, exp)], true);

        let first = verifier.verify(DOMAIN, "wallet").await;
        let second = verifier.verify(DOMAIN, "wallet").await;
        assert_eq!(first.success, second.success);
        let levels = |r: &VerificationReport| r.logs.iter().map(|l| l.level).collect::<Vec<_>>();
        assert_eq!(levels(&first), levels(&second));
    }

    #[tokio::test]
    async fn different_domains_rate_limit_independently() {
        let (ts, exp) = fresh_times();
        let verifier = ClaimVerifier::with_parts(
            Arc::new(StaticResolver {
                records: vec![signed_record(&SEED, DOMAIN, ts, exp)],
                dnssec_validated: true,
            }),
            None,
            Arc::new(MemoryRateLimitStore::new(1, Duration::from_secs(60))),
            VerifierConfig::default(),
        );

        verifier.verify(DOMAIN, "wallet").await;
        assert_eq!(verifier.verify(DOMAIN, "wallet").await.tests_passed, 0);
        // Other domain gets its own window (its claim binds example.com,
        // so it fails later, but it is not rate limited)
        let other = verifier.verify("other.com", "wallet").await;
        assert!(other.tests_passed > 0);
    }

    // The domain-binding guard operates on the reconstructed message, so
    // a full run can only trip it if reconstruction drifts; exercise the
    // guard directly with foreign-message inputs.
    #[test]
    fn domain_consistency_rejects_foreign_domain() {
        let verifier = verifier_with(vec![], true);
        let mut run = Run::new(DOMAIN, "wallet");
        let err = verifier
            .step_domain_consistency(&mut run, "1700000000|other.com|1800000000", RecordFormat::Current)
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyFailure::DomainMismatch { ref signed, .. } if signed == "other.com"
        ));
        assert!(run
            .trail
            .entries()
            .iter()
            .any(|l| l.content.contains("copied from another domain")));
    }

    #[test]
    fn domain_consistency_rejects_wrong_part_count() {
        let verifier = verifier_with(vec![], true);
        let mut run = Run::new(DOMAIN, "wallet");
        let err = verifier
            .step_domain_consistency(&mut run, "1700000000|example.com", RecordFormat::Current)
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyFailure::MessageShapeMismatch {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn record_hostname_shape() {
        assert_eq!(
            record_hostname("example.com", "wallet"),
            "aqua._wallet.example.com"
        );
    }

    #[test]
    fn preview_marks_truncation_with_ellipsis() {
        let long = "x".repeat(200);
        let shown = preview(&long, 80);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 83);
        assert_eq!(preview("short", 80), "short");
    }
}
