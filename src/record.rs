//! TXT record selection, parsing, and canonical message reconstruction.
//!
//! A claim record is a URL-query-style TXT string:
//!
//! ```text
//! wallet=0x<address>&timestamp=<unix-s>&expiration=<unix-s>&sig=<hex>
//! ```
//!
//! Legacy records omit `expiration=`; a default validity window is
//! synthesized from the timestamp so both generations flow through the
//! same validation steps. The canonical message rebuilt here must match
//! the wallet-side signing input byte for byte — any drift silently
//! invalidates every future signature, so its output is pinned by tests.

use thiserror::Error;

/// Seconds of validity synthesized for legacy records (90 days)
pub const LEGACY_VALIDITY_SECS: i64 = 90 * 24 * 60 * 60;

/// Errors from record selection and parsing
#[derive(Debug, Error)]
pub enum RecordError {
    /// No TXT record at the queried name matches either claim schema
    #[error("no wallet record with required format found")]
    NoMatchingRecord,
    /// A record matched but required fields were empty after parsing
    #[error("missing required fields after parsing: {0}")]
    MissingFields(String),
}

/// Which generation of the claim schema a record uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordFormat {
    /// `wallet`, `timestamp`, `expiration`, `sig`
    Current,
    /// `wallet`, `timestamp`, `sig` — expiration synthesized
    Legacy,
}

impl RecordFormat {
    /// Number of `|`-separated parts in this format's signed message
    #[must_use]
    pub fn message_parts(self) -> usize {
        match self {
            Self::Current => 3,
            Self::Legacy => 2,
        }
    }
}

/// A claim parsed from a TXT record. Fields stay as the raw strings the
/// record carried; numeric validation happens in the pipeline steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletClaim {
    /// Claimed `0x`-prefixed wallet address
    pub wallet: String,
    /// Claim creation time, unix seconds
    pub timestamp: String,
    /// Claim expiry, unix seconds (synthesized for legacy records)
    pub expiration: String,
    /// Hex-encoded recoverable ECDSA signature
    pub sig: String,
}

/// Pick the claim record among all TXT records at the queried name.
///
/// Current-format records (with `expiration=`) are preferred over legacy
/// ones so a republished claim wins over a stale legacy record at the
/// same name.
///
/// # Errors
/// [`RecordError::NoMatchingRecord`] when neither schema matches.
pub fn select_record(records: &[String]) -> Result<(&str, RecordFormat), RecordError> {
    fn has_base(r: &str) -> bool {
        r.contains("wallet=") && r.contains("timestamp=") && r.contains("sig=")
    }

    if let Some(record) = records
        .iter()
        .find(|r| has_base(r) && r.contains("expiration="))
    {
        return Ok((record.as_str(), RecordFormat::Current));
    }
    if let Some(record) = records.iter().find(|r| has_base(r)) {
        return Ok((record.as_str(), RecordFormat::Legacy));
    }
    Err(RecordError::NoMatchingRecord)
}

/// Parse a selected record into a [`WalletClaim`].
///
/// Parameters not present map to empty strings. Legacy records with a
/// parseable timestamp and no expiration get `timestamp +
/// legacy_validity_secs` synthesized; a legacy record whose timestamp is
/// not a number cannot be given a validity window and fails here.
///
/// # Errors
/// [`RecordError::MissingFields`] when any of the four fields is still
/// empty after synthesis.
pub fn parse_record(
    record: &str,
    format: RecordFormat,
    legacy_validity_secs: i64,
) -> Result<WalletClaim, RecordError> {
    let mut claim = WalletClaim {
        wallet: String::new(),
        timestamp: String::new(),
        expiration: String::new(),
        sig: String::new(),
    };

    for pair in record.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = percent_decode(value);
        match percent_decode(key).as_str() {
            "wallet" => claim.wallet = value,
            "timestamp" => claim.timestamp = value,
            "expiration" => claim.expiration = value,
            "sig" => claim.sig = value,
            _ => {}
        }
    }

    if format == RecordFormat::Legacy && claim.expiration.is_empty() {
        if let Ok(timestamp) = claim.timestamp.parse::<i64>() {
            claim.expiration = (timestamp + legacy_validity_secs).to_string();
        }
    }

    let missing: Vec<&str> = [
        ("wallet", &claim.wallet),
        ("timestamp", &claim.timestamp),
        ("expiration", &claim.expiration),
        ("sig", &claim.sig),
    ]
    .iter()
    .filter(|(_, v)| v.is_empty())
    .map(|(k, _)| *k)
    .collect();

    if missing.is_empty() {
        Ok(claim)
    } else {
        Err(RecordError::MissingFields(missing.join(", ")))
    }
}

/// Rebuild the exact string the wallet signed.
///
/// Current format: `"{timestamp}|{domain}|{expiration}"`.
/// Legacy format: `"{timestamp}|{domain}"`.
#[must_use]
pub fn canonical_message(claim: &WalletClaim, domain: &str, format: RecordFormat) -> String {
    match format {
        RecordFormat::Current => {
            format!("{}|{}|{}", claim.timestamp, domain, claim.expiration)
        }
        RecordFormat::Legacy => format!("{}|{}", claim.timestamp, domain),
    }
}

/// URL-query percent decoding: `+` becomes a space, `%XX` becomes the
/// byte it encodes. Malformed escapes pass through untouched.
fn percent_decode(value: &str) -> String {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    out.push(hi << 4 | lo);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
