//! TXT record resolution over DNS-over-HTTPS, with DNSSEC reporting.
//!
//! The primary path queries a DoH endpoint in `application/dns-json`
//! form and surfaces whether the resolver authenticated the answer
//! (the AD flag). An AD-less answer is *validated-unavailable*, not a
//! failure — the pipeline continues and reports the downgrade. When DoH
//! itself is unreachable, a plain system resolver serves as fallback
//! with no DNSSEC claim at all.
//!
//! Resolution is behind the [`TxtResolver`] trait so tests inject canned
//! lookups and never touch the network.

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// DNS RR type for TXT records
const TXT_RR_TYPE: u16 = 16;

/// Errors from TXT resolution
#[derive(Debug, Error)]
pub enum ResolverError {
    /// HTTP transport failure reaching the DoH endpoint (includes timeouts)
    #[error("doh transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// DoH endpoint answered outside the 2xx range
    #[error("doh endpoint returned http status {0}")]
    HttpStatus(u16),
    /// DNS-level failure: response status was not NOERROR
    #[error("dns query failed with status {0}")]
    DnsStatus(u32),
    /// Fallback (plain DNS) lookup failure
    #[error("txt lookup failed: {0}")]
    Lookup(String),
}

/// Result of one TXT lookup
#[derive(Clone, Debug)]
pub struct TxtLookup {
    /// TXT record payloads, unquoted and unescaped
    pub records: Vec<String>,
    /// True when the resolver authenticated the DNSSEC chain (AD flag)
    pub dnssec_validated: bool,
}

/// Seam for TXT resolution so the pipeline never depends on a concrete
/// transport.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// Fetch all TXT records at `hostname`.
    async fn resolve_txt(&self, hostname: &str) -> Result<TxtLookup, ResolverError>;
}

/// Consumed fields of an `application/dns-json` response
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "AD", default)]
    ad: bool,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    rr_type: u16,
    data: String,
}

/// DNSSEC-aware resolver speaking the JSON DoH wire form
/// (`GET <endpoint>?name=…&type=TXT&do=true&cd=false`).
pub struct DohResolver {
    endpoint: String,
    client: reqwest::Client,
}

impl DohResolver {
    /// Build a resolver for `endpoint` with a hard per-request timeout.
    /// An unreachable DoH provider must fail the verification attempt,
    /// never hang it.
    ///
    /// # Errors
    /// Returns [`ResolverError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ResolverError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dnsclaim/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl TxtResolver for DohResolver {
    async fn resolve_txt(&self, hostname: &str) -> Result<TxtLookup, ResolverError> {
        debug!(hostname, endpoint = %self.endpoint, "doh txt lookup");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("name", hostname),
                ("type", "TXT"),
                ("do", "true"),
                ("cd", "false"),
            ])
            .header("Accept", "application/dns-json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ResolverError::HttpStatus(response.status().as_u16()));
        }

        let body: DohResponse = response.json().await?;
        lookup_from_response(body)
    }
}

/// Interpret a parsed DoH body: NOERROR required, AD flag surfaced,
/// TXT answers unquoted and unescaped.
fn lookup_from_response(body: DohResponse) -> Result<TxtLookup, ResolverError> {
    if body.status != 0 {
        return Err(ResolverError::DnsStatus(body.status));
    }

    let records = body
        .answer
        .iter()
        .filter(|a| a.rr_type == TXT_RR_TYPE)
        .map(|a| unescape_txt_data(&a.data))
        .collect();

    Ok(TxtLookup {
        records,
        dnssec_validated: body.ad,
    })
}

/// Strip the RDATA's surrounding quotes and resolve `\X` escapes
/// (`\"`, `\\`, and any other backslash-escaped byte).
fn unescape_txt_data(data: &str) -> String {
    let trimmed = data.trim_matches('"');
    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Plain TXT resolver over the system DNS configuration. Carries no
/// DNSSEC claim; used only as a downgrade path when DoH is unreachable.
#[derive(Debug, Default)]
pub struct SystemTxtResolver;

#[async_trait]
impl TxtResolver for SystemTxtResolver {
    async fn resolve_txt(&self, hostname: &str) -> Result<TxtLookup, ResolverError> {
        debug!(hostname, "system resolver txt lookup");
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| ResolverError::Lookup(e.to_string()))?;
        let lookup = resolver
            .txt_lookup(hostname)
            .await
            .map_err(|e| ResolverError::Lookup(e.to_string()))?;
        Ok(TxtLookup {
            records: lookup.iter().map(ToString::to_string).collect(),
            dnssec_validated: false,
        })
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Canned resolvers for pipeline tests.

    use super::{ResolverError, TxtLookup, TxtResolver};
    use async_trait::async_trait;

    /// Returns a fixed lookup for every hostname.
    pub struct StaticResolver {
        pub records: Vec<String>,
        pub dnssec_validated: bool,
    }

    #[async_trait]
    impl TxtResolver for StaticResolver {
        async fn resolve_txt(&self, _hostname: &str) -> Result<TxtLookup, ResolverError> {
            Ok(TxtLookup {
                records: self.records.clone(),
                dnssec_validated: self.dnssec_validated,
            })
        }
    }

    /// Fails every lookup, for exercising the fallback path.
    pub struct FailingResolver;

    #[async_trait]
    impl TxtResolver for FailingResolver {
        async fn resolve_txt(&self, _hostname: &str) -> Result<TxtLookup, ResolverError> {
            Err(ResolverError::DnsStatus(2))
        }
    }
}
