//! DNS collaborator and ownership verification of custom domains.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordType {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "CNAME")]
    Cname,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Cname => "CNAME",
        }
    }

    /// RR type code on the wire.
    fn code(&self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Cname => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    #[error("no {0} records")]
    NotFound(&'static str),
    #[error("resolver failed: {0}")]
    Upstream(String),
    #[error("resolver timed out")]
    Timeout,
}

impl From<reqwest::Error> for DnsError {
    fn from(err: reqwest::Error) -> Self {
        DnsError::Upstream(err.to_string())
    }
}

#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Records of `record_type` for `host`; an empty answer is `NotFound`.
    async fn resolve(&self, host: &str, record_type: RecordType) -> Result<Vec<String>, DnsError>;
}

/// DNS-over-HTTPS resolver speaking the `application/dns-json` dialect.
pub struct DohResolver {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    kind: u16,
    data: String,
}

const NXDOMAIN: u32 = 3;

impl DohResolver {
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bublr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "DNS_RESOLVER_URL",
                value: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

fn records_of(response: DohResponse, record_type: RecordType) -> Result<Vec<String>, DnsError> {
    match response.status {
        0 => {}
        NXDOMAIN => return Err(DnsError::NotFound(record_type.as_str())),
        rcode => return Err(DnsError::Upstream(format!("rcode {rcode}"))),
    }
    let records: Vec<String> = response
        .answer
        .into_iter()
        .filter(|a| a.kind == record_type.code())
        .map(|a| a.data.trim_end_matches('.').to_string())
        .collect();
    if records.is_empty() {
        return Err(DnsError::NotFound(record_type.as_str()));
    }
    Ok(records)
}

#[async_trait]
impl DnsResolver for DohResolver {
    async fn resolve(&self, host: &str, record_type: RecordType) -> Result<Vec<String>, DnsError> {
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[("name", host), ("type", record_type.as_str())])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(DnsError::Upstream(format!("http {}", res.status())));
        }
        records_of(res.json::<DohResponse>().await?, record_type)
    }
}

/// Outcome of one ownership check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainVerification {
    pub domain: String,
    pub target_domain: String,
    pub record_type: Option<RecordType>,
    pub records: Vec<String>,
    pub verified: bool,
    pub error: Option<String>,
}

async fn lookup(
    resolver: &dyn DnsResolver,
    domain: &str,
    record_type: RecordType,
    timeout: Duration,
) -> Result<Vec<String>, DnsError> {
    match tokio::time::timeout(timeout, resolver.resolve(domain, record_type)).await {
        Ok(res) => res,
        Err(_) => Err(DnsError::Timeout),
    }
}

/// A records win outright; otherwise a CNAME must mention `target`.
/// A failed A lookup never prevents the CNAME lookup.
pub async fn verify_dns(
    resolver: &dyn DnsResolver,
    domain: &str,
    target: &str,
    timeout: Duration,
) -> DomainVerification {
    let mut outcome = DomainVerification {
        domain: domain.to_string(),
        target_domain: target.to_string(),
        record_type: None,
        records: Vec::new(),
        verified: false,
        error: None,
    };

    match lookup(resolver, domain, RecordType::A, timeout).await {
        Ok(records) => {
            outcome.record_type = Some(RecordType::A);
            outcome.records = records;
            outcome.verified = true;
            return outcome;
        }
        Err(e) => debug!(domain, error = %e, "A lookup failed, trying CNAME"),
    }

    match lookup(resolver, domain, RecordType::Cname, timeout).await {
        Ok(records) => {
            let target_lc = target.to_lowercase();
            outcome.record_type = Some(RecordType::Cname);
            if records.iter().any(|r| r.to_lowercase().contains(&target_lc)) {
                outcome.verified = true;
            } else {
                outcome.error = Some(format!(
                    "CNAME found but doesn't point to {target}. Points to: {}",
                    records.join(", ")
                ));
            }
            outcome.records = records;
        }
        Err(e) => {
            info!(domain, error = %e, "CNAME lookup failed");
            outcome.error = Some(format!(
                "No valid DNS records found. Please add an A record or CNAME pointing to {target}"
            ));
        }
    }
    outcome
}
