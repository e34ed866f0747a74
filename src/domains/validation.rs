//! Custom-domain format checks. Pure, no I/O.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref HOSTNAME: Regex =
        Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
            .expect("valid hostname regex");
}

/// Why a user-supplied domain was refused. The message is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainRejection {
    #[error("Domain is required")]
    Empty,
    #[error("Domain cannot contain paths. Use only the domain name (e.g., blog.example.com)")]
    ContainsPath,
    #[error("Domain cannot contain spaces")]
    ContainsWhitespace,
    #[error("Invalid domain format. Use only letters, numbers, dots, and hyphens")]
    InvalidFormat,
    #[error("Domain must have at least a name and TLD (e.g., example.com)")]
    MissingTld,
    #[error("Invalid TLD (top-level domain)")]
    InvalidTld,
    #[error("Cannot use the main app domain")]
    AppDomain,
}

/// Trim + lowercase, used wherever a stored domain is looked up.
pub fn normalize_domain(input: &str) -> String {
    input.trim().trim_end_matches('.').to_lowercase()
}

/// Returns the normalized domain, or the reason it cannot be used.
pub fn validate_domain_format(input: &str, app_domain: &str) -> Result<String, DomainRejection> {
    let mut domain = input.trim().to_lowercase();
    if domain.is_empty() {
        return Err(DomainRejection::Empty);
    }
    for scheme in ["https://", "http://"] {
        if let Some(rest) = domain.strip_prefix(scheme) {
            domain = rest.to_string();
            break;
        }
    }

    if domain.contains('/') {
        return Err(DomainRejection::ContainsPath);
    }
    if domain.chars().any(char::is_whitespace) {
        return Err(DomainRejection::ContainsWhitespace);
    }
    if !HOSTNAME.is_match(&domain) {
        return Err(DomainRejection::InvalidFormat);
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(DomainRejection::MissingTld);
    }
    if labels.last().map_or(0, |tld| tld.len()) < 2 {
        return Err(DomainRejection::InvalidTld);
    }
    if domain == app_domain.to_lowercase() {
        return Err(DomainRejection::AppDomain);
    }
    Ok(domain)
}
