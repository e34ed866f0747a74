use std::{collections::HashMap, time::Duration};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Host names that belong to the platform itself and are never tenants.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    pub app_domain: String,
    pub default_hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingBackend {
    Dodo { api_key: String, sandbox: bool },
    LemonSqueezy { api_key: String },
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    pub backend: BillingBackend,
    pub grace_period: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub domain: DomainConfig,
    pub dns_resolver_url: String,
    pub upstream_timeout: Duration,
    pub billing: BillingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<&str, &str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let store = match var("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };
        let database_url = match store {
            StoreBackend::Postgres => Some(required("DATABASE_URL")?),
            StoreBackend::Memory => var("DATABASE_URL"),
        };
        let max_connections = parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "bublr".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "bublr-users".into()),
        };

        let domain = DomainConfig {
            app_domain: var("APP_DOMAIN")
                .map(|d| d.to_lowercase())
                .unwrap_or_else(|| "bublr.life".into()),
            default_hosts: var("DEFAULT_HOSTS")
                .map(|list| {
                    list.split(',')
                        .map(|h| h.trim().to_lowercase())
                        .filter(|h| !h.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        let billing_backend = match var("BILLING_PROVIDER").as_deref() {
            None | Some("dodo") => BillingBackend::Dodo {
                api_key: required("DODO_PAYMENTS_API_KEY")?,
                sandbox: var("DODO_PAYMENTS_ENVIRONMENT")
                    .map(|env| env.to_lowercase().contains("test"))
                    .unwrap_or(false),
            },
            Some("lemon_squeezy") => BillingBackend::LemonSqueezy {
                api_key: required("LEMON_SQUEEZY_API_KEY")?,
            },
            Some("none") => BillingBackend::None,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "BILLING_PROVIDER",
                    value: other.to_string(),
                })
            }
        };
        let grace_hours = parse_or(&var, "BILLING_GRACE_PERIOD_HOURS", 72u64)?;

        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "APP_PORT", 8080u16)?,
            store,
            database_url,
            max_connections,
            jwt,
            domain,
            dns_resolver_url: var("DNS_RESOLVER_URL")
                .unwrap_or_else(|| "https://cloudflare-dns.com/dns-query".into()),
            upstream_timeout: Duration::from_millis(parse_or(&var, "UPSTREAM_TIMEOUT_MS", 3000u64)?),
            billing: BillingConfig {
                backend: billing_backend,
                grace_period: Duration::from_secs(grace_hours * 60 * 60),
            },
        })
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
