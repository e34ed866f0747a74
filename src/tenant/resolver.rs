use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    billing::{
        services::{is_entitled, next_billing_state, owns_subscription},
        BillingStatusProvider,
    },
    config::{AppConfig, DomainConfig},
    error::{with_deadline, AppError},
    store::DocumentStore,
    users::repo_types::User,
};

/// Path prefixes that are never rewritten.
const EXCLUDED_PREFIXES: &[&str] = &[
    "/api",
    "/_next/static",
    "/_next/image",
    "/favicon.ico",
    "/static",
    "/assets",
];

const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]", "0.0.0.0"];

#[derive(Debug, Clone)]
pub struct Tenant {
    pub user: User,
    /// Whether the domain may be served right now.
    pub active: bool,
}

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("no user owns domain {0}")]
    DomainNotFound(String),
    #[error("tenant lookup failed: {0}")]
    Upstream(String),
    #[error("tenant lookup timed out")]
    Timeout,
}

impl From<AppError> for TenantError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Timeout(_) => TenantError::Timeout,
            other => TenantError::Upstream(other.to_string()),
        }
    }
}

fn split_port(host: &str) -> (&str, Option<&str>) {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((inner, tail)) => (inner, tail.strip_prefix(':')),
            None => (host, None),
        };
    }
    match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            (name, Some(port))
        }
        _ => (host, None),
    }
}

/// Platform hosts: configured defaults, the app domain with its subdomains,
/// and every localhost variant. A missing host counts as default.
pub fn is_default_host(host: &str, cfg: &DomainConfig) -> bool {
    let (name, _) = split_port(host.trim());
    let name = name.trim_end_matches('.').to_lowercase();
    if name.is_empty() || LOCAL_HOSTS.contains(&name.as_str()) || name.ends_with(".localhost") {
        return true;
    }
    let app = cfg.app_domain.as_str();
    if name == app || name.strip_suffix(app).is_some_and(|sub| sub.ends_with('.')) {
        return true;
    }
    cfg.default_hosts.iter().any(|h| *h == name || split_port(h).0 == name)
}

/// Lowercased and trimmed; the port is dropped only for default hosts.
pub fn normalize_host(host: &str, cfg: &DomainConfig) -> String {
    let host = host.trim().to_lowercase();
    let host = host.trim_end_matches('.');
    match split_port(host) {
        (name, Some(_)) if is_default_host(name, cfg) => name.trim_end_matches('.').to_string(),
        _ => host.to_string(),
    }
}

/// Subscription covers the domain and the domain itself is switched on.
pub fn is_domain_servable(user: &User, now: OffsetDateTime) -> bool {
    is_entitled(&user.billing, now) && user.custom_domain.as_ref().is_some_and(|d| d.active)
}

/// `None` for platform hosts, the owning tenant otherwise. A domain the stored
/// state calls servable is only served once the billing oracle agrees.
pub async fn resolve_tenant(
    store: &dyn DocumentStore,
    billing: &dyn BillingStatusProvider,
    config: &AppConfig,
    host: &str,
) -> Result<Option<Tenant>, TenantError> {
    if is_default_host(host, &config.domain) {
        return Ok(None);
    }
    let domain = normalize_host(host, &config.domain);
    let user = with_deadline(
        "store get user by domain",
        config.upstream_timeout,
        store.get_user_by_domain(&domain),
    )
    .await?
    .ok_or_else(|| TenantError::DomainNotFound(domain.clone()))?;

    let now = OffsetDateTime::now_utc();
    let active =
        is_domain_servable(&user, now) && confirm_billing(store, billing, config, &user, now).await;
    Ok(Some(Tenant { user, active }))
}

/// Asks the oracle about the tenant's subscription. An error, a timeout or a
/// non-entitled answer is a refusal. A lapse is persisted and takes the domain
/// offline.
async fn confirm_billing(
    store: &dyn DocumentStore,
    billing: &dyn BillingStatusProvider,
    config: &AppConfig,
    user: &User,
    now: OffsetDateTime,
) -> bool {
    let Some(subscription_id) = user.billing.subscription_id.as_deref() else {
        return false;
    };
    let timeout = config.upstream_timeout;
    let answer = match with_deadline(
        "billing status",
        timeout,
        billing.subscription_status(subscription_id),
    )
    .await
    {
        Ok(answer) => answer,
        Err(e) => {
            warn!(user = %user.name, error = %e, "billing check failed, not serving domain");
            return false;
        }
    };
    if !owns_subscription(&user.billing, &answer) {
        warn!(user = %user.name, subscription_id, "subscription belongs to another customer");
        return false;
    }

    let next = next_billing_state(&user.billing, subscription_id, &answer, now, config.billing.grace_period);
    let entitled = is_entitled(&next, now);
    if next != user.billing {
        if let Err(e) = with_deadline("store update billing", timeout, store.update_billing(user.id, next)).await {
            warn!(user = %user.name, error = %e, "failed to persist billing status");
        }
    }
    if !entitled {
        info!(user = %user.name, status = answer.status.as_str(), "subscription lapsed, deactivating custom domain");
        if let Err(e) = with_deadline(
            "store deactivate domain",
            timeout,
            store.deactivate_custom_domain(user.id),
        )
        .await
        {
            warn!(user = %user.name, error = %e, "failed to deactivate custom domain");
        }
    }
    entitled
}

pub fn is_excluded_path(path: &str) -> bool {
    EXCLUDED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// `/` becomes `/{name}`, `/x` becomes `/{name}/x`; excluded prefixes pass.
pub fn rewrite_for_tenant(user: &User, path: &str) -> String {
    if is_excluded_path(path) {
        return path.to_string();
    }
    match path {
        "" | "/" => format!("/{}", user.name),
        p if p.starts_with('/') => format!("/{}{}", user.name, p),
        p => format!("/{}/{}", user.name, p),
    }
}
