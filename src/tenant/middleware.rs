use axum::{
    extract::{Request, State},
    http::{header::HOST, uri::PathAndQuery, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::resolver::{is_excluded_path, resolve_tenant, rewrite_for_tenant, TenantError};
use crate::state::AppState;

fn request_host(req: &Request) -> Option<String> {
    req.headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()))
}

fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>().ok()?);
    Uri::from_parts(parts).ok()
}

async fn tenant_path(state: &AppState, host: &str, path: &str) -> Option<String> {
    match resolve_tenant(state.store.as_ref(), state.billing.as_ref(), &state.config, host).await {
        Ok(Some(tenant)) if tenant.active => Some(rewrite_for_tenant(&tenant.user, path)),
        Ok(Some(tenant)) => {
            debug!(host, user = %tenant.user.name, "domain not servable, passing through");
            None
        }
        Ok(None) => None,
        Err(TenantError::DomainNotFound(domain)) => {
            debug!(domain, "unknown custom domain");
            None
        }
        Err(e) => {
            warn!(host, error = %e, "tenant resolution failed, passing through");
            None
        }
    }
}

/// Rewrites the path of requests arriving on a servable custom domain onto the
/// tenant's profile routes. Anything else passes through untouched.
pub async fn tenant_rewrite(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let host = request_host(&req);
    let rewritten = match host {
        Some(host) if !is_excluded_path(&path) => tenant_path(&state, &host, &path).await,
        _ => None,
    };
    if let Some(path) = rewritten {
        match with_path(req.uri(), &path) {
            Some(uri) => {
                debug!(from = %req.uri(), to = %uri, "tenant rewrite");
                *req.uri_mut() = uri;
            }
            None => warn!(path, "rewritten path is not a valid uri"),
        }
    }
    next.run(req).await
}
