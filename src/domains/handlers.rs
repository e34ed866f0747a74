use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{DomainStateResponse, LookupParams, LookupResponse, SetDomainRequest, VerifyResponse},
    services,
    validation::normalize_domain,
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
    tenant::{resolve_tenant, TenantError},
};

pub fn domain_routes() -> Router<AppState> {
    Router::new()
        .route("/domain/set", post(set_domain))
        .route("/domain/verify", post(verify_domain))
        .route("/domain/remove", post(remove_domain))
        .route("/domain/lookup", get(lookup_domain))
}

#[instrument(skip(state))]
pub async fn set_domain(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<SetDomainRequest>,
) -> AppResult<Json<DomainStateResponse>> {
    let user = services::set_domain(&state, user_id, &req.domain).await?;
    Ok(Json(DomainStateResponse::of(
        &user,
        "Domain saved. Please verify DNS settings.",
    )))
}

/// 200 when the domain went active, 400 with the DNS reason otherwise.
#[instrument(skip(state))]
pub async fn verify_domain(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<(StatusCode, Json<VerifyResponse>)> {
    let outcome = services::verify_domain(&state, user_id).await?;
    let v = outcome.verification;
    let (status, message) = if v.verified {
        (StatusCode::OK, "Domain verified successfully!")
    } else {
        (StatusCode::BAD_REQUEST, "DNS verification failed")
    };
    Ok((
        status,
        Json(VerifyResponse {
            verified: v.verified,
            domain: v.domain,
            record_type: v.record_type,
            records: v.records,
            message,
            error: v.error,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn remove_domain(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<DomainStateResponse>> {
    let user = services::remove_domain(&state, user_id).await?;
    Ok(Json(DomainStateResponse::of(
        &user,
        "Custom domain removed successfully",
    )))
}

/// Which tenant a host serves; inactive and unknown domains both answer 404.
#[instrument(skip(state))]
pub async fn lookup_domain(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> AppResult<(StatusCode, Json<LookupResponse>)> {
    let domain = normalize_domain(&params.domain);
    if domain.is_empty() {
        return Err(AppError::Validation("Domain is required".into()));
    }
    match resolve_tenant(state.store.as_ref(), state.billing.as_ref(), &state.config, &domain).await {
        Ok(Some(tenant)) if tenant.active => {
            Ok((StatusCode::OK, Json(LookupResponse::found(&tenant.user))))
        }
        Ok(Some(_)) => Ok((
            StatusCode::NOT_FOUND,
            Json(LookupResponse::missing("Domain inactive")),
        )),
        Ok(None) | Err(TenantError::DomainNotFound(_)) => Ok((
            StatusCode::NOT_FOUND,
            Json(LookupResponse::missing("Domain not found")),
        )),
        Err(e) => {
            warn!(domain, error = %e, "domain lookup failed");
            Err(match e {
                TenantError::Timeout => AppError::Timeout("domain lookup"),
                other => AppError::upstream("domain lookup", other),
            })
        }
    }
}
