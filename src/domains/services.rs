use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dns::{verify_dns, DomainVerification},
    validation::validate_domain_format,
};
use crate::{
    billing::services::require_entitlement,
    error::{with_deadline, AppError, AppResult},
    state::AppState,
    users::repo_types::User,
};

async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    with_deadline(
        "store get user",
        state.config.upstream_timeout,
        state.store.get_user(user_id),
    )
    .await?
    .ok_or(AppError::NotFound("user"))
}

/// Saves `input` as the user's pending domain. Re-submitting the current
/// domain keeps its state.
#[instrument(skip(state))]
pub async fn set_domain(state: &AppState, user_id: Uuid, input: &str) -> AppResult<User> {
    let domain = validate_domain_format(input, &state.config.domain.app_domain)
        .map_err(|reason| AppError::Validation(reason.to_string()))?;
    let user = load_user(state, user_id).await?;
    let user = require_entitlement(state, &user).await?;

    let user = with_deadline(
        "store set domain",
        state.config.upstream_timeout,
        state.store.set_custom_domain(user.id, &domain),
    )
    .await?;
    info!(%user_id, domain, status = ?user.domain_status(), "custom domain saved");
    Ok(user)
}

/// Result of a verification attempt. A failed DNS check is not an error:
/// the pending domain stays and the user can retry.
#[derive(Debug)]
pub struct VerifyOutcome {
    pub user: User,
    pub verification: DomainVerification,
}

#[instrument(skip(state))]
pub async fn verify_domain(state: &AppState, user_id: Uuid) -> AppResult<VerifyOutcome> {
    let user = load_user(state, user_id).await?;
    let Some(domain) = user.custom_domain.as_ref().map(|d| d.domain.clone()) else {
        return Err(AppError::Validation(
            "No domain set. Please set a custom domain first".into(),
        ));
    };

    let user = require_entitlement(state, &user).await?;

    let verification = verify_dns(
        state.dns.as_ref(),
        &domain,
        &state.config.domain.app_domain,
        state.config.upstream_timeout,
    )
    .await;
    if !verification.verified {
        warn!(%user_id, domain, error = ?verification.error, "dns verification failed");
        return Ok(VerifyOutcome { user, verification });
    }

    let user = with_deadline(
        "store activate domain",
        state.config.upstream_timeout,
        state
            .store
            .activate_custom_domain(user.id, &domain, OffsetDateTime::now_utc()),
    )
    .await?;
    info!(%user_id, domain, record_type = ?verification.record_type, "custom domain activated");
    Ok(VerifyOutcome { user, verification })
}

#[instrument(skip(state))]
pub async fn remove_domain(state: &AppState, user_id: Uuid) -> AppResult<User> {
    let user = with_deadline(
        "store clear domain",
        state.config.upstream_timeout,
        state.store.clear_custom_domain(user_id),
    )
    .await?;
    info!(%user_id, "custom domain removed");
    Ok(user)
}
