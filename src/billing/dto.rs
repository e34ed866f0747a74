use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{services::is_entitled, SubscriptionStatus};
use crate::users::repo_types::{DomainStatus, User};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub subscription_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub subscription_status: SubscriptionStatus,
    pub subscription_id: Option<String>,
    pub is_active: bool,
    pub is_past_due: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub grace_period_ends_at: Option<OffsetDateTime>,
    pub custom_domain: Option<String>,
    pub custom_domain_active: bool,
    pub domain_status: DomainStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub domain_verified_at: Option<OffsetDateTime>,
}

impl SubscriptionStatusResponse {
    pub fn of(user: &User, now: OffsetDateTime) -> Self {
        let domain = user.custom_domain.as_ref();
        Self {
            subscription_status: user.billing.status.clone(),
            subscription_id: user.billing.subscription_id.clone(),
            is_active: is_entitled(&user.billing, now),
            is_past_due: user.billing.status.is_in_arrears(),
            grace_period_ends_at: user.billing.grace_period_ends_at,
            custom_domain: domain.map(|d| d.domain.clone()),
            custom_domain_active: domain.is_some_and(|d| d.active),
            domain_status: user.domain_status(),
            domain_verified_at: domain.and_then(|d| d.verified_at),
        }
    }
}
