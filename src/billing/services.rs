use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::BillingStatus;
use crate::{
    error::{with_deadline, AppError, AppResult},
    state::AppState,
    users::repo_types::{BillingState, DomainStatus, User},
};

/// Whether stored billing still pays for premium features at `now`.
pub fn is_entitled(billing: &BillingState, now: OffsetDateTime) -> bool {
    if billing.status.is_paying() {
        return true;
    }
    billing.status.is_in_arrears() && billing.grace_period_ends_at.is_some_and(|end| end > now)
}

/// A subscription already tied to a customer may only be re-linked to that
/// same customer.
pub fn owns_subscription(current: &BillingState, answer: &BillingStatus) -> bool {
    match (&current.customer_id, &answer.customer_id) {
        (Some(known), Some(reported)) => known == reported,
        _ => true,
    }
}

/// Folds an oracle answer into the stored billing state. A grace window opens
/// on the first arrears answer and is cleared by anything else.
pub fn next_billing_state(
    current: &BillingState,
    subscription_id: &str,
    answer: &BillingStatus,
    now: OffsetDateTime,
    grace: Duration,
) -> BillingState {
    let grace_period_ends_at = if answer.status.is_in_arrears() {
        current
            .grace_period_ends_at
            .filter(|_| current.status.is_in_arrears())
            .or_else(|| Some(now + grace))
    } else {
        None
    };
    BillingState {
        subscription_id: Some(subscription_id.to_string()),
        status: answer.status.clone(),
        customer_id: current.customer_id.clone().or_else(|| answer.customer_id.clone()),
        grace_period_ends_at,
    }
}

/// Asks the oracle about `subscription_id` and persists the answer on `user`.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn sync_billing(
    state: &AppState,
    user: &User,
    subscription_id: &str,
) -> AppResult<(User, BillingStatus)> {
    let timeout = state.config.upstream_timeout;
    let answer = with_deadline(
        "billing status",
        timeout,
        state.billing.subscription_status(subscription_id),
    )
    .await
    .map_err(|e| {
        warn!(error = %e, subscription_id, provider = state.billing.name(), "billing check failed");
        e
    })?;

    if !owns_subscription(&user.billing, &answer) {
        warn!(subscription_id, "subscription belongs to another customer");
        return Err(AppError::Forbidden(
            "Subscription belongs to another customer".into(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    let next = next_billing_state(
        &user.billing,
        subscription_id,
        &answer,
        now,
        state.config.billing.grace_period,
    );
    let user = if next != user.billing {
        with_deadline(
            "store update billing",
            timeout,
            state.store.update_billing(user.id, next),
        )
        .await?
    } else {
        user.clone()
    };
    Ok((user, answer))
}

/// Transition guard shared by domain set/verify: the oracle must confirm an
/// entitled subscription right now.
pub async fn require_entitlement(state: &AppState, user: &User) -> AppResult<User> {
    let Some(subscription_id) = user.billing.subscription_id.clone() else {
        return Err(AppError::Forbidden(
            "An active subscription is required to use custom domains".into(),
        ));
    };
    let (user, _) = sync_billing(state, user, &subscription_id).await?;
    if !is_entitled(&user.billing, OffsetDateTime::now_utc()) {
        return Err(AppError::Forbidden(format!(
            "Subscription is {}. Update your billing to continue",
            user.billing.status.as_str()
        )));
    }
    Ok(user)
}

/// Re-reads the subscription (optionally linking a new one) and takes an
/// active domain offline once billing no longer covers it.
#[instrument(skip(state))]
pub async fn refresh_subscription(
    state: &AppState,
    user_id: Uuid,
    subscription_id: Option<String>,
) -> AppResult<User> {
    let timeout = state.config.upstream_timeout;
    let user = with_deadline("store get user", timeout, state.store.get_user(user_id))
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let subscription_id = subscription_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| user.billing.subscription_id.clone())
        .ok_or_else(|| AppError::Validation("No subscription on record".into()))?;

    let (user, answer) = sync_billing(state, &user, &subscription_id).await?;
    info!(status = answer.status.as_str(), "subscription refreshed");

    if user.domain_status() == DomainStatus::Active
        && !is_entitled(&user.billing, OffsetDateTime::now_utc())
    {
        info!(user_id = %user.id, "subscription lapsed, deactivating custom domain");
        return Ok(with_deadline(
            "store deactivate domain",
            timeout,
            state.store.deactivate_custom_domain(user.id),
        )
        .await?);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        billing::SubscriptionStatus,
        testing::{harness, seed_user, seed_user_with_domain},
    };

    const HOUR: Duration = Duration::from_secs(3600);

    fn billing(status: SubscriptionStatus, grace: Option<OffsetDateTime>) -> BillingState {
        BillingState {
            subscription_id: Some("sub_1".into()),
            status,
            customer_id: None,
            grace_period_ends_at: grace,
        }
    }

    #[test]
    fn lapsed_states_are_never_entitled() {
        let now = OffsetDateTime::now_utc();
        let later = Some(now + time::Duration::hours(1));
        for status in [
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Failed,
            SubscriptionStatus::Paused,
            SubscriptionStatus::None,
        ] {
            assert!(!is_entitled(&billing(status, later), now));
        }
    }

    #[test]
    fn arrears_only_within_grace() {
        let now = OffsetDateTime::now_utc();
        let hour = time::Duration::hours(1);
        assert!(is_entitled(&billing(SubscriptionStatus::OnHold, Some(now + hour)), now));
        assert!(!is_entitled(&billing(SubscriptionStatus::OnHold, Some(now - hour)), now));
        assert!(!is_entitled(&billing(SubscriptionStatus::PastDue, None), now));
    }

    #[test]
    fn grace_window_opens_once_and_clears_on_recovery() {
        let now = OffsetDateTime::now_utc();
        let on_hold = BillingStatus::from_status(SubscriptionStatus::OnHold, None);

        let first = next_billing_state(&billing(SubscriptionStatus::Active, None), "sub_1", &on_hold, now, HOUR);
        let end = first.grace_period_ends_at.expect("grace opened");
        assert_eq!(end, now + HOUR);

        let later = now + time::Duration::minutes(30);
        let second = next_billing_state(&first, "sub_1", &on_hold, later, HOUR);
        assert_eq!(second.grace_period_ends_at, Some(end), "window is not extended");

        let active = BillingStatus::from_status(SubscriptionStatus::Active, Some("cus_1".into()));
        let recovered = next_billing_state(&second, "sub_1", &active, later, HOUR);
        assert!(recovered.grace_period_ends_at.is_none());
        assert_eq!(recovered.customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn refresh_deactivates_lapsed_domain() {
        let h = harness();
        let user = seed_user_with_domain(&h, "ada", "blog.example.com", SubscriptionStatus::Active).await;
        h.billing.set("sub_ada", SubscriptionStatus::Expired);

        let user = refresh_subscription(&h.state, user.id, None).await.expect("refresh");
        assert_eq!(user.billing.status, SubscriptionStatus::Expired);
        assert_eq!(user.domain_status(), DomainStatus::Inactive);
        assert_eq!(user.custom_domain.unwrap().domain, "blog.example.com");
    }

    #[tokio::test]
    async fn refresh_keeps_domain_during_grace() {
        let h = harness();
        let user = seed_user_with_domain(&h, "ada", "blog.example.com", SubscriptionStatus::Active).await;
        h.billing.set("sub_ada", SubscriptionStatus::OnHold);

        let user = refresh_subscription(&h.state, user.id, None).await.expect("refresh");
        assert_eq!(user.billing.status, SubscriptionStatus::OnHold);
        assert!(user.billing.grace_period_ends_at.is_some());
        assert_eq!(user.domain_status(), DomainStatus::Active);
    }

    #[tokio::test]
    async fn refresh_without_subscription_is_a_validation_error() {
        let h = harness();
        let user = seed_user(&h, "bob").await;
        let err = refresh_subscription(&h.state, user.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn refresh_rejects_another_customers_subscription() {
        let h = harness();
        let ada = seed_user(&h, "ada").await;
        let mut billing = ada.billing.clone();
        billing.subscription_id = Some("sub_ada".into());
        billing.customer_id = Some("cus_sub_ada".into());
        billing.status = SubscriptionStatus::Cancelled;
        h.state.store.update_billing(ada.id, billing).await.unwrap();
        h.billing.set("sub_ada", SubscriptionStatus::Cancelled);
        h.billing.set("sub_bob", SubscriptionStatus::Active);

        let err = refresh_subscription(&h.state, ada.id, Some("sub_bob".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let stored = h.state.store.get_user(ada.id).await.unwrap().expect("user");
        assert_eq!(stored.billing.subscription_id.as_deref(), Some("sub_ada"));
        assert_eq!(stored.billing.status, SubscriptionStatus::Cancelled);

        let user = refresh_subscription(&h.state, ada.id, Some("sub_ada".into()))
            .await
            .expect("own subscription");
        assert_eq!(user.billing.status, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn unknown_customer_may_link_any_subscription() {
        let answer = BillingStatus::from_status(SubscriptionStatus::Active, Some("cus_2".into()));
        assert!(owns_subscription(&billing(SubscriptionStatus::None, None), &answer));
        let mut known = billing(SubscriptionStatus::Active, None);
        known.customer_id = Some("cus_1".into());
        assert!(!owns_subscription(&known, &answer));
    }

    #[tokio::test]
    async fn billing_outage_fails_closed() {
        let h = harness();
        let user = seed_user_with_domain(&h, "ada", "blog.example.com", SubscriptionStatus::Active).await;
        h.billing.fail_with_outage();
        let err = require_entitlement(&h.state, &user).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
    }
}
