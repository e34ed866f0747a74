use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::billing::SubscriptionStatus;

/// Custom domain attached to a profile. `None` on the user means "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomain {
    pub domain: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub verified_at: Option<OffsetDateTime>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Unset,
    Pending,
    Active,
    Inactive,
}

impl CustomDomain {
    pub fn pending(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            verified_at: None,
            active: false,
        }
    }

    pub fn status(&self) -> DomainStatus {
        match (self.active, self.verified_at) {
            (true, _) => DomainStatus::Active,
            (false, Some(_)) => DomainStatus::Inactive,
            (false, None) => DomainStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingState {
    pub subscription_id: Option<String>,
    pub status: SubscriptionStatus,
    pub customer_id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub grace_period_ends_at: Option<OffsetDateTime>,
}

/// Author / tenant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub about: String,
    pub link: Option<String>,
    pub photo: Option<String>,
    pub posts: Vec<Uuid>,
    pub custom_domain: Option<CustomDomain>,
    pub billing: BillingState,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn domain_status(&self) -> DomainStatus {
        self.custom_domain
            .as_ref()
            .map(CustomDomain::status)
            .unwrap_or(DomainStatus::Unset)
    }
}

/// Profile fields editable by the owner.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub display_name: String,
    pub about: String,
    pub link: Option<String>,
    pub photo: Option<String>,
}

/// Storage row; columns were added over time so everything is optional.
#[derive(Debug, Clone, Default, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub link: Option<String>,
    pub photo: Option<String>,
    pub posts: Option<Vec<Uuid>>,
    pub custom_domain: Option<String>,
    pub custom_domain_verified_at: Option<OffsetDateTime>,
    pub custom_domain_active: Option<bool>,
    pub domain_verified: Option<bool>,
    pub subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub billing_customer_id: Option<String>,
    pub grace_period_ends_at: Option<OffsetDateTime>,
    pub created_at: Option<OffsetDateTime>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl UserRow {
    /// The only place row defaults are decided.
    pub fn normalize(self) -> User {
        let name = non_empty(self.name).unwrap_or_else(|| self.id.to_string());
        let custom_domain = non_empty(self.custom_domain).map(|domain| {
            // legacy rows carry `domain_verified` without a timestamp
            let verified_at = self.custom_domain_verified_at.or_else(|| {
                self.domain_verified
                    .filter(|v| *v)
                    .map(|_| OffsetDateTime::UNIX_EPOCH)
            });
            CustomDomain {
                domain: domain.to_lowercase(),
                verified_at,
                active: self.custom_domain_active.unwrap_or(false) && verified_at.is_some(),
            }
        });
        User {
            id: self.id,
            display_name: non_empty(self.display_name).unwrap_or_else(|| name.clone()),
            name,
            about: self.about.unwrap_or_default(),
            link: non_empty(self.link),
            photo: non_empty(self.photo),
            posts: self.posts.unwrap_or_default(),
            custom_domain,
            billing: BillingState {
                subscription_id: non_empty(self.subscription_id),
                status: self
                    .subscription_status
                    .as_deref()
                    .map(SubscriptionStatus::parse)
                    .unwrap_or_default(),
                customer_id: non_empty(self.billing_customer_id),
                grace_period_ends_at: self.grace_period_ends_at,
            },
            created_at: self.created_at.unwrap_or(OffsetDateTime::UNIX_EPOCH),
        }
    }
}
