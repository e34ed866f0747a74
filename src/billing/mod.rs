//! Billing-status oracle.
//!
//! Domain activation and tenant routing depend on [`BillingStatusProvider`]
//! only; each payment vendor gets one adapter that maps its payload onto
//! [`BillingStatus`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{BillingBackend, ConfigError},
    state::AppState,
};

pub mod dodo;
mod dto;
pub mod handlers;
pub mod lemon_squeezy;
pub mod services;

pub use dodo::DodoPayments;
pub use lemon_squeezy::LemonSqueezy;

pub fn router() -> Router<AppState> {
    handlers::subscription_routes()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Active,
    Trialing,
    OnHold,
    PastDue,
    Paused,
    Cancelled,
    Expired,
    Failed,
    Unknown,
}

impl SubscriptionStatus {
    /// Accepts every vendor spelling seen in stored records and API payloads.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "missing" => Self::None,
            "active" => Self::Active,
            "trialing" | "on_trial" => Self::Trialing,
            "on_hold" => Self::OnHold,
            "past_due" | "unpaid" => Self::PastDue,
            "paused" => Self::Paused,
            "cancelled" | "canceled" => Self::Cancelled,
            "expired" => Self::Expired,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::OnHold => "on_hold",
            Self::PastDue => "past_due",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// Paid up right now.
    pub fn is_paying(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Payment trouble that still qualifies for a grace window.
    pub fn is_in_arrears(&self) -> bool {
        matches!(self, Self::OnHold | Self::PastDue)
    }
}

/// Answer of the billing oracle for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingStatus {
    pub active: bool,
    pub status: SubscriptionStatus,
    pub customer_id: Option<String>,
}

impl BillingStatus {
    pub fn from_status(status: SubscriptionStatus, customer_id: Option<String>) -> Self {
        Self {
            active: status.is_paying(),
            status,
            customer_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("subscription {0} not found")]
    NotFound(String),
    #[error("billing provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("billing provider returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<BillingError> for crate::error::AppError {
    fn from(err: BillingError) -> Self {
        crate::error::AppError::upstream("billing provider", err)
    }
}

#[async_trait]
pub trait BillingStatusProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn subscription_status(&self, subscription_id: &str) -> Result<BillingStatus, BillingError>;
}

/// Used when no provider is configured: nothing is ever payable-for.
pub struct NoBilling;

#[async_trait]
impl BillingStatusProvider for NoBilling {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn subscription_status(&self, _subscription_id: &str) -> Result<BillingStatus, BillingError> {
        Ok(BillingStatus::from_status(SubscriptionStatus::None, None))
    }
}

pub fn build_provider(
    backend: &BillingBackend,
) -> Result<Arc<dyn BillingStatusProvider>, ConfigError> {
    let provider: Arc<dyn BillingStatusProvider> = match backend {
        BillingBackend::Dodo { api_key, sandbox } => Arc::new(DodoPayments::new(api_key, *sandbox)?),
        BillingBackend::LemonSqueezy { api_key } => Arc::new(LemonSqueezy::new(api_key)?),
        BillingBackend::None => Arc::new(NoBilling),
    };
    tracing::info!(provider = provider.name(), "billing provider configured");
    Ok(provider)
}

pub(crate) fn http_client() -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(concat!("bublr/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::Invalid {
            name: "http client",
            value: e.to_string(),
        })
}
