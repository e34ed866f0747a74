use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::{http_client, BillingError, BillingStatus, BillingStatusProvider, SubscriptionStatus};
use crate::config::ConfigError;

const LIVE_BASE_URL: &str = "https://api.dodopayments.com";
const TEST_BASE_URL: &str = "https://api.sandbox.dodopayments.com";

/// Dodo Payments subscription lookup.
pub struct DodoPayments {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DodoPayments {
    pub fn new(api_key: &str, sandbox: bool) -> Result<Self, ConfigError> {
        let base = if sandbox { TEST_BASE_URL } else { LIVE_BASE_URL };
        Self::with_base_url(api_key, base)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn text_field<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

pub(crate) fn parse_subscription(payload: &Value) -> BillingStatus {
    let status = text_field(payload, &["status", "state"])
        .map(SubscriptionStatus::parse)
        .unwrap_or(SubscriptionStatus::Unknown);
    let customer_id = text_field(payload, &["customer_id", "customerId"])
        .or_else(|| payload.get("customer").and_then(|c| text_field(c, &["customer_id", "id"])))
        .map(str::to_string);
    BillingStatus::from_status(status, customer_id)
}

#[async_trait]
impl BillingStatusProvider for DodoPayments {
    fn name(&self) -> &'static str {
        "dodo"
    }

    async fn subscription_status(&self, subscription_id: &str) -> Result<BillingStatus, BillingError> {
        let url = format!("{}/subscriptions/{}", self.base_url, subscription_id);
        let res = self.client.get(&url).bearer_auth(&self.api_key).send().await?;

        match res.status() {
            StatusCode::NOT_FOUND => Err(BillingError::NotFound(subscription_id.to_string())),
            status if !status.is_success() => {
                let body = res.text().await.unwrap_or_default();
                warn!(%status, subscription_id, "dodo subscription lookup failed");
                Err(BillingError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            _ => {
                let payload: Value = res.json().await?;
                let parsed = parse_subscription(&payload);
                debug!(subscription_id, status = parsed.status.as_str(), "dodo subscription status");
                Ok(parsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn active_payload() {
        let status = parse_subscription(&json!({
            "subscription_id": "sub_1",
            "status": "active",
            "customer": { "customer_id": "cus_9", "email": "a@b.c" }
        }));
        assert!(status.active);
        assert_eq!(status.customer_id.as_deref(), Some("cus_9"));
    }

    #[test]
    fn state_alias_and_flat_customer() {
        let status = parse_subscription(&json!({ "state": "on_hold", "customerId": "cus_1" }));
        assert_eq!(status.status, SubscriptionStatus::OnHold);
        assert!(!status.active);
        assert_eq!(status.customer_id.as_deref(), Some("cus_1"));
    }

    #[test]
    fn missing_status_is_unknown_and_inactive() {
        let status = parse_subscription(&json!({}));
        assert_eq!(status.status, SubscriptionStatus::Unknown);
        assert!(!status.active);
        assert!(status.customer_id.is_none());
    }

    #[test]
    fn sandbox_flag_picks_base_url() {
        assert_eq!(DodoPayments::new("k", true).unwrap().base_url, TEST_BASE_URL);
        assert_eq!(DodoPayments::new("k", false).unwrap().base_url, LIVE_BASE_URL);
    }
}
