use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{http_client, BillingError, BillingStatus, BillingStatusProvider, SubscriptionStatus};
use crate::config::ConfigError;

const BASE_URL: &str = "https://api.lemonsqueezy.com/v1";

pub struct LemonSqueezy {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Resource,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    status: Option<String>,
    customer_id: Option<serde_json::Value>,
}

impl LemonSqueezy {
    pub fn new(api_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.to_string(),
            base_url: BASE_URL.to_string(),
        })
    }
}

fn parse_envelope(envelope: Envelope) -> BillingStatus {
    let attrs = envelope.data.attributes;
    let status = attrs
        .status
        .as_deref()
        .map(SubscriptionStatus::parse)
        .unwrap_or(SubscriptionStatus::Unknown);
    // numeric in the API, string in older webhook copies
    let customer_id = attrs.customer_id.and_then(|v| match v {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    });
    BillingStatus::from_status(status, customer_id)
}

#[async_trait]
impl BillingStatusProvider for LemonSqueezy {
    fn name(&self) -> &'static str {
        "lemon_squeezy"
    }

    async fn subscription_status(&self, subscription_id: &str) -> Result<BillingStatus, BillingError> {
        let url = format!("{}/subscriptions/{}", self.base_url, subscription_id);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/vnd.api+json")
            .send()
            .await?;

        match res.status() {
            StatusCode::NOT_FOUND => Err(BillingError::NotFound(subscription_id.to_string())),
            status if !status.is_success() => {
                let body = res.text().await.unwrap_or_default();
                warn!(%status, subscription_id, "lemon squeezy subscription lookup failed");
                Err(BillingError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            _ => {
                let parsed = parse_envelope(res.json::<Envelope>().await?);
                debug!(subscription_id, status = parsed.status.as_str(), "lemon squeezy subscription status");
                Ok(parsed)
            }
        }
    }
}
