use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dns::RecordType;
use crate::users::repo_types::{DomainStatus, User};

#[derive(Debug, Deserialize)]
pub struct SetDomainRequest {
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainStateResponse {
    pub success: bool,
    pub domain: Option<String>,
    pub status: DomainStatus,
    pub message: &'static str,
}

impl DomainStateResponse {
    pub fn of(user: &User, message: &'static str) -> Self {
        Self {
            success: true,
            domain: user.custom_domain.as_ref().map(|d| d.domain.clone()),
            status: user.domain_status(),
            message,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    pub domain: String,
    pub record_type: Option<RecordType>,
    pub records: Vec<String>,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<TenantSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl LookupResponse {
    pub fn found(user: &User) -> Self {
        Self {
            active: true,
            user: Some(TenantSummary {
                id: user.id,
                name: user.name.clone(),
                display_name: user.display_name.clone(),
            }),
            error: None,
        }
    }

    pub fn missing(error: &'static str) -> Self {
        Self {
            active: false,
            user: None,
            error: Some(error),
        }
    }
}
