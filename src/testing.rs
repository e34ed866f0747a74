//! Scripted collaborators and fixtures shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::claims::Claims,
    billing::{BillingError, BillingStatus, BillingStatusProvider, SubscriptionStatus},
    config::{AppConfig, JwtConfig},
    domains::dns::{DnsError, DnsResolver, RecordType},
    posts::repo_types::Post,
    search::tokenizer::expand_post,
    state::AppState,
    store::MemoryStore,
    users::repo_types::{BillingState, CustomDomain, User},
};

enum Script {
    Answer(Vec<String>),
    Fail(DnsError),
    Hang,
}

#[derive(Default)]
pub struct FakeDns {
    scripts: Mutex<HashMap<(String, RecordType), Script>>,
}

impl FakeDns {
    fn script(&self, host: &str, record_type: RecordType, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert((host.to_string(), record_type), script);
    }

    pub fn answer(&self, host: &str, record_type: RecordType, records: &[&str]) {
        let records = records.iter().map(|r| r.to_string()).collect();
        self.script(host, record_type, Script::Answer(records));
    }

    pub fn fail(&self, host: &str, record_type: RecordType, err: DnsError) {
        self.script(host, record_type, Script::Fail(err));
    }

    /// Never answers within any sane deadline.
    pub fn hang(&self, host: &str, record_type: RecordType) {
        self.script(host, record_type, Script::Hang);
    }
}

#[async_trait]
impl DnsResolver for FakeDns {
    async fn resolve(&self, host: &str, record_type: RecordType) -> Result<Vec<String>, DnsError> {
        let outcome = match self.scripts.lock().unwrap().get(&(host.to_string(), record_type)) {
            Some(Script::Answer(records)) => Ok(records.clone()),
            Some(Script::Fail(err)) => Err(err.clone()),
            Some(Script::Hang) => Err(DnsError::Timeout),
            None => Err(DnsError::NotFound(record_type.as_str())),
        };
        if matches!(outcome, Err(DnsError::Timeout)) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        outcome
    }
}

#[derive(Default)]
pub struct FakeBilling {
    statuses: Mutex<HashMap<String, SubscriptionStatus>>,
    outage: AtomicBool,
}

impl FakeBilling {
    pub fn set(&self, subscription_id: &str, status: SubscriptionStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(subscription_id.to_string(), status);
    }

    pub fn fail_with_outage(&self) {
        self.outage.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BillingStatusProvider for FakeBilling {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn subscription_status(&self, subscription_id: &str) -> Result<BillingStatus, BillingError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(BillingError::Status {
                status: 503,
                body: "maintenance".into(),
            });
        }
        self.statuses
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .map(|status| BillingStatus::from_status(status, Some(format!("cus_{subscription_id}"))))
            .ok_or_else(|| BillingError::NotFound(subscription_id.to_string()))
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub dns: Arc<FakeDns>,
    pub billing: Arc<FakeBilling>,
}

pub fn test_config() -> AppConfig {
    AppConfig::from_map(&HashMap::from([
        ("STORE_BACKEND", "memory"),
        ("JWT_SECRET", "test-secret"),
        ("BILLING_PROVIDER", "none"),
        ("UPSTREAM_TIMEOUT_MS", "500"),
    ]))
    .expect("test config")
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let dns = Arc::new(FakeDns::default());
    let billing = Arc::new(FakeBilling::default());
    let state = AppState::from_parts(
        Arc::new(test_config()),
        store.clone(),
        dns.clone(),
        billing.clone(),
    );
    Harness {
        state,
        store,
        dns,
        billing,
    }
}

pub fn test_user(name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        display_name: name.to_uppercase(),
        about: String::new(),
        link: None,
        photo: None,
        posts: Vec::new(),
        custom_domain: None,
        billing: BillingState::default(),
        created_at: OffsetDateTime::now_utc(),
    }
}

pub async fn seed_user(h: &Harness, name: &str) -> User {
    let user = test_user(name);
    h.store.seed_user(user.clone()).await;
    user
}

/// User with subscription `sub_{name}` that the billing fake reports as `status`.
pub async fn seed_subscriber(h: &Harness, name: &str, status: SubscriptionStatus) -> User {
    let subscription_id = format!("sub_{name}");
    h.billing.set(&subscription_id, status.clone());
    let mut user = test_user(name);
    user.billing = BillingState {
        subscription_id: Some(subscription_id),
        status,
        customer_id: None,
        grace_period_ends_at: None,
    };
    h.store.seed_user(user.clone()).await;
    user
}

/// Subscriber whose `domain` is verified and active.
pub async fn seed_user_with_domain(
    h: &Harness,
    name: &str,
    domain: &str,
    status: SubscriptionStatus,
) -> User {
    let mut user = seed_subscriber(h, name, status).await;
    user.custom_domain = Some(CustomDomain {
        domain: domain.to_lowercase(),
        verified_at: Some(OffsetDateTime::now_utc()),
        active: true,
    });
    h.store.seed_user(user.clone()).await;
    user
}

pub fn published_post(author_id: Uuid, title: &str, excerpt: &str, content: &str) -> Post {
    let id = Uuid::new_v4();
    Post {
        id,
        author_id,
        title: title.to_string(),
        excerpt: excerpt.to_string(),
        content: content.to_string(),
        slug: id.to_string(),
        published: true,
        last_edited: OffsetDateTime::now_utc(),
        search_queries: expand_post(title, excerpt, content),
    }
}

pub fn mint_token(cfg: &JwtConfig, user_id: Uuid) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + 3600,
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .expect("token")
}

pub fn bearer(h: &Harness, user_id: Uuid) -> String {
    format!("Bearer {}", mint_token(&h.state.config.jwt, user_id))
}
