use std::sync::Arc;

use crate::{
    billing::{build_provider, BillingStatusProvider},
    config::{AppConfig, StoreBackend},
    domains::dns::{DnsResolver, DohResolver},
    store::{DocumentStore, MemoryStore, PgStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub dns: Arc<dyn DnsResolver>,
    pub billing: Arc<dyn BillingStatusProvider>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn DocumentStore> = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres store"))?;
                let store = PgStore::connect(url, config.max_connections).await?;
                if let Err(e) = sqlx::migrate!("./migrations").run(store.pool()).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on shutdown");
                Arc::new(MemoryStore::new())
            }
        };

        let dns = Arc::new(DohResolver::new(&config.dns_resolver_url)?) as Arc<dyn DnsResolver>;
        let billing = build_provider(&config.billing.backend)?;

        Ok(Self::from_parts(config, store, dns, billing))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
        dns: Arc<dyn DnsResolver>,
        billing: Arc<dyn BillingStatusProvider>,
    ) -> Self {
        Self {
            config,
            store,
            dns,
            billing,
        }
    }

    /// Releases collaborator resources. Called once on shutdown.
    pub async fn close(&self) {
        self.store.close().await;
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        crate::testing::harness().state
    }
}
