use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::store::{CatalogStore, MemoryStore, PgStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let state = match config.database_url.clone() {
            Some(url) => {
                let store = Arc::new(PgStore::connect(&url, config.max_connections).await?);
                Self::from_parts(store.clone(), store, config)
            }
            None => {
                warn!("DATABASE_URL not set; catalog data lives in memory only");
                let store = Arc::new(MemoryStore::new());
                Self::from_parts(store.clone(), store, config)
            }
        };
        Ok(state)
    }

    pub fn from_parts(
        catalog: Arc<dyn CatalogStore>,
        users: Arc<dyn UserStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            catalog,
            users,
            config,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
        });
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(store.clone(), store, config)
    }
}
