use std::sync::Arc;

use tracing::warn;

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{MemoryUserStore, PgUserStore, UserStore},
    },
    config::AppConfig,
    db,
    history::repo::{HistoryStore, MemoryHistoryStore, PgHistoryStore},
    predict::client::{HttpPredictor, Predictor},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub history: Arc<dyn HistoryStore>,
    pub predictor: Arc<dyn Predictor>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let predictor = Arc::new(HttpPredictor::new(&config.ml)?) as Arc<dyn Predictor>;

        let (users, history) = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                if let Err(e) = db::migrate(&pool).await {
                    warn!(error = ?e, "migration failed; continuing with existing schema");
                }
                (
                    Arc::new(PgUserStore::new(pool.clone())) as Arc<dyn UserStore>,
                    Arc::new(PgHistoryStore::new(pool)) as Arc<dyn HistoryStore>,
                )
            }
            None => {
                warn!("DATABASE_URL not set; users and history are kept in memory only");
                (
                    Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>,
                    Arc::new(MemoryHistoryStore::new()) as Arc<dyn HistoryStore>,
                )
            }
        };

        Ok(Self::from_parts(config, users, history, predictor))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        history: Arc<dyn HistoryStore>,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        Self {
            keys: JwtKeys::new(&config.jwt),
            config,
            users,
            history,
            predictor,
        }
    }

    /// In-memory stores and a canned model service.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_predictor(Arc::new(crate::predict::client::StubPredictor { fail: false }))
    }

    #[cfg(test)]
    pub fn fake_with_predictor(predictor: Arc<dyn Predictor>) -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
            },
            ml: crate::config::MlConfig {
                base_url: "http://127.0.0.1:9".into(),
                timeout_secs: 1,
            },
            cors_origins: vec!["http://localhost:5173".into()],
        });
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryHistoryStore::new()),
            predictor,
        )
    }
}
