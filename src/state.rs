use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::db::{DbError, FeedbackDb};
use crate::error::ServiceError;
use crate::intelligence::{CompletionProvider, GatewayClient};

/// Shared state behind every request handler.
///
/// The database connection sits behind a mutex. Callers go through
/// [`AppState::with_db`], which only accepts synchronous closures, so the lock
/// can never be held across a model call.
pub struct AppState {
    pub config: Config,
    db: Mutex<FeedbackDb>,
    pub provider: Arc<dyn CompletionProvider>,
}

impl AppState {
    pub fn new(config: Config, db: FeedbackDb, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            config,
            db: Mutex::new(db),
            provider,
        }
    }

    /// Open the configured database and build the gateway client.
    pub fn open(config: Config) -> Result<Arc<Self>, ServiceError> {
        let db = FeedbackDb::open_at(config.db_path.clone())?;
        log::info!("Database ready at {}", config.db_path.display());

        let provider = GatewayClient::new(&config.gateway)?;
        log::info!(
            "AI gateway: {} (model {})",
            config.gateway.url,
            config.gateway.model
        );

        Ok(Arc::new(Self::new(config, db, Arc::new(provider))))
    }

    /// Run `f` against the database under the lock.
    pub fn with_db<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&FeedbackDb) -> Result<T, DbError>,
    {
        let db = self.db.lock();
        f(&db).map_err(ServiceError::from)
    }

    /// Like [`with_db`](Self::with_db), for closures that already speak
    /// `ServiceError` (validation mixed with reads and writes).
    pub fn with_db_service<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&FeedbackDb) -> Result<T, ServiceError>,
    {
        let db = self.db.lock();
        f(&db)
    }
}

#[cfg(test)]
pub mod test_state {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::db::test_utils::test_db;
    use crate::intelligence::provider::testing::ScriptedProvider;

    pub fn test_config() -> Config {
        Config {
            port: 0,
            db_path: std::path::PathBuf::from(":memory:"),
            gateway: GatewayConfig {
                url: "http://127.0.0.1:9/v1/chat/completions".into(),
                model: "test-model".into(),
                api_key: None,
                timeout_secs: 1,
            },
        }
    }

    /// App state over a fresh temp database and the given scripted provider.
    pub fn test_state(provider: Arc<ScriptedProvider>) -> AppState {
        AppState::new(test_config(), test_db(), provider)
    }
}
