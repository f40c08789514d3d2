//! Connecting the override store to a SurrealDB server.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::repository::SurrealOverrideRepository;

/// Where the override records live and how to sign in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// `host:port` of the WebSocket endpoint.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "usf".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Defaults overridden by `USF_DB_URL`, `USF_DB_NAMESPACE`,
    /// `USF_DB_DATABASE`, `USF_DB_USER` and `USF_DB_PASS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary source.
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |key: &str, fallback: String| {
            lookup(key).filter(|v| !v.is_empty()).unwrap_or(fallback)
        };
        let defaults = Self::default();
        Self {
            url: pick("USF_DB_URL", defaults.url),
            namespace: pick("USF_DB_NAMESPACE", defaults.namespace),
            database: pick("USF_DB_DATABASE", defaults.database),
            username: pick("USF_DB_USER", defaults.username),
            password: pick("USF_DB_PASS", defaults.password),
        }
    }
}

/// An authenticated client scoped to the configured namespace and database.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Connected to SurrealDB");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }

    /// Override record store sharing this connection.
    pub fn overrides(&self) -> SurrealOverrideRepository<Client> {
        SurrealOverrideRepository::new(self.db.clone())
    }
}
