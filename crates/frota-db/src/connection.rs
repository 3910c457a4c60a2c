//! Connection to the SurrealDB instance holding the frota registry,
//! movement ledger, stock ledger and trip log.
//!
//! Deployments point the server at their database through `FROTA_DB_URL`,
//! `FROTA_DB_NAMESPACE`, `FROTA_DB_DATABASE`, `FROTA_DB_USER` and
//! `FROTA_DB_PASSWORD`. Tests skip this module and use the in-memory engine.

use std::env;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

/// Where the warehouse and site data lives.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `FROTA_DB_URL`, host and port of the WebSocket endpoint.
    pub url: String,
    /// `FROTA_DB_NAMESPACE`, one per company.
    pub namespace: String,
    /// `FROTA_DB_DATABASE`.
    pub database: String,
    /// `FROTA_DB_USER`. Migrations define tables, so this is a root user.
    pub username: String,
    /// `FROTA_DB_PASSWORD`.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "frota".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Build a configuration from `FROTA_DB_*` environment variables,
    /// falling back to [`Default`] for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("FROTA_DB_URL").unwrap_or(defaults.url),
            namespace: env::var("FROTA_DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: env::var("FROTA_DB_DATABASE").unwrap_or(defaults.database),
            username: env::var("FROTA_DB_USER").unwrap_or(defaults.username),
            password: env::var("FROTA_DB_PASSWORD").unwrap_or(defaults.password),
        }
    }
}

/// Live connection shared by every frota repository.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Sign in and select the frota namespace and database. Run
    /// [`run_migrations`](crate::run_migrations) on the client before
    /// handing it to repositories.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
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

        info!("Connected to frota database");

        Ok(Self { db })
    }

    /// Client to clone into the registry, ledger and log repositories.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
