mod config;
mod db;
mod mail;
mod rate_limit;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, StoreBackend};
use crate::mail::{MailClient, Mailer};
use crate::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().expect("DATABASE_URL required");
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Mail is optional: alerts and password resets are disabled without it.
    let mailer: Option<Arc<dyn Mailer>> = match MailClient::from_env() {
        Ok(client) => {
            tracing::info!(provider = client.provider(), "mail client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "mail not configured; alerts and password reset disabled");
            None
        }
    };

    if config.bootstrap_password.is_none() {
        tracing::warn!("STAFF_BOOTSTRAP_PASSWORD unset; staff login needs a stored password");
    }

    let port = config.port;
    let campus = config.campus_name.clone();
    let app = routes::app(state::AppState::new(store, mailer, config));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, %campus, "rollcall listening");
    axum::serve(listener, app).await.expect("server failed");
}
