use std::sync::Arc;

use anyhow::Context;
use api::config::Settings;
use api::store::{
    CredentialStore, MemoryCredentialStore, MemorySecretStore, PgCredentialStore, PgSecretStore,
    SecretStore,
};
use api::AppState;
use tower_sessions::MemoryStore;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("Failed to load settings")?;
    let address = settings.server.address.clone();

    let router = match settings.database.clone() {
        Some(database) => {
            // Initialize database pool
            let pool = api::db::connect(&database)
                .await
                .context("Failed to connect to database")?;

            // Run migrations
            api::db::migrate(&pool)
                .await
                .context("Failed to run migrations")?;

            let session_store = PostgresStore::new(pool.clone());
            session_store
                .migrate()
                .await
                .context("Failed to create session table")?;

            let users: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool.clone()));
            let secrets: Arc<dyn SecretStore> = Arc::new(PgSecretStore::new(pool));
            let state = AppState::new(settings, users, secrets).context("Invalid configuration")?;
            api::routes::app(state, session_store)
        }
        None => {
            tracing::warn!("No database configured, using in-memory stores; data is lost on exit");
            let users: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
            let secrets: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
            let state = AppState::new(settings, users, secrets).context("Invalid configuration")?;
            api::routes::app(state, MemoryStore::default())
        }
    };

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server listening on {}", address);

    axum::serve(listener, router.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
