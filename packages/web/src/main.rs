use std::sync::Arc;

use api::auth::HttpIdentityProvider;
use api::db::{MemoryUserStore, PgUserStore, UserStore};
use api::{AppState, AuthConfig};
use axum::Router;
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AuthConfig::from_env()?;
    let identity = Arc::new(HttpIdentityProvider::new(&config)?);

    let router = if std::env::var("DATABASE_URL").is_ok() {
        // Initialize database pool
        let pool = api::db::get_pool().await?;

        // Run migrations
        api::db::run_migrations(pool).await?;

        // Primary and legacy sessions live in separate tables
        let primary_store = PostgresStore::new(pool.clone());
        primary_store.migrate().await?;
        let legacy_store = PostgresStore::new(pool.clone()).with_table_name("legacy_session")?;
        legacy_store.migrate().await?;

        let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
        build_router(config, users, identity, primary_store, legacy_store)
    } else {
        tracing::warn!("DATABASE_URL not set, users and sessions are kept in memory");
        let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        build_router(
            config,
            users,
            identity,
            MemoryStore::default(),
            MemoryStore::default(),
        )
    };

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

fn build_router<P, L>(
    config: AuthConfig,
    users: Arc<dyn UserStore>,
    identity: Arc<HttpIdentityProvider>,
    primary_store: P,
    legacy_store: L,
) -> Router
where
    P: SessionStore + Clone,
    L: SessionStore + Clone,
{
    let primary = session_layer(primary_store, &config.session_cookie, config.session_secure);
    let legacy = session_layer(
        legacy_store,
        &config.legacy_session_cookie,
        config.session_secure,
    );

    let state = AppState::new(users, identity, config);
    api::app(state, primary, legacy)
}

/// Session layer shared by both route groups apart from the cookie name.
fn session_layer<S>(store: S, cookie: &str, secure: bool) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(cookie.to_string())
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::days(7)))
}
