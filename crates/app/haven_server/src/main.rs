//! Haven API server binary.
//!
//! Owns the process lifecycle: config, pool, migrations, cache backend
//! selection, state construction, serve, teardown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use haven_api::AppState;
use haven_api::config::{ApiConfig, CacheDriver};
use haven_api::services::mail::LogMailer;
use haven_core::auth::throttle::LoginThrottle;
use haven_core::auth::tokens::TokenService;
use haven_core::cache::{CacheStore, MemoryCache};
use haven_core::events::EventBus;
use haven_core::store::postgres::{
    PgCodeStore, PgOrgStore, PgSessionStore, PgUserStore, query_cache,
};
use haven_core::store::{CodeStore, OrgStore, UserStore};

/// CLI arguments. Values not covered here come from `ApiConfig::from_env`.
#[derive(Parser, Debug)]
#[command(name = "haven_server", about = "Haven API server")]
struct Args {
    /// Address to bind the HTTP listener.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/haven"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

/// Pick the cache backend from config. A redis request without the
/// `redis-cache` feature degrades to the in-process cache with a warning.
async fn cache_backend(
    config: &ApiConfig,
) -> Result<Arc<dyn CacheStore>, Box<dyn std::error::Error>> {
    match config.cache_driver {
        CacheDriver::Memory => Ok(Arc::new(MemoryCache::new())),
        #[cfg(feature = "redis-cache")]
        CacheDriver::Redis => Ok(Arc::new(
            haven_core::cache::RedisCache::connect(&config.redis_url).await?,
        )),
        #[cfg(not(feature = "redis-cache"))]
        CacheDriver::Redis => {
            tracing::warn!(
                "CACHE_DRIVER=redis but built without the redis-cache feature; \
                 falling back to the in-process cache"
            );
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,haven_api=debug,haven_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env();
    config.bind_addr = args.bind_addr;
    config.database_url = args.database_url;

    info!(
        database_url = %config.database_url,
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        "starting haven_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    info!("running database migrations");
    haven_core::migrate::migrate(&pool).await?;

    let backend = cache_backend(&config).await?;
    let cache = Arc::new(query_cache(backend, config.cache_ttl));

    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone(), cache.clone()));
    let sessions = Arc::new(PgSessionStore::new(pool.clone(), cache.clone()));
    let codes: Arc<dyn CodeStore> = Arc::new(PgCodeStore::new(pool.clone(), cache.clone()));
    let orgs: Arc<dyn OrgStore> = Arc::new(PgOrgStore::new(pool.clone(), cache.clone()));

    let events = Arc::new(EventBus::new());
    let tokens = Arc::new(TokenService::new(
        users.clone(),
        sessions,
        events.clone(),
        config.signing_secret.as_bytes().to_vec(),
    ));
    let throttle = Arc::new(LoginThrottle::new(
        config.login_threshold,
        config.login_window,
    ));

    let state = AppState {
        config: config.clone(),
        users,
        codes,
        orgs,
        tokens,
        throttle,
        mailer: Arc::new(LogMailer),
        events,
    };

    let app = haven_api::router(state).into_make_service_with_connect_info::<SocketAddr>();
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "haven_server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("shutting down");
    pool.close().await;
    Ok(())
}
