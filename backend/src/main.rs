use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use onboarding::{
    auth::jwt::JwtService,
    config::AppConfig,
    db,
    events::{EventSink, OutboxEventSink},
    routes,
    state::AppState,
    store::{ConsultationStore, PgStore},
    LifecycleCoordinator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        invitation_ttl_hours = config.invitation_ttl_hours,
        store_timeout_ms = config.store_timeout_ms,
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || db::run_migrations(&pool))
            .await
            .context("migration task panicked")??;
    }

    let store: Arc<dyn ConsultationStore> =
        Arc::new(PgStore::new(pool.clone(), config.store_timeout()));
    let events: Arc<dyn EventSink> = Arc::new(OutboxEventSink::new(pool));
    let jwt = JwtService::from_config(&config)?;
    let coordinator =
        LifecycleCoordinator::new(store, jwt.clone(), events, config.invitation_ttl());

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("SERVER_HOST/SERVER_PORT do not form a socket address")?;
    let state = AppState::new(config, coordinator, jwt);
    let app = routes::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("server received shutdown signal");
        })
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
