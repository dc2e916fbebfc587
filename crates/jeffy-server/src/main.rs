mod api;
mod middleware;
mod realtime;
mod scheduler;

use std::sync::Arc;

use jeffy_maps::MapsClient;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    realtime::EventBus,
};

/// Base delay between Maps retries; doubles per attempt.
const MAPS_BACKOFF_BASE_MS: u64 = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = jeffy_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting jeffy-server");

    let pool_config = jeffy_db::PoolConfig::from_app_config(&config);
    let pool = jeffy_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = jeffy_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let maps = match config.maps_api_key.as_deref() {
        Some(key) => {
            let client = MapsClient::new(key, config.maps_timeout_secs)?
                .with_retry_policy(config.maps_max_retries, MAPS_BACKOFF_BASE_MS);
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("GOOGLE_MAPS_API_KEY not set; ETA and geocoding disabled");
            None
        }
    };

    let _scheduler = scheduler::build_scheduler(pool.clone()).await?;

    let auth = AuthState::from_env(config.is_development(), &config.api_key_hash_salt)?;
    let state = AppState {
        pool,
        events: EventBus::default(),
        maps,
        default_currency: config.default_currency.clone(),
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
