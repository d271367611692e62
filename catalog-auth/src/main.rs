use catalog_auth::{
    build_router,
    config::{AuthConfig, LedgerBackend},
    services::{
        AuthService, InMemoryCredentialStore, InMemoryLedger, JwtService, RedisLedger,
        RevocationLedger, TokenService,
    },
    AppState,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting catalog authentication service"
    );

    let jwt = JwtService::new(&config.jwt)?;

    // Entries must outlive every refresh token they can vouch for.
    let retention = config.jwt.refresh_token_ttl();
    let mut gc_task = None;
    let ledger: Arc<dyn RevocationLedger> = match config.ledger.backend {
        LedgerBackend::Memory => {
            let ledger = Arc::new(InMemoryLedger::new(retention));
            gc_task = Some(ledger.clone().spawn_gc(std::time::Duration::from_secs(
                config.ledger.gc_interval_seconds,
            )));
            tracing::info!("In-memory revocation ledger initialized");
            ledger
        }
        LedgerBackend::Redis => {
            let url = config.ledger.redis_url.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("REDIS_URL is required for redis ledger"))
            })?;
            let ledger = RedisLedger::new(url.expose_secret(), retention).await?;
            tracing::info!("Redis revocation ledger initialized");
            Arc::new(ledger)
        }
    };

    let credentials = Arc::new(InMemoryCredentialStore::new());
    match &config.credentials.seed_path {
        Some(path) => {
            credentials.load_seed(path)?;
        }
        None => tracing::warn!("No CREDENTIALS_SEED_PATH set; credential store is empty"),
    }

    let tokens = TokenService::from_config(&config.jwt, jwt, ledger.clone(), credentials.clone());
    let auth_service = AuthService::new(
        tokens.clone(),
        credentials,
        config.security.require_verified_email,
    )?;

    let state = AppState {
        config: config.clone(),
        tokens,
        auth_service,
        ledger,
    };
    let app = build_router(state).await?;

    let addr = config.common.bind_addr()?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = gc_task {
        task.abort();
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
