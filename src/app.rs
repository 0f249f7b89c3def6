/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (PgPool, cache backend, IdCodec) → Router 組み立て
 * - Middleware の適用 (identity / security headers / CORS / request id, trace, timeout)
 * - like flush タスクの起動と、graceful shutdown 時の最終 flush
 */
use std::{panic, process};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::{CacheBackendKind, CacheConfig, Config},
    middleware::{cors, http, identity, security_headers},
    services::{
        cache::{Cache, CacheBackend, MemoryClient, ValkeyClient},
        id_codec::IdCodec,
        likes::spawn_flush_task,
    },
    state::{AppCache, AppState},
};

fn init_tracing() {
    // RUST_LOG=info,recipe_social=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let db = connect_db(&config).await?;
    let cache = build_cache(&config.cache).await?;
    let id_codec = IdCodec::new(config.sqids_min_length, &config.sqids_alphabet)
        .context("building public id codec")?;

    let state = AppState::new(db.clone(), id_codec, cache);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flush_task = spawn_flush_task(state.likes.clone(), config.like_flush_interval, shutdown_rx);

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // drain the ledger before the pool goes away
    let _ = shutdown_tx.send(true);
    if let Err(e) = flush_task.await {
        tracing::error!(error = %e, "like flush task ended abnormally");
    }
    db.close().await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn connect_db(config: &Config) -> Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to postgres")?;

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("running migrations")?;
    }

    Ok(db)
}

/// The cache is optional: an unreachable Valkey degrades to `Disabled` instead of failing startup.
async fn build_cache(cfg: &CacheConfig) -> Result<AppCache> {
    let backend = match cfg.backend {
        CacheBackendKind::Valkey => {
            let url = cfg.connection_url()?;
            match ValkeyClient::new(&url, cfg.op_timeout).await {
                Ok(client) => CacheBackend::Valkey(client),
                Err(e) => {
                    tracing::warn!(
                        host = %cfg.host,
                        port = cfg.port,
                        error = %e,
                        "valkey unreachable; running without cache"
                    );
                    CacheBackend::Disabled
                }
            }
        }
        CacheBackendKind::Memory => CacheBackend::Memory(MemoryClient::new()),
        CacheBackendKind::Disabled => CacheBackend::Disabled,
    };

    let cache = Cache::new(backend, cfg.key_prefix.clone());
    tracing::info!(backend = cache.backend_name(), prefix = %cfg.key_prefix, "cache ready");
    Ok(cache)
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes())
        .with_state(state);

    // innermost first: identity sees requests after CORS preflight and the HTTP stack
    let router = identity::apply(router);
    let router = security_headers::apply(router);
    let router = cors::apply(router, config.app_env, &config.cors_allowed_origins);
    http::apply(router, config.request_timeout)
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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
