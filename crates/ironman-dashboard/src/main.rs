//! ironman-dashboard entry point.
//!
//! Loads config, sets up tracing, builds the source adapters and the order
//! cache, starts the background refresher, wires middleware, and serves HTTP
//! until Ctrl-C / SIGTERM.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use ironman_config::{
    load_layered_yaml, resolve_secrets, DashboardConfig, LogFormat, LoggingConfig,
    ResolvedSecrets,
};
use ironman_dashboard::{routes, state};
use ironman_orders::{spawn_background_refresh, CacheSettings, OrderCache};
use ironman_sources::{OrderSource, OrderspaceClient, WooClient};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const DEFAULT_CONFIG_PATH: &str = "config/base.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let paths = config_paths();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("load config")?;
    let mut cfg = loaded.typed()?;
    cfg.apply_env_overrides(|k| std::env::var(k).ok());
    cfg.validate()?;

    init_tracing(&cfg.logging);
    info!(config_hash = %loaded.config_hash, layers = ?paths, "config loaded");

    let secrets = resolve_secrets(&cfg)?;
    let sources = build_sources(&cfg, &secrets)?;
    if sources.is_empty() {
        warn!("no order sources configured; the dashboard will stay empty");
    }

    let ttl = Duration::from_secs(cfg.cache.ttl_secs);
    let cache = OrderCache::new(
        sources,
        CacheSettings {
            ttl,
            fetch_limit: usize::try_from(cfg.cache.fetch_limit)
                .context("cache.fetch_limit out of range")?,
        },
    );

    let shutdown = CancellationToken::new();
    let refresher = spawn_background_refresh(cache.clone(), ttl, shutdown.clone());

    let shared = Arc::new(state::AppState::new(
        cache,
        loaded.config_hash.clone(),
        state::PageDefaults {
            default_per_page: cfg.pagination.default_per_page,
            max_per_page: cfg.pagination.max_per_page,
        },
    ));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr: SocketAddr = cfg
        .server
        .addr
        .parse()
        .with_context(|| format!("invalid server.addr '{}'", cfg.server.addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("ironman-dashboard listening on http://{}", addr);

    let stop = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            stop.cancel();
        })
        .await
        .context("server crashed")?;

    shutdown.cancel();
    if let Err(e) = refresher.await {
        warn!(error = %e, "background refresher ended abnormally");
    }
    info!("ironman-dashboard stopped");
    Ok(())
}

/// Config layers: CLI args if any, else `IRONMAN_CONFIG` (comma separated),
/// else `config/base.yaml`.
fn config_paths() -> Vec<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return args;
    }
    if let Ok(list) = std::env::var("IRONMAN_CONFIG") {
        let from_env: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !from_env.is_empty() {
            return from_env;
        }
    }
    vec![DEFAULT_CONFIG_PATH.to_string()]
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// One adapter per enabled source, WooCommerce first so it wins merge ties.
fn build_sources(
    cfg: &DashboardConfig,
    secrets: &ResolvedSecrets,
) -> anyhow::Result<Vec<Arc<dyn OrderSource>>> {
    let timeout = Duration::from_secs(cfg.http.timeout_secs);
    let mut sources: Vec<Arc<dyn OrderSource>> = Vec::new();

    if let Some(creds) = &secrets.woo {
        let client = WooClient::new(
            cfg.woo.base_url.clone(),
            creds.consumer_key.clone(),
            creds.consumer_secret.clone(),
            timeout,
        )
        .context("build woocommerce client")?;
        info!(base_url = %cfg.woo.base_url, "woocommerce source enabled");
        sources.push(Arc::new(client));
    }

    if let Some(creds) = &secrets.orderspace {
        let client = OrderspaceClient::new(
            cfg.orderspace.base_url.clone(),
            cfg.orderspace.effective_token_url(),
            creds.client_id.clone(),
            creds.client_secret.clone(),
            timeout,
        )
        .context("build orderspace client")?;
        info!(base_url = %cfg.orderspace.base_url, "orderspace source enabled");
        sources.push(Arc::new(client));
    }

    Ok(sources)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:8080",
        "http://127.0.0.1:8080",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
