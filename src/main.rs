use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::info;

use exchange_trace::api;
use exchange_trace::api::app::AppState;
use exchange_trace::config::Config;
use exchange_trace::correlator::ExchangeTraceLayer;
use exchange_trace::timeline::Timeline;

const DEFAULT_CONFIG_PATH: &str = "/etc/exchange-trace/config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // When invoked as a container HEALTHCHECK, hit /healthz and exit
    // immediately. This avoids needing any external tool (curl/wget) in the
    // container image.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    let config = load_config()?;

    // RUST_LOG wins; the configured level is the fallback.
    let default_filter = config
        .server
        .log_level
        .clone()
        .unwrap_or_else(|| "exchange_trace=info,tower_http=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&default_filter)),
        )
        .init();

    info!(
        app_port = config.server.app_port,
        admin_port = config.server.admin_port,
        timeline_capacity = config.timeline.capacity,
        "exchange-trace demo starting"
    );

    let timeline = Arc::new(Timeline::new(config.timeline.capacity));
    let state = Arc::new(AppState::new(Arc::clone(&timeline)));

    let app_addr: SocketAddr = format!("0.0.0.0:{}", config.server.app_port).parse()?;
    let admin_addr: SocketAddr = format!("0.0.0.0:{}", config.server.admin_port).parse()?;

    let app_listener = tokio::net::TcpListener::bind(app_addr).await?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;

    info!(%app_addr, "traced application listening");
    info!(%admin_addr, "admin API listening");

    // Attach request tracing middleware to both servers
    let trace_layer = || {
        tower_http::trace::TraceLayer::new_for_http()
            .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
            .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO))
    };

    // The correlator sits inside traced_app; nested dispatches re-enter the
    // chain below the HTTP trace layer.
    let app = api::app::traced_app(
        Arc::clone(&state),
        ExchangeTraceLayer::new(timeline.clone()),
    )
    .layer(trace_layer());
    let admin_app = api::admin::router(Arc::clone(&state)).layer(trace_layer());

    tokio::select! {
        result = axum::serve(app_listener, app) => {
            result.context("application server error")?;
        }
        result = axum::serve(admin_listener, admin_app) => {
            result.context("admin API server error")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

/// Resolve and load the configuration.
///
/// `XTRACE_CONFIG` names the file explicitly and must then exist. Without
/// it, the default path is used when present and built-in defaults
/// otherwise, so the demo runs with no setup at all.
fn load_config() -> anyhow::Result<Config> {
    match std::env::var("XTRACE_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            Config::load(&path).with_context(|| format!("loading config from {}", path.display()))
        }
        Err(_) => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                Config::load(&path)
                    .with_context(|| format!("loading config from {}", path.display()))
            } else {
                Ok(Config::default())
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Lightweight healthcheck: GET /healthz on the admin port, exit 0 on 200
/// and 1 otherwise. Invoked via `exchange-trace-demo --healthcheck` from a
/// container HEALTHCHECK.
async fn healthcheck() -> anyhow::Result<()> {
    let port = std::env::var("XTRACE_ADMIN_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8081);

    let url = format!("http://127.0.0.1:{port}/healthz");
    let resp = reqwest::get(&url).await?;

    if resp.status().is_success() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
