//! rdk-daemon entry point.
//!
//! Thin: sets up tracing, loads the layered desk config, starts the desk
//! runtime, wires middleware and serves HTTP. All route handlers live in
//! `routes.rs`; shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use rdk_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = rdk_config::load_desk_config(&path_refs).context("desk config load failed")?;
    info!(config_hash = %loaded.config_hash, layers = path_refs.len(), "desk config loaded");

    let oracle = rdk_runtime::oracle_from_config(&loaded.desk.oracle);
    let (desk, _desk_task) = rdk_runtime::spawn_desk_from_config(&loaded.desk, oracle)
        .context("desk runtime failed to start")?;

    let shared = Arc::new(state::AppState::new(desk, loaded.config_hash));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_desk_forwarder(&shared.desk, shared.bus.clone());

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("rdk-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("RDK_DAEMON_ADDR").ok()?.parse().ok()
}

/// `RDK_CONFIG` is a comma-separated list of YAML overlays, applied in order.
fn config_paths_from_env() -> Vec<String> {
    std::env::var("RDK_CONFIG")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
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
