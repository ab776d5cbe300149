//! HTTP server setup for the registry.
//!
//! [`build_router`] wires the package API and the npm protocol onto one axum
//! router; [`run_server`] prepares the store and serves it.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};
use reggie_store::PackageStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{api, config::ServerConfig, npm, state::AppState, upstream::UpstreamClient};

/// Build the registry router, nested under the configured prefix if any.
///
/// Routes sharing a path position share the parameter name, so
/// `/package/{name}/{version}` carries a range for `GET`, and the comparator
/// routes read `{version}` as the operator.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_upload_size = state.config.max_upload_size;
    let prefix = state.config.normalized_prefix();

    let routes = Router::new()
        .route("/", get(api::index_handler))
        .route("/index", get(api::list_index))
        .route("/info/{name}", get(api::package_info))
        .route("/versions/{name}", get(api::list_versions))
        .route(
            "/package/{name}/{version}",
            get(api::download_by_range)
                .put(api::upload_package)
                .delete(api::delete_package),
        )
        .route(
            "/package/{name}/{version}/{operand}",
            get(api::download_by_op),
        )
        .route(
            "/package/{name}/{version}/{operand}/{op2}/{operand2}",
            get(api::download_by_ops),
        )
        .route("/-/all", get(npm::list_all))
        .route("/-/all/since", get(npm::list_all))
        .route(
            "/{name}",
            get(npm::package_metadata).put(npm::update_metadata),
        )
        .route("/{name}/{version}", get(npm::version_metadata))
        .route("/{name}/{version}/-tag/{tag}", put(npm::tag_version))
        .route("/{name}/-/{filename}", get(npm::download_tarball))
        .route("/{name}/-/{filename}/-rev/{rev}", put(npm::publish_tarball))
        .with_state(state);

    let router = match prefix {
        Some(prefix) => Router::new().nest(&prefix, routes),
        None => routes,
    };

    router
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(TraceLayer::new_for_http())
}

/// Open the store, reload its index, and serve until the listener fails.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    info!("Starting Reggie");
    println!("🚀 Starting Reggie...");

    let store = PackageStore::open(config.store.clone()).await.map_err(|e| {
        error!(error = %e, "Failed to open package store");
        anyhow::anyhow!("Failed to open package store: {}", e)
    })?;
    let package_count = store.list_names().len();
    info!(
        data_dir = %config.store.data_dir.display(),
        packages = package_count,
        "Package index loaded"
    );
    println!("📂 Using data directory: {}", config.store.data_dir.display());
    println!("📦 Loaded {} packages", package_count);

    let upstream_client = UpstreamClient::new(config.upstream.clone())?;
    if !upstream_client.is_enabled() {
        info!("Upstream npm fallback disabled");
    }

    let addr = config.bind_address();
    let state = Arc::new(AppState::new(store, upstream_client, config));
    let registry_url = state.registry_url.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(addr = %addr, error = %e, "Failed to bind to address");
        anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
    })?;

    println!("✅ Reggie is listening on {}", addr);
    println!("🌐 Registry URL: {}", registry_url);
    println!();
    println!("🔧 Point npm at it:");
    println!("   npm set registry {}", registry_url);

    info!(addr = %addr, registry_url = %registry_url, "Server listening");
    axum::serve(listener, app).await.map_err(|e| {
        error!(error = %e, "Server error");
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
