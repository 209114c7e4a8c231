mod access_log;
mod cache;
mod handlers;
mod notifier;
mod openapi;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use netmon_core::store::{Store, StoreConfig};

use access_log::AccessLogLayer;
use cache::ResponseCache;
use notifier::Notifier;
use state::AppState;

/// How long shutdown waits for live viewers to finish their Close frames.
const VIEWER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================
// CLI
// ============================================================

#[derive(Parser, Debug)]
#[command(name = "netmon-web", about = "netmon query gateway and live dashboard", version = netmon_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "NETMON_LISTEN")]
    listen: String,

    /// Database file written by netmond.
    #[arg(long, default_value = netmon_core::DEFAULT_DB_PATH, env = "NETMON_DB")]
    db: PathBuf,

    /// Seconds between live update notices.
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..), env = "NETMON_BROADCAST_INTERVAL")]
    broadcast_interval: u64,

    /// Seconds a rendered dashboard shell or API document stays cached (0 disables).
    #[arg(long, default_value = "30", env = "NETMON_CACHE_TTL")]
    cache_ttl: u64,

    /// Read-only connections kept open for queries.
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u64).range(1..64))]
    read_connections: u64,
}

// ============================================================
// Router
// ============================================================

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::handle_health))
        .route("/api/connectivity", get(handlers::handle_connectivity))
        .route(
            "/api/connectivity/earliest",
            get(handlers::handle_connectivity_earliest),
        )
        .route(
            "/api/connectivity/latest",
            get(handlers::handle_connectivity_latest),
        )
        .route(
            "/api/connectivity/hours",
            get(handlers::handle_connectivity_hours),
        )
        .route("/api/bandwidth", get(handlers::handle_bandwidth))
        .route(
            "/api/bandwidth/earliest",
            get(handlers::handle_bandwidth_earliest),
        )
        .route(
            "/api/bandwidth/latest",
            get(handlers::handle_bandwidth_latest),
        )
        .route("/api/stats", get(handlers::handle_stats))
        .route("/csv", get(handlers::handle_csv))
        .route("/csv/{date}/{hour}", get(handlers::handle_csv_hour))
        .route("/ws", get(notifier::handle_ws))
        .route("/api-docs/openapi.json", get(handlers::handle_openapi))
        .fallback(get(handlers::serve_frontend))
        .with_state(state)
        .layer(AccessLogLayer)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("netmon_web=info,netmon_core=info")),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };

    if let Err(message) = runtime.block_on(async_main(args)) {
        error!("{}", message);
        process::exit(1);
    }
}

async fn async_main(args: Args) -> Result<(), String> {
    info!(version = netmon_core::VERSION, db = %args.db.display(), "starting");

    let config = StoreConfig::new(&args.db).with_read_connections(args.read_connections as usize);
    let store = Store::open_with(config)
        .map_err(|e| format!("failed to open {}: {}", args.db.display(), e))?;

    let notifier = Arc::new(Notifier::new());
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(args.cache_ttl)));
    let state = AppState::new(Arc::new(store), notifier.clone(), cache);

    let broadcaster = tokio::spawn(notifier::broadcast_loop(
        notifier.clone(),
        Duration::from_secs(args.broadcast_interval),
    ));

    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = args
        .listen
        .parse()
        .map_err(|e| format!("invalid listen address '{}': {}", args.listen, e))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {}: {}", addr, e))?;
    info!(%addr, broadcast_interval = args.broadcast_interval, "listening");

    let shutdown_notifier = notifier.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
            shutdown_notifier.close_all();
        })
        .await;

    broadcaster.abort();
    if !notifier.wait_idle(VIEWER_DRAIN_TIMEOUT).await {
        warn!(
            active_viewers = notifier.active(),
            "viewers still open after {:?}", VIEWER_DRAIN_TIMEOUT
        );
    }
    result.map_err(|e| format!("server error: {}", e))?;
    info!("stopped");
    Ok(())
}
