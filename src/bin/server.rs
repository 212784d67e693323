use std::{fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use odoo_dashboard::{
    AppState, DEFAULT_REFRESH_INTERVAL, DashboardConfig, UpstreamClient, build_router,
    graceful_shutdown, logging_middleware,
};

/// The web server for the Odoo dashboard.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the API serving the dashboard's list endpoints.
    #[arg(long, env = "DASHBOARD_UPSTREAM_URL", default_value = "http://localhost:5000")]
    upstream_url: String,

    /// Base URL of the Odoo web client that cards link to.
    #[arg(long, env = "ODOO_URL", default_value = "http://localhost:8069")]
    odoo_url: String,

    /// How often to refresh every panel, in milliseconds.
    #[arg(long, env = "DASHBOARD_REFRESH_MS", default_value_t = DEFAULT_REFRESH_INTERVAL.as_millis() as u64)]
    refresh_ms: u64,

    /// The local timezone as a canonical timezone name, e.g. "Africa/Addis_Ababa".
    #[arg(long, env = "DASHBOARD_TIMEZONE", default_value = "Etc/UTC")]
    timezone: String,

    /// The port to serve the dashboard from.
    #[arg(short, long, env = "DASHBOARD_PORT", default_value_t = 3000)]
    port: u16,

    /// File path to write debug logs to.
    #[arg(long, default_value = "debug.log")]
    log_path: String,

    /// Log the headers and bodies of every request and response.
    #[arg(long)]
    log_http: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(&args.log_path);

    let config = DashboardConfig::new(
        &args.upstream_url,
        &args.odoo_url,
        Duration::from_millis(args.refresh_ms),
        &args.timezone,
    )
    .unwrap_or_else(|error| panic!("Invalid configuration: {error}"));

    let client = UpstreamClient::new(&config.upstream_url)
        .unwrap_or_else(|error| panic!("Could not create upstream client: {error}"));

    tracing::info!(
        "Fetching panels from {} and linking cards to {}",
        config.upstream_url,
        config.odoo_url
    );

    let state = AppState::new(config, Arc::new(client));
    state.controller.start();

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state.clone());

    let router = if args.log_http {
        router.layer(middleware::from_fn(logging_middleware))
    } else {
        router
    };

    let router = add_tracing_layer(router);

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server stopped unexpectedly");

    state.controller.stop();
}

fn setup_logging(log_path: &str) {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
