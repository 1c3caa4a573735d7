//! AssetFlow Server
//!
//! Loads configuration, opens and pings the document store, wires the payment
//! processor, and serves the REST API until the process is stopped.

use assetflow_server::{build_router, payments, store, AppState, Config};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Initialize structured logging
    init_tracing();

    // Load configuration
    let config = Config::from_env();
    log_startup_info(&config);

    // Connect the store; a failed connectivity check is fatal
    let store = match store::connect(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to connect to the document store");
            std::process::exit(1);
        }
    };

    let payments = match payments::create_client(&config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build payment processor client");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("{}:{}", config.bind_addr, config.port);
    let state = AppState::new(config, store, payments);

    // Build and serve the application
    let app = build_router(state);
    serve(app, &bind_addr).await;
}

/// Initialize tracing with environment-based log levels.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("assetflow_server=debug,tower_http=info")),
        )
        .init();
}

/// Log startup configuration (no secrets).
fn log_startup_info(config: &Config) {
    info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        store = config.store_backend(),
        stripe_configured = config.payments_configured(),
        payment_currency = %config.payment_currency,
        cors_permissive = config.cors_permissive,
        cors_origins = config.cors_allowed_origins.len(),
        "Starting AssetFlow server"
    );
}

/// Bind to address and serve the application.
async fn serve(app: axum::Router, bind_addr: &str) {
    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %bind_addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    info!(addr = %bind_addr, "Server is running");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
