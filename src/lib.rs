//! # AssetFlow Server
//!
//! REST backend for tracking company assets, the employees who hold them and
//! the requests they file, plus a payment-intent passthrough.
//!
//! ## Design Principles
//!
//! - **One call per route**: every handler performs a single store or processor call
//! - **Typed boundary**: bodies are validated before anything is written
//! - **Per-document atomicity**: quantity changes never lose concurrent updates
//! - **Injected collaborators**: store and payment processor live in [`AppState`]
//!
//! ## API Overview
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/` | GET | Liveness string |
//! | `/health` | GET | Health check |
//! | `/users` | GET, POST | List / create users |
//! | `/users/:id` | PUT | Set affiliation (upsert) |
//! | `/assets` | GET, POST | List / create assets |
//! | `/assets/:id` | PUT, DELETE | Overwrite (upsert) / delete asset |
//! | `/assets/decrement/:id` | PUT | Quantity - 1 |
//! | `/assets/increment/:id` | PUT | Quantity + 1 |
//! | `/requests` | GET, POST | List / create requests |
//! | `/requests/:id` | PUT, DELETE | Set status (upsert) / delete request |
//! | `/create-payment-intent` | POST | Create a payment intent |

pub mod config;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod store;

pub use config::Config;
pub use handlers::AppState;
pub use store::{DocumentStore, MemoryStore, PgDocumentStore};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Build the Axum router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let max_body_size = state.config.max_body_size;

    Router::new()
        // Liveness
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Users
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route("/users/:id", put(handlers::update_user_affiliation))
        // Assets
        .route("/assets", get(handlers::list_assets).post(handlers::create_asset))
        .route(
            "/assets/:id",
            put(handlers::update_asset).delete(handlers::delete_asset),
        )
        .route("/assets/decrement/:id", put(handlers::decrement_asset))
        .route("/assets/increment/:id", put(handlers::increment_asset))
        // Requests
        .route(
            "/requests",
            get(handlers::list_requests).post(handlers::create_request),
        )
        .route(
            "/requests/:id",
            put(handlers::update_request_status).delete(handlers::delete_request),
        )
        // Payments
        .route("/create-payment-intent", post(handlers::create_payment_intent))
        // Middleware stack (order matters: last added = outermost)
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Single CORS policy: the configured allow-list with credentials, or
/// allow-any when explicitly opted into.
pub fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_permissive {
        warn!("CORS_PERMISSIVE set - any origin may call the API");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
