//! HTTP request handlers for the AssetFlow API.
//!
//! Each handler performs exactly one store or payment-processor call:
//! - Bodies are typed and validated before the call
//! - Store failures are logged and reported as a generic 500
//! - Updates upsert; a missing id creates a partial document

use crate::config::Config;
use crate::extract::ValidatedJson;
use crate::models::*;
use crate::payments::{PaymentError, PaymentProcessor};
use crate::store::{Collection, DocumentStore, StoreError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Plain-text liveness message served at `/`
pub const LIVENESS_MESSAGE: &str = "Hello from AssetFlow Server.......";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub payments: Arc<dyn PaymentProcessor>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            payments,
        }
    }
}

// === Liveness ===

/// GET / - Plain-text liveness string
pub async fn root() -> &'static str {
    LIVENESS_MESSAGE
}

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.backend(),
    })
}

// === Shared Operations ===

fn parse_id(raw: &str) -> Result<DocumentId, ApiError> {
    DocumentId::parse(raw).ok_or(ApiError::InvalidId)
}

/// Log a store failure and hide its details from the caller
fn store_failure(
    operation: &'static str,
    collection: Collection,
) -> impl FnOnce(StoreError) -> ApiError {
    move |err| {
        error!(%collection, operation, error = %err, "Store operation failed");
        ApiError::Internal
    }
}

async fn list_documents(
    state: &AppState,
    collection: Collection,
) -> Result<Json<Vec<Document>>, ApiError> {
    let documents = state
        .store
        .find_all(collection)
        .await
        .map_err(store_failure("find_all", collection))?;

    debug!(%collection, count = documents.len(), "Listed documents");
    Ok(Json(documents))
}

async fn insert_document<T: Serialize>(
    state: &AppState,
    collection: Collection,
    body: &T,
) -> Result<Json<InsertResult>, ApiError> {
    let document = to_document(body)
        .map_err(StoreError::from)
        .map_err(store_failure("insert_one", collection))?;

    let result = state
        .store
        .insert_one(collection, document)
        .await
        .map_err(store_failure("insert_one", collection))?;

    info!(%collection, id = %result.inserted_id, "Document created");
    Ok(Json(result))
}

async fn upsert_document<T: Serialize>(
    state: &AppState,
    collection: Collection,
    raw_id: &str,
    body: &T,
) -> Result<Json<UpdateResult>, ApiError> {
    let id = parse_id(raw_id)?;
    let fields = to_document(body)
        .map_err(StoreError::from)
        .map_err(store_failure("update_one", collection))?;

    let result = state
        .store
        .update_one(collection, &id, fields, true)
        .await
        .map_err(store_failure("update_one", collection))?;

    if result.upserted_count > 0 {
        warn!(%collection, %id, "Update created a partial document for an unknown id");
    }

    Ok(Json(result))
}

async fn delete_document(
    state: &AppState,
    collection: Collection,
    raw_id: &str,
) -> Result<Json<DeleteResult>, ApiError> {
    let id = parse_id(raw_id)?;

    let result = state
        .store
        .delete_one(collection, &id)
        .await
        .map_err(store_failure("delete_one", collection))?;

    debug!(%collection, %id, deleted = result.deleted_count, "Delete processed");
    Ok(Json(result))
}

// === Users ===

/// GET /users - Every user document
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    list_documents(&state, Collection::Users).await
}

/// POST /users - Create a user
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(user): ValidatedJson<NewUser>,
) -> Result<Json<InsertResult>, ApiError> {
    insert_document(&state, Collection::Users, &user).await
}

/// PUT /users/:id - Set a user's affiliation
///
/// Upserts: an unknown id yields a document holding only `affiliateWith`.
pub async fn update_user_affiliation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(update): ValidatedJson<AffiliationUpdate>,
) -> Result<Json<UpdateResult>, ApiError> {
    upsert_document(&state, Collection::Users, &id, &update).await
}

// === Assets ===

/// GET /assets - Every asset document
pub async fn list_assets(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    list_documents(&state, Collection::Assets).await
}

/// POST /assets - Create an asset
pub async fn create_asset(
    State(state): State<AppState>,
    ValidatedJson(asset): ValidatedJson<AssetFields>,
) -> Result<Json<InsertResult>, ApiError> {
    insert_document(&state, Collection::Assets, &asset).await
}

/// PUT /assets/:id - Overwrite all seven asset fields (upsert)
pub async fn update_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(asset): ValidatedJson<AssetFields>,
) -> Result<Json<UpdateResult>, ApiError> {
    upsert_document(&state, Collection::Assets, &id, &asset).await
}

/// DELETE /assets/:id - Remove an asset
pub async fn delete_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    delete_document(&state, Collection::Assets, &id).await
}

/// PUT /assets/decrement/:id - Take one unit out of stock
///
/// No lower bound: quantity may go negative. Failures, including a malformed
/// id, respond 500.
pub async fn decrement_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuantityUpdateResponse>, ApiError> {
    adjust_quantity(&state, &id, -1).await
}

/// PUT /assets/increment/:id - Put one unit back into stock
pub async fn increment_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuantityUpdateResponse>, ApiError> {
    adjust_quantity(&state, &id, 1).await
}

async fn adjust_quantity(
    state: &AppState,
    raw_id: &str,
    delta: i64,
) -> Result<Json<QuantityUpdateResponse>, ApiError> {
    // Quantity routes report every failure, a bad id included, as a 500
    let id = DocumentId::parse(raw_id).ok_or_else(|| {
        error!(id = raw_id, delta, "Quantity adjustment with malformed id");
        ApiError::Internal
    })?;

    let result = state
        .store
        .increment(Collection::Assets, &id, QUANTITY_FIELD, delta)
        .await
        .map_err(store_failure("increment", Collection::Assets))?;

    if result.modified_count == 0 {
        debug!(%id, delta, "Quantity adjustment matched no asset");
    }

    Ok(Json(QuantityUpdateResponse {
        modified_count: result.modified_count,
    }))
}

// === Requests ===

/// GET /requests - Every request document
pub async fn list_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, ApiError> {
    list_documents(&state, Collection::Requests).await
}

/// POST /requests - File an asset request
pub async fn create_request(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<NewRequest>,
) -> Result<Json<InsertResult>, ApiError> {
    insert_document(&state, Collection::Requests, &request).await
}

/// PUT /requests/:id - Set status and approval date (upsert)
pub async fn update_request_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(update): ValidatedJson<RequestStatusUpdate>,
) -> Result<Json<UpdateResult>, ApiError> {
    upsert_document(&state, Collection::Requests, &id, &update).await
}

/// DELETE /requests/:id - Remove a request
pub async fn delete_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    delete_document(&state, Collection::Requests, &id).await
}

// === Payments ===

/// POST /create-payment-intent - Ask the processor for a payment intent
pub async fn create_payment_intent(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let intent = state
        .payments
        .create_payment_intent(req.amount, &state.config.payment_currency)
        .await?;

    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
    }))
}

// === Error Handling ===

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Body failed to deserialize or validate
    InvalidInput(String),
    /// Path id is not a valid document id
    InvalidId,
    /// Payment processor failure, message passed through
    Payment(String),
    Internal,
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match &err {
            PaymentError::Rejected(_) => debug!(error = %err, "Payment processor rejected request"),
            _ => warn!(error = %err, "Payment intent creation failed"),
        }
        ApiError::Payment(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            ApiError::InvalidId => (
                StatusCode::BAD_REQUEST,
                "INVALID_ID",
                "id is not a valid document id".to_string(),
            ),
            ApiError::Payment(msg) => (StatusCode::BAD_REQUEST, "PAYMENT_FAILED", msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal Server Error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            code,
        });

        (status, body).into_response()
    }
}
