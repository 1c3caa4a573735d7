//! Data models for the AssetFlow server.
//!
//! Request bodies are typed per entity and validated at the boundary.
//! Stored documents stay untyped JSON objects so that partial documents
//! created by upserts can still be listed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// A stored document (JSON object including its `_id`)
pub type Document = Map<String, Value>;

/// Name of the identifier field inside every stored document
pub const ID_FIELD: &str = "_id";

/// Generated document identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier taken from a request path
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serialize a typed body into the document fields it sets
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

// ============================================================================
// Users
// ============================================================================

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Employee,
    Hr,
}

/// Create user request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewUser {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub affiliate_with: Option<String>,
}

/// Update a user's affiliation. `null` clears it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AffiliationUpdate {
    #[serde(deserialize_with = "Option::deserialize")]
    #[validate(length(min = 1))]
    pub affiliate_with: Option<String>,
}

// ============================================================================
// Assets
// ============================================================================

/// Field holding an asset's stock count
pub const QUANTITY_FIELD: &str = "productQuantity";

/// The seven known asset fields, used for both create and full update
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssetFields {
    #[validate(email)]
    pub posted_by: String,
    #[validate(length(min = 1))]
    pub added_date: String,
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    #[validate(url)]
    pub product_image: String,
    #[validate(range(min = 0))]
    pub product_quantity: i64,
    #[validate(length(min = 1))]
    pub product_type: String,
    #[validate(length(min = 1))]
    pub availability: String,
}

/// Quantity adjustment response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityUpdateResponse {
    pub modified_count: u64,
}

// ============================================================================
// Requests
// ============================================================================

/// Lifecycle of an asset request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Returned,
}

/// Create asset request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRequest {
    #[validate(length(min = 1))]
    pub asset_id: String,
    #[validate(length(min = 1))]
    pub asset_name: String,
    #[validate(length(min = 1))]
    pub asset_type: String,
    #[validate(email)]
    pub requester_email: String,
    #[validate(length(min = 1))]
    pub requester_name: String,
    #[validate(length(min = 1))]
    pub request_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_date: Option<String>,
}

/// Update a request's status and approval date
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestStatusUpdate {
    pub status: RequestStatus,
    #[validate(length(min = 1))]
    pub approval_date: String,
}

// ============================================================================
// Store results
// ============================================================================

/// Result of inserting one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: DocumentId,
}

impl InsertResult {
    pub fn new(inserted_id: DocumentId) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

/// Result of updating (or upserting) one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<DocumentId>,
}

impl UpdateResult {
    /// No document matched the filter
    pub fn unmatched() -> Self {
        Self {
            acknowledged: true,
            ..Self::default()
        }
    }

    /// A document matched; `modified` tells whether it changed
    pub fn matched(modified: bool) -> Self {
        Self {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(modified),
            ..Self::default()
        }
    }

    /// No document matched and a new one was created
    pub fn upserted(id: DocumentId) -> Self {
        Self {
            acknowledged: true,
            upserted_count: 1,
            upserted_id: Some(id),
            ..Self::default()
        }
    }
}

/// Result of deleting by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

// ============================================================================
// Payments
// ============================================================================

/// Create payment intent request. Amount is in minor currency units;
/// its range is left to the processor.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentIntentRequest {
    pub amount: i64,
}

/// Create payment intent response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

// ============================================================================
// Misc
// ============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn asset_json() -> Value {
        json!({
            "postedBy": "hr@acme.test",
            "addedDate": "2024-05-01",
            "productName": "Laptop",
            "productImage": "https://img.acme.test/laptop.png",
            "productQuantity": 5,
            "productType": "Returnable",
            "availability": "Available"
        })
    }

    #[test]
    fn document_id_parses_uuid_and_rejects_garbage() {
        let id = DocumentId::new();
        assert_eq!(DocumentId::parse(&id.to_string()), Some(id));
        assert_eq!(DocumentId::parse("665f1c2e9b1d8a0012345678"), None);
        assert_eq!(DocumentId::parse(""), None);
    }

    #[test]
    fn asset_fields_accept_known_fields() {
        let asset: AssetFields = serde_json::from_value(asset_json()).unwrap();
        assert!(asset.validate().is_ok());

        let doc = to_document(&asset).unwrap();
        assert_eq!(doc.len(), 7);
        assert_eq!(doc[QUANTITY_FIELD], json!(5));
    }

    #[test]
    fn asset_fields_reject_unknown_field() {
        let mut body = asset_json();
        body["price"] = json!(999);
        assert!(serde_json::from_value::<AssetFields>(body).is_err());
    }

    #[test]
    fn asset_fields_reject_missing_field() {
        let mut body = asset_json();
        body.as_object_mut().unwrap().remove("availability");
        assert!(serde_json::from_value::<AssetFields>(body).is_err());
    }

    #[test]
    fn asset_fields_reject_negative_quantity() {
        let mut body = asset_json();
        body["productQuantity"] = json!(-3);
        let asset: AssetFields = serde_json::from_value(body).unwrap();
        assert!(asset.validate().is_err());
    }

    #[test]
    fn new_user_validates_email() {
        let user: NewUser = serde_json::from_value(json!({
            "name": "Ada",
            "email": "not-an-email",
            "role": "employee"
        }))
        .unwrap();
        assert!(user.validate().is_err());
    }

    #[test]
    fn new_user_omits_absent_optionals() {
        let user: NewUser = serde_json::from_value(json!({
            "name": "Ada",
            "email": "ada@acme.test",
            "role": "hr"
        }))
        .unwrap();
        let doc = to_document(&user).unwrap();
        assert!(!doc.contains_key("photo"));
        assert!(!doc.contains_key("affiliateWith"));
        assert_eq!(doc["role"], json!("hr"));
    }

    #[test]
    fn affiliation_null_clears_field() {
        let update: AffiliationUpdate =
            serde_json::from_value(json!({ "affiliateWith": null })).unwrap();
        let doc = to_document(&update).unwrap();
        assert_eq!(doc["affiliateWith"], Value::Null);
    }

    #[test]
    fn affiliation_key_is_required() {
        let result = serde_json::from_value::<AffiliationUpdate>(json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn to_document_rejects_non_objects() {
        assert!(to_document(&5).is_err());
        assert!(to_document(&vec!["a", "b"]).is_err());
        assert!(to_document(&Value::Null).is_err());
    }

    #[test]
    fn new_request_defaults_to_pending() {
        let request: NewRequest = serde_json::from_value(json!({
            "assetId": "a1",
            "assetName": "Laptop",
            "assetType": "Returnable",
            "requesterEmail": "emp@acme.test",
            "requesterName": "Emp",
            "requestDate": "2024-05-02"
        }))
        .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(to_document(&request).unwrap()["status"], json!("Pending"));
    }

    #[test]
    fn status_update_requires_both_fields() {
        assert!(serde_json::from_value::<RequestStatusUpdate>(json!({ "status": "Approved" })).is_err());
        assert!(serde_json::from_value::<RequestStatusUpdate>(json!({
            "status": "Approved",
            "approvalDate": "2024-05-03"
        }))
        .is_ok());
    }

    #[test]
    fn update_result_shapes() {
        let id = DocumentId::new();
        let upserted = serde_json::to_value(UpdateResult::upserted(id)).unwrap();
        assert_eq!(upserted["upsertedCount"], json!(1));
        assert_eq!(upserted["matchedCount"], json!(0));
        assert_eq!(upserted["upsertedId"], json!(id.to_string()));

        let unchanged = UpdateResult::matched(false);
        assert_eq!(unchanged.matched_count, 1);
        assert_eq!(unchanged.modified_count, 0);
    }
}
