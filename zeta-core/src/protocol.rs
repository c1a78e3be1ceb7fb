//! Wire shapes for the POST endpoints
//!
//! Every request and response body travels inside an `Auth` envelope.
//! Optional fields serialize as explicit nulls so canonical signatures
//! stay stable across the wire.

use crate::envelope::Auth;
use crate::types::{Event, EventDraft, Permissions};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_search_limit() -> u32 {
    1
}

fn default_search_mode() -> SearchMode {
    SearchMode::Id
}

/// `/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub event: EventDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub event_id: String,
}

/// `/search` lookup mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Id,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    #[serde(default = "default_search_mode")]
    pub mode: SearchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub events: Vec<Event>,
}

/// Registration authorization for a restricted event, signed by the event
/// owner or a delegate holding `authorize_registration`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub event_id: String,
    pub public_key: String,
    #[serde(default)]
    pub transfer_limit: Option<u8>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub event_id: String,
    #[serde(default)]
    pub verification: Option<Auth<Verification>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub ticket: String,
}

/// Hand-off block signed by the current ticket holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub ticket: String,
    pub transfer_public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub event_id: String,
    pub transfer: Auth<Transfer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub ticket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub event_id: String,
    pub ticket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub event_id: String,
    pub ticket: String,
    pub check_public_key: String,
    #[serde(default)]
    pub stamp: bool,
}

/// Ticket numbers and versions are reported 1-indexed. `stamped` is null
/// unless the caller is the holder, the owner, or holds
/// `see_stamped_ticket`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub ticket_number: u32,
    pub redeemed: bool,
    pub stamped: Option<bool>,
    pub version: u8,
    pub transfer_limit: u8,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub event_id: String,
    /// 1-indexed ticket number
    pub ticket_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRequest {
    pub event_id: String,
    /// 1-indexed ticket number
    pub ticket_number: u32,
    #[serde(default)]
    pub value: Option<u8>,
    #[serde(default)]
    pub public: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagResponse {
    pub value: u8,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsRequest {
    pub event_id: String,
    pub target_public_key: String,
    /// Omit to read; an all-false set deletes the row
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsResponse {
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub event_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Signed error body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"text": "gala"}"#).unwrap();
        assert_eq!(request.limit, 1);
        assert_eq!(request.mode, SearchMode::Id);

        let request: SearchRequest =
            serde_json::from_str(r#"{"text": "gala", "mode": "text", "limit": 10}"#).unwrap();
        assert_eq!(request.mode, SearchMode::Text);
        assert_eq!(request.limit, 10);
    }

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let request = FlagRequest {
            event_id: "e".to_string(),
            ticket_number: 1,
            value: None,
            public: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"value\":null"));
        assert!(json.contains("\"public\":null"));
    }

    #[test]
    fn test_verification_metadata_defaults_to_null() {
        let verification: Verification =
            serde_json::from_str(r#"{"event_id": "e", "public_key": "pk"}"#).unwrap();
        assert!(verification.metadata.is_null());
        assert!(verification.transfer_limit.is_none());
    }
}
