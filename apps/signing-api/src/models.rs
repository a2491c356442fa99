//! Data models for the signing API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

use portable_doc::{Node, SignerRole, VariableDef, WorkflowConfig};
use signing_session::FieldResponse;

/// Document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Active,
    Completed,
    Expired,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Active => write!(f, "active"),
            DocumentStatus::Completed => write!(f, "completed"),
            DocumentStatus::Expired => write!(f, "expired"),
        }
    }
}

impl DocumentStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => DocumentStatus::Completed,
            "expired" => DocumentStatus::Expired,
            _ => DocumentStatus::Active,
        }
    }
}

/// Document row; the authored content tree and its surrounding
/// definitions are stored as JSON columns.
#[derive(Debug, Clone, FromRow)]
pub struct DbDocument {
    pub id: String,
    pub title: String,
    pub content_json: String,
    pub roles_json: String,
    pub variables_json: String,
    pub workflow_json: String,
    pub injected_json: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbDocument {
    pub fn content(&self) -> serde_json::Result<Node> {
        serde_json::from_str(&self.content_json)
    }

    pub fn roles(&self) -> serde_json::Result<Vec<SignerRole>> {
        serde_json::from_str(&self.roles_json)
    }

    pub fn variables(&self) -> serde_json::Result<Vec<VariableDef>> {
        serde_json::from_str(&self.variables_json)
    }

    pub fn workflow(&self) -> serde_json::Result<WorkflowConfig> {
        serde_json::from_str(&self.workflow_json)
    }

    pub fn injected_values(&self) -> serde_json::Result<BTreeMap<String, serde_json::Value>> {
        serde_json::from_str(&self.injected_json)
    }

    pub fn status(&self) -> DocumentStatus {
        DocumentStatus::parse(&self.status)
    }
}

/// Per-signer row, addressed by an unguessable token.
#[derive(Debug, Clone, FromRow)]
pub struct DbSigner {
    pub token: String,
    pub document_id: String,
    pub role_id: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub step: String,
    pub responses_json: String,
    /// Provider URL for the embedded signing frame; set at dispatch.
    pub signing_url: Option<String>,
    /// Full-page redirect URL for providers that refuse embedding.
    pub fallback_url: Option<String>,
    /// The pre-signing submit has been consumed; a second submit on the
    /// same token is rejected.
    pub used: bool,
    /// Zero-based signing order within the document.
    pub position: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbSigner {
    pub fn responses(&self) -> serde_json::Result<Vec<FieldResponse>> {
        serde_json::from_str(&self.responses_json)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }
}

/// Request to create a document with its signing sessions
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub content: Node,
    pub roles: Vec<SignerRole>,
    #[serde(default)]
    pub variables: Vec<VariableDef>,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default, rename = "injectedValues")]
    pub injected_values: BTreeMap<String, serde_json::Value>,
    /// Per-role embedded signing URLs from the provider integration.
    #[serde(default, rename = "signingUrls")]
    pub signing_urls: BTreeMap<String, String>,
    /// Per-role full-page redirect URLs.
    #[serde(default, rename = "fallbackUrls")]
    pub fallback_urls: BTreeMap<String, String>,
}

/// One created signer session
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSigner {
    #[serde(rename = "roleId")]
    pub role_id: String,
    #[serde(rename = "recipientName")]
    pub recipient_name: String,
    #[serde(rename = "recipientEmail")]
    pub recipient_email: String,
    pub token: String,
}

/// Response from document creation
#[derive(Debug, Clone, Serialize)]
pub struct CreateDocumentResponse {
    #[serde(rename = "documentId")]
    pub document_id: String,
    pub signers: Vec<CreatedSigner>,
}

/// Body of a pre-signing form submission
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub responses: Vec<FieldResponse>,
}

/// Body of a signing-link access request
#[derive(Debug, Clone, Deserialize)]
pub struct RequestAccessBody {
    pub email: String,
}

/// Fixed-shape acknowledgement; identical whether or not the request
/// matched anything, so responses leak nothing about what exists.
#[derive(Debug, Clone, Serialize)]
pub struct GenericAck {
    pub message: String,
}

/// Query parameters of the provider redirect callback
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_status_roundtrip() {
        for status in [
            DocumentStatus::Active,
            DocumentStatus::Completed,
            DocumentStatus::Expired,
        ] {
            assert_eq!(DocumentStatus::parse(&status.to_string()), status);
        }
    }

    #[test]
    fn test_unknown_status_defaults_to_active() {
        assert_eq!(DocumentStatus::parse("archived"), DocumentStatus::Active);
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateDocumentRequest = serde_json::from_value(serde_json::json!({
            "title": "Lease",
            "content": { "type": "doc", "children": [] },
            "roles": [],
        }))
        .unwrap();
        assert!(request.variables.is_empty());
        assert!(request.injected_values.is_empty());
    }
}
