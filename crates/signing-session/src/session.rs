//! Signing session data model
//!
//! A session represents one external signer's journey through one document,
//! addressed solely by an opaque bearer token. The `step` field is always
//! sourced from the server and never computed client-side.

use serde::{Deserialize, Serialize};

use portable_doc::{FieldResponseValue, FieldType, InteractiveFieldDef, Node};

/// The authoritative server-communicated step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    Preview,
    Signing,
    Waiting,
    Completed,
    Declined,
}

impl SessionStep {
    /// Terminal steps end the signer's journey.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStep::Completed | SessionStep::Declined)
    }
}

impl std::fmt::Display for SessionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStep::Preview => write!(f, "preview"),
            SessionStep::Signing => write!(f, "signing"),
            SessionStep::Waiting => write!(f, "waiting"),
            SessionStep::Completed => write!(f, "completed"),
            SessionStep::Declined => write!(f, "declined"),
        }
    }
}

/// Session state as returned by the server for one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub step: SessionStep,
    pub document_title: String,
    pub recipient_name: String,
    /// Present in `preview` when interactive fields require completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<PreSigningForm>,
    /// Present in `signing`; loaded in a sandboxed iframe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_signing_url: Option<String>,
    /// Present in `signing` when the provider requires a full-page redirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
    /// Present in `waiting` (sequential signing order).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_signers: Option<u32>,
}

impl SessionPayload {
    /// Whether the preview has interactive fields left to fill.
    pub fn has_form_fields(&self) -> bool {
        self.form.as_ref().is_some_and(|f| !f.fields.is_empty())
    }

    /// Derive the terminal payload for a locally-observed signing outcome,
    /// retaining display metadata so no extra round-trip is needed.
    pub fn into_terminal(self, step: SessionStep) -> SessionPayload {
        debug_assert!(step.is_terminal());
        SessionPayload {
            step,
            document_title: self.document_title,
            recipient_name: self.recipient_name,
            form: None,
            embedded_signing_url: None,
            fallback_url: None,
            signing_position: None,
            total_signers: None,
        }
    }
}

/// The pre-signing form: document content plus the fields belonging to
/// this signer's role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreSigningForm {
    /// Opaque structured document tree.
    pub content: Node,
    /// Ordered, restricted to this signer's role.
    pub fields: Vec<InteractiveFieldDef>,
    pub role_id: String,
}

/// A signer's answer to one field, as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResponse {
    pub field_id: String,
    /// Denormalized from the field definition.
    pub field_type: FieldType,
    pub response: FieldResponseValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wire_names() {
        assert_eq!(
            serde_json::to_string(&SessionStep::Preview).unwrap(),
            r#""preview""#
        );
        let back: SessionStep = serde_json::from_str(r#""waiting""#).unwrap();
        assert_eq!(back, SessionStep::Waiting);
    }

    #[test]
    fn test_terminal_steps() {
        assert!(SessionStep::Completed.is_terminal());
        assert!(SessionStep::Declined.is_terminal());
        assert!(!SessionStep::Signing.is_terminal());
    }

    #[test]
    fn test_into_terminal_retains_display_metadata() {
        let payload = SessionPayload {
            step: SessionStep::Signing,
            document_title: "Lease".to_string(),
            recipient_name: "Alice".to_string(),
            form: None,
            embedded_signing_url: Some("https://provider.example/sign/xyz".to_string()),
            fallback_url: None,
            signing_position: None,
            total_signers: None,
        };

        let terminal = payload.into_terminal(SessionStep::Completed);
        assert_eq!(terminal.step, SessionStep::Completed);
        assert_eq!(terminal.document_title, "Lease");
        assert_eq!(terminal.recipient_name, "Alice");
        assert!(terminal.embedded_signing_url.is_none());
    }

    #[test]
    fn test_payload_minimal_json_deserializes() {
        let json = r#"{"step":"waiting","documentTitle":"Lease","recipientName":"Alice","signingPosition":2,"totalSigners":3}"#;
        let payload: SessionPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.step, SessionStep::Waiting);
        assert_eq!(payload.signing_position, Some(2));
        assert!(payload.form.is_none());
    }
}
