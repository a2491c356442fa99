//! Document access-request flow
//!
//! The recovery path for expired or missing signing links: the public page
//! shows minimal document info and, for active documents only, an email
//! form that requests a fresh link. The server always answers with a
//! generic acknowledgement so registered emails cannot be enumerated; the
//! caller must not distinguish "sent" from "silently failed".

use serde::{Deserialize, Serialize};

use crate::transport::SessionTransport;

/// Minimal public info about a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessInfo {
    pub document_id: String,
    pub document_title: String,
    pub status: AccessStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    Active,
    Completed,
    Expired,
}

impl AccessInfo {
    /// The request form is only offered while the document is active;
    /// completed or expired documents show an unavailable message instead.
    pub fn can_request_access(&self) -> bool {
        self.status == AccessStatus::Active
    }
}

/// Fire-and-forget access request. The result is swallowed by policy:
/// the server's acknowledgement carries no signal either way.
pub async fn request_access<T: SessionTransport + ?Sized>(
    transport: &T,
    document_id: &str,
    email: &str,
) {
    if let Err(err) = transport.request_access(document_id, email).await {
        tracing::debug!(document_id, %err, "access request failed; result ignored");
    }
}
