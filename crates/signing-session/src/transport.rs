//! Session transport collaborator
//!
//! All server communication for the public signing flow goes through this
//! trait. The core consumes it and never implements it: the host supplies
//! an HTTP-backed implementation, tests supply scripted mocks.

use async_trait::async_trait;

use crate::access::AccessInfo;
use crate::error::TransportError;
use crate::session::{FieldResponse, SessionPayload};

/// Server round-trips for one signer token, plus the document-access flow.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Fetch the current session state for a token.
    async fn load(&self, token: &str) -> Result<SessionPayload, TransportError>;

    /// Submit field responses; returns the fresh session state. The
    /// returned step may be anything, including `preview` again.
    async fn submit(
        &self,
        token: &str,
        responses: &[FieldResponse],
    ) -> Result<SessionPayload, TransportError>;

    /// Proceed from preview to signing without a form submission.
    async fn proceed(&self, token: &str) -> Result<SessionPayload, TransportError>;

    /// Best-effort completion mark; callers ignore the outcome.
    async fn complete(&self, token: &str) -> Result<(), TransportError>;

    /// Public access info for a document.
    async fn access_info(&self, document_id: &str) -> Result<AccessInfo, TransportError>;

    /// Request a fresh signing link by email. The server answers with a
    /// generic acknowledgement regardless of whether the email matched.
    async fn request_access(&self, document_id: &str, email: &str)
        -> Result<(), TransportError>;
}
