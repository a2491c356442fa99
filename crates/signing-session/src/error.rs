//! Error taxonomy for the public signing flow
//!
//! Transport failures are classified at the boundary into a small closed
//! set of codes; nothing propagates as a raw transport error. The sole
//! exception is poll failures (waiting poll, completion poll), which are
//! deliberately swallowed by their drivers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified error codes surfaced to the public page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Token/session past validity; the page can offer the access-request
    /// recovery flow.
    Expired,
    /// Token consumed by a prior completed/declined action.
    AlreadyUsed,
    /// Unknown token or unauthorized. 401 is folded in here so "doesn't
    /// exist" and "not yours" are indistinguishable (anti-enumeration).
    NotFound,
    /// Any other server-reported failure during initial load.
    ServerError,
    /// Failure during submit/proceed, so the UI can offer "try again".
    SubmitError,
    /// Non-HTTP-shaped failure.
    Unknown,
}

impl ErrorCode {
    fn default_message(self) -> &'static str {
        match self {
            ErrorCode::Expired => "This signing link has expired.",
            ErrorCode::AlreadyUsed => "This signing link has already been used.",
            ErrorCode::NotFound => "This signing link is invalid or no longer available.",
            ErrorCode::ServerError => "Something went wrong loading the document.",
            ErrorCode::SubmitError => "Something went wrong submitting your responses.",
            ErrorCode::Unknown => "An unexpected error occurred.",
        }
    }
}

/// A classified, terminal session error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct SessionError {
    pub code: ErrorCode,
    pub message: String,
}

impl SessionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn with_default_message(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }
}

/// What the transport collaborator reports back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Server responded with an error status; `message` comes from the
    /// response body when it was parseable.
    #[error("server returned {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Http {
        status: u16,
        message: Option<String>,
    },
    /// The call never produced a structured response.
    #[error("network error: {0}")]
    Network(String),
}

/// Which kind of call failed; submit/proceed failures get their own code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    Load,
    Submit,
}

/// Classify a transport failure into the public taxonomy.
///
/// The server reports expiry and reuse with 401 bodies, so the body
/// message is inspected before the status code; 401 and 404 both fold
/// into `NotFound`.
pub fn classify_transport_error(err: &TransportError, phase: ErrorPhase) -> SessionError {
    let (status, message) = match err {
        TransportError::Http { status, message } => (*status, message.as_deref()),
        TransportError::Network(_) => {
            return SessionError::with_default_message(ErrorCode::Unknown);
        }
    };

    let lowered = message.map(str::to_ascii_lowercase).unwrap_or_default();
    let code = if lowered.contains("expired") {
        ErrorCode::Expired
    } else if lowered.contains("already been used") {
        ErrorCode::AlreadyUsed
    } else if status == 401 || status == 404 {
        ErrorCode::NotFound
    } else if phase == ErrorPhase::Submit {
        ErrorCode::SubmitError
    } else {
        ErrorCode::ServerError
    };

    match message {
        Some(m) if !m.is_empty() => SessionError::new(code, m),
        _ => SessionError::with_default_message(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, message: &str) -> TransportError {
        TransportError::Http {
            status,
            message: Some(message.to_string()),
        }
    }

    #[test]
    fn test_expired_wins_over_status() {
        let err = classify_transport_error(&http(401, "token has expired"), ErrorPhase::Load);
        assert_eq!(err.code, ErrorCode::Expired);
        assert_eq!(err.message, "token has expired");
    }

    #[test]
    fn test_already_used_classification() {
        let err = classify_transport_error(
            &http(400, "access token has already been used"),
            ErrorPhase::Load,
        );
        assert_eq!(err.code, ErrorCode::AlreadyUsed);
    }

    #[test]
    fn test_unauthorized_folds_into_not_found() {
        let err = classify_transport_error(&http(401, "invalid or unknown token"), ErrorPhase::Load);
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = classify_transport_error(&http(404, "not found"), ErrorPhase::Load);
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_phase_selects_server_or_submit_error() {
        let err = classify_transport_error(&http(500, "boom"), ErrorPhase::Load);
        assert_eq!(err.code, ErrorCode::ServerError);

        let err = classify_transport_error(&http(500, "boom"), ErrorPhase::Submit);
        assert_eq!(err.code, ErrorCode::SubmitError);
    }

    #[test]
    fn test_network_failure_is_unknown_with_default_message() {
        let err = classify_transport_error(
            &TransportError::Network("connection reset".to_string()),
            ErrorPhase::Submit,
        );
        assert_eq!(err.code, ErrorCode::Unknown);
        assert_eq!(err.message, "An unexpected error occurred.");
    }

    #[test]
    fn test_missing_body_uses_default_message() {
        let err = classify_transport_error(
            &TransportError::Http {
                status: 500,
                message: None,
            },
            ErrorPhase::Load,
        );
        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(err.message, "Something went wrong loading the document.");
    }
}
